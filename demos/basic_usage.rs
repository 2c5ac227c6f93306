//! Basic usage examples for rankboard.
//!
//! Run with `RUST_LOG=rankboard=debug` to see build, refresh and resize events.

use rankboard::{Leaderboard, MemorySource, PopulationRow, SharedLeaderboard};
use tracing_subscriber::EnvFilter;

fn main() -> rankboard::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    example_queries()?;
    example_refresh()?;
    example_cohorts()?;
    example_shared()?;
    Ok(())
}

fn example_queries() -> rankboard::Result<()> {
    println!("=== Rank queries ===\n");

    let source = MemorySource::from_rows([
        PopulationRow::new("Ada", "ada", 90),
        PopulationRow::new("Bob", "bob", 85),
        PopulationRow::new("Cyd", "cyd", 85),
        PopulationRow::new("Dee", "dee", 60),
    ]);
    let board = Leaderboard::new(source, None)?;

    println!("rank of cyd = {}", board.rank_of("cyd")?);
    println!("score of dee = {}", board.score_of("dee")?);
    let names: Vec<&str> = board.users_at_rank(2)?.iter().map(|u| u.display_name()).collect();
    println!("rank 2 = {:?}", names);
    println!("bottom rank = {}", board.bottom_rank_num()?);
    match board.rank_of("zed") {
        Ok(rank) => println!("zed = {rank}"),
        Err(e) => println!("zed: {e} ({:?})\n", e.kind()),
    }
    Ok(())
}

fn example_refresh() -> rankboard::Result<()> {
    println!("=== Refresh ===\n");

    let source = MemorySource::from_rows([
        PopulationRow::new("Ada", "ada", 10),
        PopulationRow::new("Bob", "bob", 20),
    ]);
    let mut board = Leaderboard::new(source, None)?;

    // The store changes behind the board's back.
    board.source_mut().replace([
        PopulationRow::new("Bob", "bob", 25),
        PopulationRow::new("Cyd", "cyd", 5),
    ]);
    let summary = board.refresh()?;
    println!("{summary:?}");

    for group in board.all_ranked() {
        let ids: Vec<&str> = group.users.iter().map(|u| u.identity()).collect();
        println!("#{} ({} pts): {:?}", group.rank, group.score, ids);
    }

    // A failing store leaves the board as it was.
    board.source_mut().set_offline(true);
    if let Err(e) = board.refresh() {
        println!("refresh failed: {e}; still {} users\n", board.len());
    }
    Ok(())
}

fn example_cohorts() -> rankboard::Result<()> {
    println!("=== Scoped boards ===\n");

    let mut source = MemorySource::new();
    source.upsert(Some("math"), PopulationRow::new("Ada", "ada", 40));
    source.upsert(Some("math"), PopulationRow::new("Bob", "bob", 70));
    source.upsert(Some("art"), PopulationRow::new("Cyd", "cyd", 99));

    let math = Leaderboard::new(&source, Some("math".to_owned()))?;
    let everyone = Leaderboard::new(&source, None)?;
    println!("bob in math = {}", math.rank_of("bob")?);
    println!("bob overall = {}\n", everyone.rank_of("bob")?);
    Ok(())
}

fn example_shared() -> rankboard::Result<()> {
    println!("=== SharedLeaderboard ===\n");

    let source = MemorySource::from_rows((0..100).map(|i| {
        PopulationRow::new(format!("User {i}"), format!("u{i:02}"), i % 10)
    }));
    let shared = SharedLeaderboard::new(Leaderboard::new(source, None)?);

    std::thread::scope(|s| {
        let writer = shared.clone();
        s.spawn(move || {
            writer.upsert("User 5", "u05", 1_000);
        });
    });

    println!("u05 = rank {}", shared.rank_of("u05")?);
    let top: Vec<String> = shared
        .top_users()?
        .iter()
        .map(|u| u.identity().to_owned())
        .collect();
    println!("top: {top:?}");
    println!("ranks 1..=3: {}", shared.range_of_ranks(1, 3)?.len());
    Ok(())
}
