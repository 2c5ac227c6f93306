use super::*;

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Entry handle -> (score, node) for everything currently in the tree.
type Placed = HashMap<u32, (i64, NodeId)>;

/// Reference model: score -> tie group in insertion order.
type Model = BTreeMap<i64, Vec<u32>>;

#[derive(Clone, Debug)]
enum Op {
    Insert(u32, i64),
    Delete(u32),
    Rescore(u32, i64),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    // A narrow score range forces plenty of ties.
    let entry = 0u32..64;
    let score = -20i64..20;
    let op = prop_oneof![
        50 => (entry.clone(), score.clone()).prop_map(|(e, s)| Op::Insert(e, s)),
        30 => entry.clone().prop_map(Op::Delete),
        20 => (entry, score).prop_map(|(e, s)| Op::Rescore(e, s)),
    ];
    prop::collection::vec(op, 0..=600)
}

fn place(tree: &mut RankTree<u32>, placed: &mut Placed, model: &mut Model, e: u32, s: i64) {
    let node = tree.insert(s, e);
    placed.insert(e, (s, node));
    model.entry(s).or_default().push(e);
}

fn unplace(tree: &mut RankTree<u32>, placed: &mut Placed, model: &mut Model, e: u32) {
    let (s, node) = placed.remove(&e).expect("entry must be placed");
    tree.delete(node, e);
    let group = model.get_mut(&s).expect("model holds the score");
    group.retain(|&x| x != e);
    if group.is_empty() {
        model.remove(&s);
    }
}

fn check_against_model(
    tree: &RankTree<u32>,
    placed: &Placed,
    model: &Model,
) -> std::result::Result<(), TestCaseError> {
    let got: Vec<(usize, i64, Vec<u32>)> = tree
        .iter_ranked()
        .map(|g| (g.rank, g.score, g.entries.to_vec()))
        .collect();
    let expected: Vec<(usize, i64, Vec<u32>)> = model
        .iter()
        .rev()
        .enumerate()
        .map(|(i, (s, group))| (i + 1, *s, group.clone()))
        .collect();
    prop_assert_eq!(&got, &expected);
    prop_assert_eq!(tree.len(), model.len());

    // Ranks are strictly ordered by score.
    for pair in got.windows(2) {
        prop_assert!(!pair[0].2.is_empty());
        prop_assert!(pair[0].1 > pair[1].1);
    }

    for (rank, score, _) in &got {
        prop_assert_eq!(tree.get_by_rank(*rank).unwrap().score, *score);
        prop_assert_eq!(tree.get_rank_by_score(*score).unwrap(), *rank);
    }

    // Ties share a rank, and every back-reference names the right node.
    for (&e, &(s, node)) in placed {
        let group = tree.group(node);
        prop_assert_eq!(group.score, s);
        prop_assert!(group.entries.contains(&e));
        prop_assert_eq!(group.rank, tree.get_rank_by_score(s).unwrap());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_tree_matches_model(ops in ops_strategy()) {
        let mut tree: RankTree<u32> = RankTree::new();
        let mut placed = Placed::new();
        let mut model = Model::new();

        for op in ops {
            match op {
                Op::Insert(e, s) => {
                    if !placed.contains_key(&e) {
                        place(&mut tree, &mut placed, &mut model, e, s);
                    }
                }
                Op::Delete(e) => {
                    if placed.contains_key(&e) {
                        unplace(&mut tree, &mut placed, &mut model, e);
                    }
                }
                Op::Rescore(e, s) => {
                    if placed.contains_key(&e) {
                        unplace(&mut tree, &mut placed, &mut model, e);
                        place(&mut tree, &mut placed, &mut model, e, s);
                    }
                }
            }

            if let Err(violation) = tree.validate() {
                return Err(TestCaseError::fail(format!("invariant broken: {violation}")));
            }
            prop_assert_eq!(tree.entry_count(), placed.len());
        }

        check_against_model(&tree, &placed, &model)?;
    }

    #[test]
    fn prop_round_trip_distinct_scores(
        scores in prop::collection::btree_set(-10_000i64..10_000, 1..300)
            .prop_map(|s| s.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    ) {
        let mut tree: RankTree<u32> = RankTree::new();
        for (i, &s) in scores.iter().enumerate() {
            tree.insert(s, i as u32);
        }
        tree.validate().unwrap();

        let mut seen: Vec<u32> = Vec::new();
        let mut last = i64::MAX;
        for rank in 1..=scores.len() {
            let group = tree.get_by_rank(rank).unwrap();
            prop_assert_eq!(group.entries.len(), 1);
            prop_assert!(group.score < last);
            last = group.score;
            seen.push(group.entries[0]);
        }
        seen.sort_unstable();
        let expected: Vec<u32> = (0..scores.len() as u32).collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn prop_delete_reinsert_restores_ranks(
        scores in prop::collection::vec(-50i64..50, 1..200),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut tree: RankTree<u32> = RankTree::new();
        let mut nodes = Vec::new();
        for (i, &s) in scores.iter().enumerate() {
            nodes.push(tree.insert(s, i as u32));
        }
        let ranks_before: Vec<usize> = nodes.iter().map(|&n| tree.rank_of_node(n)).collect();

        let k = pick.index(scores.len());
        tree.delete(nodes[k], k as u32);
        tree.validate().unwrap();
        let node = tree.insert(scores[k], k as u32);
        tree.validate().unwrap();

        for (i, &n) in nodes.iter().enumerate() {
            if i == k {
                continue;
            }
            // The node may have been recreated under a new handle.
            let rank = tree.get_rank_by_score(scores[i]).unwrap();
            prop_assert_eq!(rank, ranks_before[i]);
            if scores[i] != scores[k] {
                prop_assert_eq!(tree.rank_of_node(n), ranks_before[i]);
            }
        }
        prop_assert_eq!(tree.rank_of_node(node), ranks_before[k]);
    }

    #[test]
    fn prop_index_survives_resizes(
        keys in prop::collection::hash_set("[a-z0-9]{1,12}", 0..400),
        expected in 0usize..16,
    ) {
        let mut idx = IdentityIndex::new(expected);
        let mut ids = HashMap::new();
        for (i, key) in keys.iter().enumerate() {
            let up = idx.insert(UserEntry::new("", key.as_str(), i as i64));
            prop_assert!(matches!(up, Upsert::Inserted(_)));
            ids.insert(key.clone(), up.id());
        }
        prop_assert_eq!(idx.len(), keys.len());
        prop_assert!(idx.load_factor() <= Config::default().max_load_factor);
        for (key, id) in &ids {
            prop_assert_eq!(idx.find(key), Some(*id));
            prop_assert_eq!(idx.get(*id).identity(), key.as_str());
        }
    }

    #[test]
    fn prop_refresh_matches_fresh_build(
        rounds in prop::collection::vec(
            prop::collection::btree_map(0u8..30, -5i64..5, 0..30),
            1..8,
        ),
    ) {
        let to_rows = |round: &BTreeMap<u8, i64>| -> Vec<PopulationRow> {
            round
                .iter()
                .map(|(&k, &s)| PopulationRow::new(format!("User {k}"), format!("u{k}"), s))
                .collect()
        };
        let ranked = |lb: &Leaderboard<MemorySource>| -> Vec<(usize, i64, Vec<String>)> {
            lb.all_ranked()
                .into_iter()
                .map(|g| {
                    let mut ids: Vec<String> =
                        g.users.iter().map(|u| u.identity().to_owned()).collect();
                    ids.sort();
                    (g.rank, g.score, ids)
                })
                .collect()
        };

        let seed = vec![PopulationRow::new("Seed", "seed", 0)];
        let mut lb = Leaderboard::new(MemorySource::from_rows(seed), None).unwrap();

        for round in &rounds {
            let rows = to_rows(round);
            lb.source_mut().replace(rows.clone());
            lb.refresh().unwrap();
            lb.tree().validate().unwrap();

            if rows.is_empty() {
                prop_assert!(lb.is_empty());
                prop_assert!(lb.all_ranked().is_empty());
                continue;
            }

            let fresh = Leaderboard::new(MemorySource::from_rows(rows), None).unwrap();
            prop_assert_eq!(ranked(&lb), ranked(&fresh));
            prop_assert_eq!(lb.len(), fresh.len());

            for (key, &score) in round {
                let key = format!("u{key}");
                prop_assert_eq!(lb.score_of(&key).unwrap(), score);
                prop_assert_eq!(lb.rank_of(&key).unwrap(), fresh.rank_of(&key).unwrap());
            }
        }
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

/// (entry, score) pairs with one tie.
const SMALL_SET: [(u32, i64); 6] = [(0, 5), (1, 3), (2, 8), (3, 3), (4, 1), (5, 9)];

#[test]
fn exhaustive_insert_order_small_set() {
    for_each_permutation(&SMALL_SET, |perm| {
        let mut tree: RankTree<u32> = RankTree::new();
        let mut placed = Placed::new();
        let mut model = Model::new();

        for (e, s) in perm {
            place(&mut tree, &mut placed, &mut model, e, s);
            tree.validate().unwrap();
        }

        assert_eq!(tree.len(), 5);
        let scores: Vec<i64> = tree.iter_ranked().map(|g| g.score).collect();
        assert_eq!(scores, vec![9, 8, 5, 3, 1]);
        check_against_model(&tree, &placed, &model).unwrap();
    });
}

#[test]
fn exhaustive_delete_order_small_set() {
    // Insert in a fixed order, then delete in all permutations.
    let mut base_tree: RankTree<u32> = RankTree::new();
    let mut base_placed = Placed::new();
    let mut base_model = Model::new();
    for &(e, s) in &SMALL_SET {
        place(&mut base_tree, &mut base_placed, &mut base_model, e, s);
    }

    for_each_permutation(&SMALL_SET, |perm| {
        let mut tree = base_tree.clone();
        let mut placed = base_placed.clone();
        let mut model = base_model.clone();

        for (e, _) in perm {
            unplace(&mut tree, &mut placed, &mut model, e);
            tree.validate().unwrap();
            check_against_model(&tree, &placed, &model).unwrap();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.entry_count(), 0);
    });
}
