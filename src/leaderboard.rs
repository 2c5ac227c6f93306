//! Leaderboard facade: keeps the identity index and the rank tree in step
//! with an external population source.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crate::entry::{PopulationRow, UserEntry};
use crate::error::{LeaderboardError, Result};
use crate::index::{EntryId, IdentityIndex, Upsert};
use crate::source::PopulationSource;
use crate::tree::{RankTree, TieGroup};
use crate::Config;

/// Users sharing one rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankGroup<U> {
    pub rank: usize,
    pub score: i64,
    pub users: Vec<U>,
}

impl RankGroup<&UserEntry> {
    pub fn to_owned_group(&self) -> RankGroup<UserEntry> {
        RankGroup {
            rank: self.rank,
            score: self.score,
            users: self.users.iter().map(|u| (*u).clone()).collect(),
        }
    }
}

/// What an upsert did to one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Added,
    Rescored { previous: i64 },
    Renamed,
    Unchanged,
}

/// Counts of what one [`Leaderboard::refresh`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub added: usize,
    pub removed: usize,
    pub rescored: usize,
    pub renamed: usize,
}

impl RefreshSummary {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Ranked view over a population fetched from `S`.
pub struct Leaderboard<S: PopulationSource> {
    source: S,
    scope: Option<S::Scope>,
    config: Config,
    index: IdentityIndex,
    tree: RankTree<EntryId>,
    snapshot: Vec<PopulationRow>,
}

impl<S: PopulationSource> Leaderboard<S> {
    /// Queries `source` (narrowed to `scope`) and ranks the result.
    pub fn new(source: S, scope: Option<S::Scope>) -> Result<Self> {
        Self::with_config(source, scope, Config::default())
    }

    pub fn with_config(source: S, scope: Option<S::Scope>, config: Config) -> Result<Self> {
        let rows = dedupe(fetch(&source, scope.as_ref())?);
        if rows.is_empty() {
            warn!("population query returned no rows");
            return Err(LeaderboardError::EmptySource);
        }

        let mut board = Self {
            index: IdentityIndex::with_config(rows.len(), &config),
            tree: RankTree::new(),
            source,
            scope,
            config,
            snapshot: Vec::new(),
        };
        for row in &rows {
            board.upsert_row(row.clone());
        }
        board.snapshot = rows;

        info!(
            users = board.index.len(),
            ranks = board.tree.len(),
            "leaderboard built"
        );
        Ok(board)
    }

    /// Re-queries the source and applies the difference.
    ///
    /// Nothing changes unless the query succeeds; the whole difference is
    /// then applied before returning. An empty result is a valid population
    /// and empties the board.
    pub fn refresh(&mut self) -> Result<RefreshSummary> {
        let rows = dedupe(fetch(&self.source, self.scope.as_ref())?);

        let mut summary = RefreshSummary::default();

        // The index holds the last known population, including anything
        // reported through `upsert`/`remove` since the previous query.
        let departed: Vec<String> = {
            let incoming: FxHashSet<&str> = rows.iter().map(|r| r.identity.as_str()).collect();
            self.index
                .iter()
                .filter(|(_, e)| !incoming.contains(e.identity()))
                .map(|(_, e)| e.identity().to_owned())
                .collect()
        };
        for identity in &departed {
            self.remove_identity(identity)?;
            summary.removed += 1;
        }

        for row in &rows {
            match self.upsert_row(row.clone()) {
                Change::Added => summary.added += 1,
                Change::Rescored { .. } => summary.rescored += 1,
                Change::Renamed => summary.renamed += 1,
                Change::Unchanged => {}
            }
        }
        self.snapshot = rows;

        debug!(
            added = summary.added,
            removed = summary.removed,
            rescored = summary.rescored,
            renamed = summary.renamed,
            users = self.index.len(),
            "leaderboard refreshed"
        );
        Ok(summary)
    }

    /// Records a score change made by the caller in the authoritative store.
    pub fn upsert(
        &mut self,
        display_name: impl Into<String>,
        identity: impl Into<String>,
        score: i64,
    ) -> Change {
        self.upsert_row(PopulationRow::new(display_name, identity, score))
    }

    /// Records that `identity` left the authoritative store.
    pub fn remove(&mut self, identity: &str) -> Result<UserEntry> {
        self.remove_identity(identity)
    }

    fn upsert_row(&mut self, row: PopulationRow) -> Change {
        match self.index.insert(UserEntry::from(row)) {
            Upsert::Inserted(id) => {
                let score = self.index.get(id).score();
                let node = self.tree.insert(score, id);
                self.index.attach(id, node);
                Change::Added
            }
            Upsert::Rescored { id, previous } => {
                // The score is the tree key: drop the old placement, then re-add.
                let entry = self.index.get(id);
                let (node, score) = (entry.node, entry.score());
                self.tree.delete(node, id);
                let node = self.tree.insert(score, id);
                self.index.attach(id, node);
                Change::Rescored { previous }
            }
            Upsert::Unchanged { renamed: true, .. } => Change::Renamed,
            Upsert::Unchanged { renamed: false, .. } => Change::Unchanged,
        }
    }

    fn remove_identity(&mut self, identity: &str) -> Result<UserEntry> {
        let id = self
            .index
            .find(identity)
            .ok_or_else(|| LeaderboardError::UnknownIdentity(identity.to_owned()))?;
        let node = self.index.get(id).node;
        self.tree.delete(node, id);
        self.index.remove(identity)
    }

    // --- queries -------------------------------------------------------------

    fn users(&self, group: TieGroup<'_, EntryId>) -> Vec<&UserEntry> {
        group.entries.iter().map(|&id| self.index.get(id)).collect()
    }

    fn resolve(&self, group: TieGroup<'_, EntryId>) -> RankGroup<&UserEntry> {
        RankGroup {
            rank: group.rank,
            score: group.score,
            users: self.users(group),
        }
    }

    /// Number of users.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The lowest rank currently held (number of distinct scores).
    pub fn bottom_rank_num(&self) -> Result<usize> {
        match self.tree.len() {
            0 => Err(LeaderboardError::EmptyCollection),
            n => Ok(n),
        }
    }

    pub fn user(&self, identity: &str) -> Result<&UserEntry> {
        self.index.lookup(identity)
    }

    pub fn score_of(&self, identity: &str) -> Result<i64> {
        self.index.lookup(identity).map(UserEntry::score)
    }

    pub fn rank_of(&self, identity: &str) -> Result<usize> {
        let entry = self.index.lookup(identity)?;
        Ok(self.tree.rank_of_node(entry.node))
    }

    pub fn rank_of_score(&self, score: i64) -> Result<usize> {
        self.tree.get_rank_by_score(score)
    }

    /// Users at `rank`, in the order they reached their score.
    pub fn users_at_rank(&self, rank: usize) -> Result<Vec<&UserEntry>> {
        Ok(self.users(self.tree.get_by_rank(rank)?))
    }

    pub fn users_with_score(&self, score: i64) -> Result<Vec<&UserEntry>> {
        Ok(self.users(self.tree.get_by_score(score)?))
    }

    pub fn top_users(&self) -> Result<Vec<&UserEntry>> {
        Ok(self.users(self.tree.get_max()?))
    }

    pub fn bottom_users(&self) -> Result<Vec<&UserEntry>> {
        Ok(self.users(self.tree.get_min()?))
    }

    /// Every rank from 1 to the bottom.
    pub fn all_ranked(&self) -> Vec<RankGroup<&UserEntry>> {
        self.tree.iter_ranked().map(|g| self.resolve(g)).collect()
    }

    /// Ranks `low..=high`.
    pub fn range_of_ranks(&self, low: usize, high: usize) -> Result<Vec<RankGroup<&UserEntry>>> {
        if low > high {
            return Err(LeaderboardError::InvertedRange { low, high });
        }
        let bottom = self.tree.len();
        for rank in [low, high] {
            if rank == 0 || rank > bottom {
                return Err(LeaderboardError::RankOutOfRange { rank, bottom });
            }
        }
        (low..=high)
            .map(|rank| self.tree.get_by_rank(rank).map(|g| self.resolve(g)))
            .collect()
    }

    // --- accessors -----------------------------------------------------------

    /// Rows of the last successful population query.
    ///
    /// Kept for inspection only: `refresh` diffs against the live index,
    /// which also reflects `upsert` and `remove` calls made since.
    pub fn snapshot(&self) -> &[PopulationRow] {
        &self.snapshot
    }

    pub fn scope(&self) -> Option<&S::Scope> {
        self.scope.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn index(&self) -> &IdentityIndex {
        &self.index
    }

    pub fn tree(&self) -> &RankTree<EntryId> {
        &self.tree
    }
}

fn fetch<S: PopulationSource>(source: &S, scope: Option<&S::Scope>) -> Result<Vec<PopulationRow>> {
    source.fetch_population(scope).map_err(|err| {
        warn!(error = %err, "population query failed");
        LeaderboardError::from(err)
    })
}

/// Keeps the last row for each identity.
fn dedupe(rows: Vec<PopulationRow>) -> Vec<PopulationRow> {
    let mut seen: FxHashMap<String, usize> = FxHashMap::default();
    let mut out: Vec<PopulationRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match seen.get(&row.identity) {
            Some(&i) => {
                warn!(
                    identity = %row.identity,
                    "duplicate identity in population; keeping the last row"
                );
                out[i] = row;
            }
            None => {
                seen.insert(row.identity.clone(), out.len());
                out.push(row);
            }
        }
    }
    out
}
