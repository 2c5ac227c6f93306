//! Thread-safe handle over a [`Leaderboard`].
//!
//! One coarse lock guards the whole facade, so the index and the tree are
//! never observed out of step, not even halfway through a refresh.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::entry::UserEntry;
use crate::error::Result;
use crate::leaderboard::{Change, Leaderboard, RankGroup, RefreshSummary};
use crate::source::PopulationSource;

/// Cloneable, lock-guarded leaderboard. Reads return owned copies.
pub struct SharedLeaderboard<S: PopulationSource> {
    inner: Arc<Mutex<Leaderboard<S>>>,
}

impl<S: PopulationSource> Clone for SharedLeaderboard<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn owned(users: Vec<&UserEntry>) -> Vec<UserEntry> {
    users.into_iter().cloned().collect()
}

impl<S: PopulationSource> SharedLeaderboard<S> {
    pub fn new(board: Leaderboard<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(board)),
        }
    }

    /// Runs `f` with the lock held.
    pub fn with<R>(&self, f: impl FnOnce(&mut Leaderboard<S>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn refresh(&self) -> Result<RefreshSummary> {
        self.inner.lock().refresh()
    }

    pub fn upsert(
        &self,
        display_name: impl Into<String>,
        identity: impl Into<String>,
        score: i64,
    ) -> Change {
        self.inner.lock().upsert(display_name, identity, score)
    }

    pub fn remove(&self, identity: &str) -> Result<UserEntry> {
        self.inner.lock().remove(identity)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn rank_of(&self, identity: &str) -> Result<usize> {
        self.inner.lock().rank_of(identity)
    }

    pub fn score_of(&self, identity: &str) -> Result<i64> {
        self.inner.lock().score_of(identity)
    }

    pub fn bottom_rank_num(&self) -> Result<usize> {
        self.inner.lock().bottom_rank_num()
    }

    pub fn users_at_rank(&self, rank: usize) -> Result<Vec<UserEntry>> {
        self.inner.lock().users_at_rank(rank).map(owned)
    }

    pub fn top_users(&self) -> Result<Vec<UserEntry>> {
        self.inner.lock().top_users().map(owned)
    }

    pub fn bottom_users(&self) -> Result<Vec<UserEntry>> {
        self.inner.lock().bottom_users().map(owned)
    }

    pub fn all_ranked(&self) -> Vec<RankGroup<UserEntry>> {
        let board = self.inner.lock();
        board.all_ranked().iter().map(|g| g.to_owned_group()).collect()
    }

    pub fn range_of_ranks(&self, low: usize, high: usize) -> Result<Vec<RankGroup<UserEntry>>> {
        let board = self.inner.lock();
        let groups = board.range_of_ranks(low, high)?;
        Ok(groups.iter().map(|g| g.to_owned_group()).collect())
    }
}

impl<S: PopulationSource> From<Leaderboard<S>> for SharedLeaderboard<S> {
    fn from(board: Leaderboard<S>) -> Self {
        Self::new(board)
    }
}
