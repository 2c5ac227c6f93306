//! # rankboard
//!
//! An in-memory ranked leaderboard over a population held in an external
//! store.
//!
//! Two structures are kept in step:
//! - [`IdentityIndex`]: a separately chained hash table for O(1) lookup by
//!   identity key,
//! - [`RankTree`]: a left-leaning red-black tree augmented with subtree sizes,
//!   one node per distinct score, for O(log n) "who holds rank K" and "what
//!   rank does X hold".
//!
//! Equal scores share one rank (dense ranking). [`Leaderboard`] builds both
//! from a [`PopulationSource`] and later diffs a fresh query against what it
//! holds.
//!
//! ## Example
//!
//! ```rust
//! use rankboard::{Leaderboard, MemorySource, PopulationRow};
//!
//! let source = MemorySource::from_rows([
//!     PopulationRow::new("Ada", "ada", 90),
//!     PopulationRow::new("Bob", "bob", 85),
//!     PopulationRow::new("Cyd", "cyd", 85),
//!     PopulationRow::new("Dee", "dee", 60),
//! ]);
//! let mut board = Leaderboard::new(source, None).unwrap();
//!
//! assert_eq!(board.rank_of("ada").unwrap(), 1);
//! assert_eq!(board.rank_of("cyd").unwrap(), 2);
//! assert_eq!(board.bottom_rank_num().unwrap(), 3);
//!
//! board.source_mut().upsert(None, PopulationRow::new("Dee", "dee", 95));
//! board.refresh().unwrap();
//! assert_eq!(board.rank_of("dee").unwrap(), 1);
//! ```

#![warn(clippy::all)]

pub mod entry;
pub mod error;
pub mod index;
pub mod leaderboard;
pub mod shared;
pub mod source;
pub mod tree;

pub use entry::{PopulationRow, UserEntry};
pub use error::{ErrorKind, LeaderboardError, Result};
pub use index::{EntryId, IdentityIndex, Upsert};
pub use leaderboard::{Change, Leaderboard, RankGroup, RefreshSummary};
pub use shared::SharedLeaderboard;
pub use source::{MemorySource, PopulationSource, SourceError};
pub use tree::{NodeId, RankTree, RankedIter, TieGroup, TreeViolation};

/// Sizing and growth policy for the identity index.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Live entries per bucket above which the bucket table doubles.
    pub max_load_factor: f64,
    /// Initial buckets per expected identity.
    pub capacity_headroom: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_load_factor: 3.0,
            capacity_headroom: 1.2,
        }
    }
}

#[cfg(test)]
mod proptests;
