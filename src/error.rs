//! Recoverable error taxonomy for leaderboard operations.

use crate::source::SourceError;

/// Coarse classification of a [`LeaderboardError`].
///
/// Callers usually only need to branch on this (e.g. to render "no ranking
/// yet" for [`ErrorKind::EmptyCollection`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An identity key or score that had to be present was absent.
    NotFound,
    /// A rank or rank range fell outside `1..=bottom_rank`.
    OutOfRange,
    /// The query needs at least one entry.
    EmptyCollection,
    /// The population query failed, or returned no rows when building.
    SourceUnavailable,
}

/// Errors returned by the index, the rank tree and the leaderboard facade.
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("identity `{0}` is not on the leaderboard")]
    UnknownIdentity(String),

    #[error("no user holds score {0}")]
    UnknownScore(i64),

    #[error("rank {rank} is outside 1..={bottom}")]
    RankOutOfRange { rank: usize, bottom: usize },

    #[error("rank range {low}..={high} is inverted")]
    InvertedRange { low: usize, high: usize },

    #[error("the leaderboard has no entries")]
    EmptyCollection,

    #[error("population source returned no rows")]
    EmptySource,

    #[error(transparent)]
    SourceUnavailable(#[from] SourceError),
}

impl LeaderboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeaderboardError::UnknownIdentity(_) | LeaderboardError::UnknownScore(_) => {
                ErrorKind::NotFound
            }
            LeaderboardError::RankOutOfRange { .. } | LeaderboardError::InvertedRange { .. } => {
                ErrorKind::OutOfRange
            }
            LeaderboardError::EmptyCollection => ErrorKind::EmptyCollection,
            LeaderboardError::EmptySource | LeaderboardError::SourceUnavailable(_) => {
                ErrorKind::SourceUnavailable
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LeaderboardError>;
