//! User records shared by the identity index and the rank tree.

use crate::tree::NodeId;

/// One row of a population query: who, and how many points they hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopulationRow {
    pub display_name: String,
    pub identity: String,
    pub score: i64,
}

impl PopulationRow {
    pub fn new(display_name: impl Into<String>, identity: impl Into<String>, score: i64) -> Self {
        Self {
            display_name: display_name.into(),
            identity: identity.into(),
            score,
        }
    }
}

/// A user on the leaderboard.
///
/// Owned by [`IdentityIndex`](crate::IdentityIndex). The rank tree only holds
/// [`EntryId`](crate::EntryId) handles to it, and the entry points back at the
/// tree node currently holding its tie group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    display_name: String,
    identity: String,
    score: i64,
    /// Rank tree node containing this entry; `NodeId::NIL` while detached.
    pub(crate) node: NodeId,
}

impl UserEntry {
    pub fn new(display_name: impl Into<String>, identity: impl Into<String>, score: i64) -> Self {
        Self {
            display_name: display_name.into(),
            identity: identity.into(),
            score,
            node: NodeId::NIL,
        }
    }

    #[inline]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[inline]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[inline]
    pub fn score(&self) -> i64 {
        self.score
    }

    /// Takes over `other`'s name and score, keeping this record's identity
    /// and tree link. Returns the old score.
    pub(crate) fn absorb(&mut self, other: UserEntry) -> i64 {
        debug_assert_eq!(self.identity, other.identity);
        self.display_name = other.display_name;
        std::mem::replace(&mut self.score, other.score)
    }
}

impl From<PopulationRow> for UserEntry {
    fn from(row: PopulationRow) -> Self {
        Self::new(row.display_name, row.identity, row.score)
    }
}

impl From<&UserEntry> for PopulationRow {
    fn from(entry: &UserEntry) -> Self {
        Self::new(entry.display_name.clone(), entry.identity.clone(), entry.score)
    }
}
