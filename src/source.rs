//! The external record store a leaderboard is built from.

use crate::entry::PopulationRow;

/// The population query failed; distinct from a query that returned no rows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("population query failed: {reason}")]
pub struct SourceError {
    reason: String,
}

impl SourceError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Authoritative store of (name, identity, score) rows.
///
/// Implementations must not return the same identity twice in one result.
pub trait PopulationSource {
    /// Narrows a query to part of the population (a course, a cohort).
    type Scope;

    /// Runs the full population query synchronously.
    fn fetch_population(
        &self,
        scope: Option<&Self::Scope>,
    ) -> Result<Vec<PopulationRow>, SourceError>;
}

impl<S: PopulationSource + ?Sized> PopulationSource for &S {
    type Scope = S::Scope;

    fn fetch_population(
        &self,
        scope: Option<&Self::Scope>,
    ) -> Result<Vec<PopulationRow>, SourceError> {
        (**self).fetch_population(scope)
    }
}

/// In-memory population, optionally partitioned into named cohorts.
///
/// Stands in for a database in tests and demos; it can be switched offline
/// to exercise the "source unavailable" path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Vec<(Option<String>, PopulationRow)>,
    offline: bool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source with every row outside any cohort.
    pub fn from_rows(rows: impl IntoIterator<Item = PopulationRow>) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (None, r)).collect(),
            offline: false,
        }
    }

    /// Inserts or replaces the row for `row.identity`.
    pub fn upsert(&mut self, cohort: Option<&str>, row: PopulationRow) {
        let cohort = cohort.map(str::to_owned);
        match self.rows.iter_mut().find(|(_, r)| r.identity == row.identity) {
            Some(slot) => *slot = (cohort, row),
            None => self.rows.push((cohort, row)),
        }
    }

    pub fn remove(&mut self, identity: &str) -> Option<PopulationRow> {
        let pos = self.rows.iter().position(|(_, r)| r.identity == identity)?;
        Some(self.rows.remove(pos).1)
    }

    /// Replaces the whole population, outside any cohort.
    pub fn replace(&mut self, rows: impl IntoIterator<Item = PopulationRow>) {
        self.rows = rows.into_iter().map(|r| (None, r)).collect();
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }
}

impl PopulationSource for MemorySource {
    type Scope = String;

    fn fetch_population(&self, scope: Option<&String>) -> Result<Vec<PopulationRow>, SourceError> {
        if self.offline {
            return Err(SourceError::new("memory source is offline"));
        }
        Ok(self
            .rows
            .iter()
            .filter(|(cohort, _)| scope.is_none() || cohort.as_ref() == scope)
            .map(|(_, row)| row.clone())
            .collect())
    }
}
