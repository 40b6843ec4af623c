//! Persistence collaborators of the series store.
//!
//! The store decides what is appended; a [`Persistence`] implementation makes
//! the append durable. `commit` must either record the complete run or fail
//! without leaving a readable partial record behind.

mod file_store;
mod storage_definitions;
mod storage_types;

use std::sync::Mutex;

use crate::data::BenchRun;

pub use file_store::JsonLinesPersistence;
pub use storage_types::PersistenceError;

/// Whether a commit may repeat a commit id already recorded in the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Unique,
    Rerun,
}

pub trait Persistence: Send + Sync {
    /// Loads every stored series with its runs in append order.
    fn load(&self) -> Result<Vec<(String, Vec<BenchRun>)>, PersistenceError>;

    /// Durably records `run` as the next entry of `series`.
    ///
    /// With [`CommitMode::Unique`] the commit fails with
    /// [`PersistenceError::DuplicateCommit`] if the durable series already
    /// holds a run for the same commit, checked under the same exclusion
    /// that serializes writers.
    fn commit(&self, series: &str, run: &BenchRun, mode: CommitMode)
        -> Result<(), PersistenceError>;
}

/// Keeps committed runs in memory only. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    committed: Mutex<Vec<(String, BenchRun)>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn committed(&self) -> usize {
        self.committed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<Vec<(String, Vec<BenchRun>)>, PersistenceError> {
        let committed = self
            .committed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut series: Vec<(String, Vec<BenchRun>)> = Vec::new();
        for (name, run) in committed.iter() {
            match series.iter_mut().find(|(n, _)| n == name) {
                Some((_, runs)) => runs.push(run.clone()),
                None => series.push((name.clone(), vec![run.clone()])),
            }
        }
        Ok(series)
    }

    fn commit(
        &self,
        series: &str,
        run: &BenchRun,
        mode: CommitMode,
    ) -> Result<(), PersistenceError> {
        let mut committed = self
            .committed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if mode == CommitMode::Unique
            && committed
                .iter()
                .any(|(name, r)| name == series && r.commit_id() == run.commit_id())
        {
            return Err(PersistenceError::DuplicateCommit {
                series: series.to_string(),
                commit: run.commit_id().to_string(),
            });
        }

        committed.push((series.to_string(), run.clone()));
        Ok(())
    }
}
