//! Append-only store of bench runs, one ordered log per benchmark series.
//!
//! Appends to the same series are serialized by the series' write lock and
//! become visible to readers only after the persistence collaborator has
//! committed them. Appends to different series only share the short-lived
//! lock on the series map, never a commit.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use itertools::Itertools;
use log::{debug, warn};

use crate::{
    data::BenchRun,
    storage::{CommitMode, Persistence, PersistenceError},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Commit {commit} already has a run in series '{series}'")]
    DuplicateCommit { series: String, commit: String },

    #[error("Unknown series '{0}'")]
    UnknownSeries(String),

    #[error("Unknown measurement '{measurement}' in series '{series}'")]
    UnknownMeasurement { series: String, measurement: String },

    #[error("Invalid series name '{0}'. Names must be non-empty without whitespace, path separators or a leading dot.")]
    InvalidSeriesName(String),

    #[error("Failed to persist run for commit {commit} in series '{series}'")]
    Persistence {
        series: String,
        commit: String,
        #[source]
        source: PersistenceError,
    },

    #[error("Failed to load stored series")]
    Load(#[source] PersistenceError),
}

type SeriesLog = RwLock<Vec<Arc<BenchRun>>>;

// Runs are only pushed once fully committed, so a poisoned lock still guards
// a consistent log.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub fn is_valid_series_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\'))
}

pub struct SeriesStore {
    persistence: Box<dyn Persistence>,
    series: RwLock<HashMap<String, Arc<SeriesLog>>>,
}

impl SeriesStore {
    /// Creates a store with the runs already held by `persistence`.
    pub fn open(persistence: impl Persistence + 'static) -> Result<Self, StoreError> {
        let loaded = persistence.load().map_err(StoreError::Load)?;

        let mut series = HashMap::with_capacity(loaded.len());
        for (name, runs) in loaded {
            if !is_valid_series_name(&name) {
                warn!("Skipping stored series with invalid name '{name}'");
                continue;
            }
            debug!("series '{name}': {} runs", runs.len());
            let runs = runs.into_iter().map(Arc::new).collect_vec();
            series.insert(name, Arc::new(RwLock::new(runs)));
        }

        Ok(SeriesStore {
            persistence: Box::new(persistence),
            series: RwLock::new(series),
        })
    }

    fn log(&self, series: &str) -> Option<Arc<SeriesLog>> {
        read(&self.series).get(series).cloned()
    }

    /// Appends `run` to `series`, creating the series on first use.
    ///
    /// Fails with [`StoreError::DuplicateCommit`] if the series already holds
    /// a run for the same commit. On any failure the store is unchanged.
    pub fn append(&self, series: &str, run: BenchRun) -> Result<(), StoreError> {
        self.append_inner(series, run, CommitMode::Unique)
    }

    /// Appends a repeated run of a commit. Earlier runs of the commit stay in
    /// the history but are superseded by this one.
    pub fn append_rerun(&self, series: &str, run: BenchRun) -> Result<(), StoreError> {
        self.append_inner(series, run, CommitMode::Rerun)
    }

    /// The log of `series`, registering an empty one if the series is new.
    ///
    /// The map lock is only held to look up or insert the entry, never while
    /// committing.
    fn log_or_create(&self, series: &str) -> Arc<SeriesLog> {
        if let Some(log) = self.log(series) {
            return log;
        }
        write(&self.series)
            .entry(series.to_string())
            .or_default()
            .clone()
    }

    /// Drops the entry of a series whose first append failed, unless another
    /// writer is about to use it.
    fn discard_if_unused(&self, series: &str, log: &Arc<SeriesLog>) {
        let mut all = write(&self.series);
        // One reference in the map and one held by the caller
        let unused = all.get(series).is_some_and(|l| Arc::ptr_eq(l, log))
            && Arc::strong_count(log) == 2;
        if unused {
            all.remove(series);
        }
    }

    fn append_inner(
        &self,
        series: &str,
        run: BenchRun,
        mode: CommitMode,
    ) -> Result<(), StoreError> {
        if !is_valid_series_name(series) {
            return Err(StoreError::InvalidSeriesName(series.to_string()));
        }

        let log = self.log_or_create(series);
        let mut runs = write(&log);

        let recorded = runs.iter().any(|r| r.commit_id() == run.commit_id());
        if mode == CommitMode::Unique && recorded {
            return Err(StoreError::DuplicateCommit {
                series: series.to_string(),
                commit: run.commit_id().to_string(),
            });
        }

        if let Some(last) = runs.last() {
            if run.timestamp() < last.timestamp() {
                warn!(
                    "Run for commit {} in series '{series}' is older than the previous run ({} < {})",
                    run.commit_id(),
                    run.timestamp(),
                    last.timestamp()
                );
            }
        }

        if let Err(e) = self.commit(series, &run, mode) {
            if runs.is_empty() {
                drop(runs);
                self.discard_if_unused(series, &log);
            }
            return Err(e);
        }

        debug!(
            "appended commit {} to series '{series}' ({} runs)",
            run.commit_id(),
            runs.len() + 1
        );
        runs.push(Arc::new(run));
        Ok(())
    }

    fn commit(&self, series: &str, run: &BenchRun, mode: CommitMode) -> Result<(), StoreError> {
        self.persistence
            .commit(series, run, mode)
            .map_err(|source| match source {
                PersistenceError::DuplicateCommit { series, commit } => {
                    StoreError::DuplicateCommit { series, commit }
                }
                source => StoreError::Persistence {
                    series: series.to_string(),
                    commit: run.commit_id().to_string(),
                    source,
                },
            })
    }

    /// The most recently appended run of `series`.
    pub fn latest(&self, series: &str) -> Option<Arc<BenchRun>> {
        self.log(series).and_then(|log| read(&log).last().cloned())
    }

    /// Values of `measurement` from up to `size` runs preceding the latest
    /// run, oldest first.
    ///
    /// A run superseded by a later re-run of the same commit does not count
    /// towards the window. Runs without the measurement contribute no value.
    pub fn window(
        &self,
        series: &str,
        measurement: &str,
        size: usize,
    ) -> Result<Vec<f64>, StoreError> {
        self.latest_with_window(series, measurement, size)
            .map(|(_, window)| window)
    }

    /// The latest run of `series` together with the window preceding it,
    /// both taken from the same snapshot of the series.
    pub fn latest_with_window(
        &self,
        series: &str,
        measurement: &str,
        size: usize,
    ) -> Result<(Arc<BenchRun>, Vec<f64>), StoreError> {
        let log = self
            .log(series)
            .ok_or_else(|| StoreError::UnknownSeries(series.to_string()))?;
        let runs = read(&log);

        // Empty while the first run of a new series is being committed
        let Some((latest, history)) = runs.split_last() else {
            return Err(StoreError::UnknownSeries(series.to_string()));
        };

        if !runs.iter().any(|r| r.measurement(measurement).is_some()) {
            return Err(StoreError::UnknownMeasurement {
                series: series.to_string(),
                measurement: measurement.to_string(),
            });
        }

        let mut seen: HashSet<&str> = HashSet::from([latest.commit_id()]);
        let mut window = history
            .iter()
            .rev()
            .filter(|r| seen.insert(r.commit_id()))
            .take(size)
            .filter_map(|r| r.value_of(measurement))
            .collect_vec();
        window.reverse();
        Ok((latest.clone(), window))
    }

    /// Snapshot of the whole history of `series` in append order.
    pub fn runs(&self, series: &str) -> Option<Vec<Arc<BenchRun>>> {
        self.log(series)
            .map(|log| read(&log).clone())
            .filter(|runs| !runs.is_empty())
    }

    /// Names of all series holding at least one run, sorted.
    pub fn series_names(&self) -> Vec<String> {
        let logs = read(&self.series)
            .iter()
            .map(|(name, log)| (name.clone(), log.clone()))
            .collect_vec();
        logs.into_iter()
            .filter(|(_, log)| !read(log).is_empty())
            .map(|(name, _)| name)
            .sorted()
            .collect()
    }
}
