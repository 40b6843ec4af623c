//! Helpers shared by unit tests, integration tests and benchmarks.

use std::collections::BTreeMap;

use tempfile::{tempdir, TempDir};

use crate::data::{BenchRun, CommitInfo, Measurement};
use crate::series_store::SeriesStore;
use crate::storage::JsonLinesPersistence;
use crate::units::Unit;

/// A run of commit `id` holding the given measurements in milliseconds.
///
/// # Panics
/// Panics if the measurements do not form a valid run.
pub fn run_with(id: &str, timestamp: i64, values: &[(&str, f64)]) -> BenchRun {
    BenchRun::new(
        CommitInfo {
            id: id.to_string(),
            timestamp,
            metadata: BTreeMap::new(),
        },
        values
            .iter()
            .map(|(name, value)| Measurement::new(*name, *value, Unit::Milliseconds))
            .collect(),
    )
    .expect("valid bench run")
}

/// Opens a store backed by JSON-lines files in a fresh temporary directory.
///
/// The directory is removed when the returned guard is dropped.
pub fn temp_store() -> (TempDir, SeriesStore) {
    let dir = tempdir().expect("create temporary directory");
    let store = SeriesStore::open(JsonLinesPersistence::new(dir.path())).expect("open store");
    (dir, store)
}

/// Appends one run per value of `measurement` to `series`, with commit ids
/// `c0`, `c1`, ...
///
/// # Panics
/// Panics if an append fails.
pub fn fill_series(store: &SeriesStore, series: &str, measurement: &str, values: &[f64]) {
    for (i, value) in values.iter().enumerate() {
        store
            .append(series, run_with(&format!("c{i}"), i as i64, &[(measurement, *value)]))
            .expect("append run");
    }
}
