use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use itertools::Itertools;
use log::info;

use perf_series_cli_types::{CliRun, MeasurementSpec};

use crate::{
    config,
    data::{BenchRun, CommitInfo, Measurement},
    series_store::SeriesStore,
    storage::JsonLinesPersistence,
    units::parse_value_with_unit,
};

/// Where a new bench run goes and which commit it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTarget {
    pub series: String,
    pub commit: CommitInfo,
    pub rerun: bool,
}

impl RunTarget {
    /// Builds the target from command line arguments, timestamped now unless
    /// a timestamp was given.
    pub fn from_cli(run: &CliRun) -> Self {
        RunTarget {
            series: run.series.clone(),
            commit: CommitInfo {
                id: run.commit.clone(),
                timestamp: run
                    .timestamp
                    .unwrap_or_else(|| Utc::now().timestamp_millis()),
                metadata: run.key_value.iter().cloned().collect(),
            },
            rerun: run.rerun,
        }
    }
}

/// Opens the store in `store_dir`, or in the configured directory.
pub fn open_store(store_dir: Option<&Path>) -> Result<SeriesStore> {
    let dir = store_dir.map_or_else(config::store_dir, Path::to_path_buf);
    let persistence = JsonLinesPersistence::new(&dir).with_backoff_max_elapsed(
        Duration::from_secs(config::backoff_max_elapsed_seconds()),
    );

    SeriesStore::open(persistence)
        .with_context(|| format!("Failed to open store in {}", dir.display()))
}

pub fn measurement_from_spec(spec: &MeasurementSpec) -> Measurement {
    let (value, unit) = parse_value_with_unit(spec.value, spec.unit.as_deref().unwrap_or(""));
    let measurement = Measurement::new(spec.name.clone(), value, unit);
    match &spec.percentile_label {
        Some(label) => measurement.with_percentile_label(label.clone()),
        None => measurement,
    }
}

/// Appends one run holding `measurements` to the target series.
pub fn append_measurements(
    store: &SeriesStore,
    target: RunTarget,
    measurements: Vec<Measurement>,
) -> Result<()> {
    let RunTarget {
        series,
        commit,
        rerun,
    } = target;
    let commit_id = commit.id.clone();
    let count = measurements.len();

    let run = BenchRun::new(commit, measurements)
        .with_context(|| format!("Invalid run for commit {commit_id}"))?;

    let appended = if rerun {
        store.append_rerun(&series, run)
    } else {
        store.append(&series, run)
    };
    appended.with_context(|| format!("Failed to append run for commit {commit_id} to '{series}'"))?;

    info!("Appended {count} measurements for commit {commit_id} to '{series}'");
    Ok(())
}

pub fn add(store: &SeriesStore, target: RunTarget, specs: &[MeasurementSpec]) -> Result<()> {
    let measurements = specs.iter().map(measurement_from_spec).collect_vec();
    append_measurements(store, target, measurements)
}
