use std::fmt::Write as _;

use anyhow::{anyhow, Result};
use chrono::DateTime;
use itertools::Itertools;

use crate::{
    series_store::SeriesStore,
    stats::{aggregate_measurements, trimmed_percentile},
    units::format_value,
};

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |dt| dt.to_rfc3339())
}

/// Human readable description of the latest run of `series`.
pub fn describe_latest(store: &SeriesStore, series: &str) -> Result<String> {
    let latest = store
        .latest(series)
        .ok_or_else(|| anyhow!("No runs in series '{series}'"))?;
    let commit = latest.commit();

    let mut out = String::new();
    writeln!(out, "commit:    {}", commit.id)?;
    writeln!(out, "timestamp: {}", format_timestamp(commit.timestamp))?;
    for (key, value) in &commit.metadata {
        writeln!(out, "  {key}: {value}")?;
    }
    for m in latest.measurements() {
        let label = m
            .percentile_label
            .as_deref()
            .map(|l| format!(" ({l})"))
            .unwrap_or_default();
        writeln!(out, "{}{label} = {}", m.name, format_value(m.value, m.unit))?;
    }
    Ok(out)
}

pub fn show(store: &SeriesStore, series: &str) -> Result<()> {
    print!("{}", describe_latest(store, series)?);
    Ok(())
}

/// Human readable baseline window of `measurement`, oldest value first.
pub fn describe_window(
    store: &SeriesStore,
    series: &str,
    measurement: &str,
    size: usize,
) -> Result<String> {
    let window = store.window(series, measurement, size)?;
    let unit = store
        .latest(series)
        .and_then(|run| run.measurement(measurement).map(|m| m.unit))
        .or_else(|| {
            store.runs(series)?.iter().rev().find_map(|run| {
                run.measurement(measurement).map(|m| m.unit)
            })
        });

    let mut out = String::new();
    for value in &window {
        match unit {
            Some(unit) => writeln!(out, "{}", format_value(*value, unit))?,
            None => writeln!(out, "{value}")?,
        }
    }
    writeln!(out, "{}", aggregate_measurements(window.iter().copied()))?;
    if let Ok(p90) = trimmed_percentile(&window, 90.0, true) {
        writeln!(out, "p90 (oldest trimmed): {p90}")?;
    }
    Ok(out)
}

pub fn window(store: &SeriesStore, series: &str, measurement: &str, size: usize) -> Result<()> {
    print!("{}", describe_window(store, series, measurement, size)?);
    Ok(())
}

/// One line per series: name, number of runs and latest commit.
pub fn describe_series(store: &SeriesStore) -> String {
    store
        .series_names()
        .into_iter()
        .map(|name| {
            let runs = store.runs(&name).unwrap_or_default();
            let latest = runs.last().map(|r| r.commit_id().to_string());
            format!(
                "{name}\t{} runs\tlatest: {}",
                runs.len(),
                latest.as_deref().unwrap_or("-")
            )
        })
        .join("\n")
}

pub fn list(store: &SeriesStore) -> Result<()> {
    let listing = describe_series(store);
    if listing.is_empty() {
        println!("No series stored.");
    } else {
        println!("{listing}");
    }
    Ok(())
}
