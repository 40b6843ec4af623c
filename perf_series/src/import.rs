//! Import benchmark results from external harnesses as one bench run.

use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

use perf_series_cli_types::ImportFormat;

use crate::converters::{convert_to_measurements, ConversionOptions};
use crate::data::Measurement;
use crate::measurement_storage::{append_measurements, RunTarget};
use crate::parsers::{CriterionJsonParser, HyperfineJsonParser, Parser};
use crate::series_store::SeriesStore;
use crate::units::format_value;

/// Parses `input` in `format` into measurements, applying prefix and filter.
pub fn parse_measurements(
    format: ImportFormat,
    input: &str,
    prefix: Option<String>,
    filter: Option<&str>,
) -> Result<Vec<Measurement>> {
    let parsed = match format {
        ImportFormat::CriterionJson => CriterionJsonParser
            .parse(input)
            .context("Failed to parse criterion JSON")?,
        ImportFormat::HyperfineJson => HyperfineJsonParser
            .parse(input)
            .context("Failed to parse hyperfine JSON")?,
    };
    log::info!("Parsed {} benchmarks", parsed.len());

    let measurements = convert_to_measurements(parsed, &ConversionOptions { prefix });

    let Some(pattern) = filter else {
        return Ok(measurements);
    };

    let regex = Regex::new(pattern).context("Invalid regex pattern for filter")?;
    let original_count = measurements.len();
    let filtered: Vec<_> = measurements
        .into_iter()
        .filter(|m| regex.is_match(&m.name))
        .collect();
    log::info!(
        "Filtered to {} measurements (from {original_count}) using pattern: {pattern}",
        filtered.len()
    );
    Ok(filtered)
}

/// Handle the import command
///
/// Reads input from stdin or file and appends it as one run of the target
/// series. `open_store` is only called when something is appended.
pub fn handle_import(
    format: ImportFormat,
    file: Option<&Path>,
    target: RunTarget,
    prefix: Option<String>,
    filter: Option<&str>,
    dry_run: bool,
    open_store: impl FnOnce() -> Result<SeriesStore>,
) -> Result<()> {
    let input = read_input(file)?;
    let measurements = parse_measurements(format, &input, prefix, filter)?;

    if measurements.is_empty() {
        println!("No measurements to import");
        return Ok(());
    }

    if dry_run {
        println!(
            "Measurements for commit {} in series '{}':",
            target.commit.id, target.series
        );
        for m in &measurements {
            println!("  {} = {}", m.name, format_value(m.value, m.unit));
        }
        println!("\nTotal: {} measurements", measurements.len());
        println!("\n[DRY RUN] Measurements not stored");
        return Ok(());
    }

    let count = measurements.len();
    let store = open_store()?;
    append_measurements(&store, target, measurements)?;
    println!("Successfully imported {count} measurements");

    Ok(())
}

/// Read input from stdin or file
fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display())),
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}
