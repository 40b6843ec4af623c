use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Deserialize;

use crate::parsers::types::{BenchStatistics, BenchmarkMeasurement, Parser};
use crate::units::Unit;

/// Parser for the document written by `hyperfine --export-json`.
///
/// Hyperfine reports every statistic in seconds. Whitespace in command names
/// is replaced by underscores to form the benchmark id.
pub struct HyperfineJsonParser;

#[derive(Debug, Deserialize)]
struct HyperfineExport {
    results: Vec<HyperfineResult>,
}

#[derive(Debug, Deserialize)]
struct HyperfineResult {
    command: String,
    mean: Option<f64>,
    stddev: Option<f64>,
    median: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl Parser for HyperfineJsonParser {
    fn parse(&self, input: &str) -> Result<Vec<BenchmarkMeasurement>> {
        let export: HyperfineExport =
            serde_json::from_str(input).context("Failed to parse hyperfine JSON export")?;

        Ok(export
            .results
            .into_iter()
            .map(|result| BenchmarkMeasurement {
                id: result.command.split_whitespace().join("_"),
                statistics: BenchStatistics {
                    mean: result.mean,
                    median: result.median,
                    stddev: result.stddev,
                    min: result.min,
                    max: result.max,
                    ..BenchStatistics::empty(Unit::Seconds)
                },
            })
            .filter(|bench| !bench.id.is_empty())
            .collect())
    }
}
