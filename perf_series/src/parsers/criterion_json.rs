use anyhow::{Context, Result};
use serde::Deserialize;

use crate::parsers::types::{BenchStatistics, BenchmarkMeasurement, Parser};
use crate::units::Unit;

/// Parser for cargo-criterion JSON format (line-delimited JSON)
pub struct CriterionJsonParser;

impl Parser for CriterionJsonParser {
    fn parse(&self, input: &str) -> Result<Vec<BenchmarkMeasurement>> {
        let mut measurements = Vec::new();

        for (line_num, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: CriterionMessage = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse JSON on line {}", line_num + 1))?;

            if let Some(measurement) = message.into_measurement() {
                measurements.push(measurement);
            }
        }

        Ok(measurements)
    }
}

#[derive(Debug, Deserialize)]
struct CriterionMessage {
    reason: String,
    #[serde(default)]
    id: String,
    unit: Option<String>,
    mean: Option<Estimate>,
    median: Option<Estimate>,
    slope: Option<Estimate>,
    median_abs_dev: Option<Estimate>,
}

#[derive(Debug, Deserialize)]
struct Estimate {
    estimate: f64,
}

impl CriterionMessage {
    fn into_measurement(self) -> Option<BenchmarkMeasurement> {
        // Only benchmark-complete messages carry results
        if self.reason != "benchmark-complete" || self.id.is_empty() {
            return None;
        }

        let unit = self.unit.as_deref().unwrap_or("ns");
        let to_ns = |e: Estimate| convert_to_nanoseconds(e.estimate, unit);

        Some(BenchmarkMeasurement {
            id: self.id,
            statistics: BenchStatistics {
                mean: self.mean.map(to_ns),
                median: self.median.map(to_ns),
                slope: self.slope.map(to_ns),
                mad: self.median_abs_dev.map(to_ns),
                ..BenchStatistics::empty(Unit::Nanoseconds)
            },
        })
    }
}

/// Convert criterion measurement to nanoseconds
fn convert_to_nanoseconds(value: f64, unit: &str) -> f64 {
    match unit {
        "ns" => value,
        "us" | "µs" | "μs" => value * 1_000.0,
        "ms" => value * 1_000_000.0,
        "s" => value * 1_000_000_000.0,
        other => {
            log::warn!("Unknown criterion unit '{other}', assuming nanoseconds");
            value
        }
    }
}
