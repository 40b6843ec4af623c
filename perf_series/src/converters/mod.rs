//! Converts parsed benchmark results into measurements of a bench run.

use std::collections::HashSet;

use log::warn;

use crate::data::Measurement;
use crate::parsers::BenchmarkMeasurement;

#[derive(Debug, Clone, Default)]
pub struct ConversionOptions {
    /// Prepended to every measurement name as `<prefix>::`
    pub prefix: Option<String>,
}

/// Convert parsed benchmarks to measurements, one per available statistic.
///
/// A name produced twice keeps its first value.
pub fn convert_to_measurements(
    benchmarks: Vec<BenchmarkMeasurement>,
    options: &ConversionOptions,
) -> Vec<Measurement> {
    let mut seen = HashSet::new();

    benchmarks
        .into_iter()
        .flat_map(|bench| convert_benchmark(bench, options))
        .filter(|m| {
            let fresh = seen.insert(m.name.clone());
            if !fresh {
                warn!("Duplicate measurement '{}', keeping the first value", m.name);
            }
            fresh
        })
        .collect()
}

/// Names are `[prefix::]<bench_id>::<statistic>`. Statistics that are
/// percentiles carry a percentile label.
fn convert_benchmark(bench: BenchmarkMeasurement, options: &ConversionOptions) -> Vec<Measurement> {
    let stats = &bench.statistics;
    let candidates = [
        ("mean", stats.mean, None),
        ("median", stats.median, Some("p50")),
        ("slope", stats.slope, None),
        ("mad", stats.mad, None),
        ("stddev", stats.stddev, None),
        ("min", stats.min, Some("p0")),
        ("max", stats.max, Some("p100")),
    ];

    candidates
        .into_iter()
        .filter_map(|(statistic, value, label)| {
            let value = value?;
            let name = format_measurement_name(&bench.id, statistic, options);
            if !value.is_finite() {
                warn!("Skipping '{name}' with non-finite value {value}");
                return None;
            }
            let measurement = Measurement::new(name, value, stats.unit);
            Some(match label {
                Some(label) => measurement.with_percentile_label(label),
                None => measurement,
            })
        })
        .collect()
}

fn format_measurement_name(id: &str, statistic: &str, options: &ConversionOptions) -> String {
    match &options.prefix {
        Some(prefix) => format!("{prefix}::{id}::{statistic}"),
        None => format!("{id}::{statistic}"),
    }
}
