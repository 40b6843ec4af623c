use bytesize::ByteSize;
use fundu::DurationParser;
use human_repr::{HumanCount, HumanDuration, HumanThroughput};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Unit of a measurement value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "ns")]
    Nanoseconds,
    #[serde(rename = "us")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "B")]
    Bytes,
    #[serde(rename = "B/s")]
    BytesPerSecond,
    #[serde(rename = "count")]
    Count,
}

impl Unit {
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Nanoseconds => "ns",
            Unit::Microseconds => "us",
            Unit::Milliseconds => "ms",
            Unit::Seconds => "s",
            Unit::Bytes => "B",
            Unit::BytesPerSecond => "B/s",
            Unit::Count => "count",
        }
    }

    /// Durations, sizes and rates cannot be negative.
    pub fn is_non_negative(&self) -> bool {
        !matches!(self, Unit::Count)
    }

    fn seconds_per_unit(&self) -> Option<f64> {
        match self {
            Unit::Nanoseconds => Some(1e-9),
            Unit::Microseconds => Some(1e-6),
            Unit::Milliseconds => Some(1e-3),
            Unit::Seconds => Some(1.0),
            _ => None,
        }
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" => Ok(Unit::Nanoseconds),
            "us" | "μs" | "µs" => Ok(Unit::Microseconds),
            "ms" => Ok(Unit::Milliseconds),
            "s" => Ok(Unit::Seconds),
            "B" => Ok(Unit::Bytes),
            "B/s" => Ok(Unit::BytesPerSecond),
            "count" | "" => Ok(Unit::Count),
            _ => Err(format!("Unknown unit: {}", s)),
        }
    }
}

/// Parse a numeric value with its unit string into a value of a known unit.
///
/// Canonical unit labels are kept as they are. Anything else is tried as a
/// duration (normalized to seconds), a data size (normalized to bytes) and a
/// data rate (normalized to bytes per second). Unparseable units fall back to
/// a unitless count.
pub fn parse_value_with_unit(value: f64, unit_str: &str) -> (f64, Unit) {
    let unit_str = unit_str.trim();

    if let Ok(unit) = Unit::from_str(unit_str) {
        return (value, unit);
    }

    // Try duration parsing (min, h, d, etc.)
    if let Ok(duration) = parse_duration(value, unit_str) {
        return (duration.as_secs_f64(), Unit::Seconds);
    }

    // Try data size parsing (KB, MiB, GB, etc.)
    if let Ok(size) = parse_data_size(value, unit_str) {
        return (size as f64, Unit::Bytes);
    }

    // Try data rate parsing (KB/s, MB/s, etc.)
    if unit_str.contains("/s") {
        if let Ok(rate) = parse_data_rate(value, unit_str) {
            return (rate, Unit::BytesPerSecond);
        }
    }

    log::warn!("Unknown unit '{unit_str}', storing value as count");
    (value, Unit::Count)
}

/// Format a value with auto-scaling according to its unit
pub fn format_value(value: f64, unit: Unit) -> String {
    if let Some(scale) = unit.seconds_per_unit() {
        // Out of range for a Duration falls through to the plain format
        if let Ok(duration) = Duration::try_from_secs_f64(value * scale) {
            return duration.human_duration().to_string();
        }
    }

    match unit {
        Unit::Bytes if value >= 0.0 => value.human_count_bytes().to_string(),
        Unit::BytesPerSecond if value >= 0.0 => value.human_throughput_bytes().to_string(),
        _ => format!("{:.3}", value),
    }
}

/// Helper: Parse duration from value + unit
fn parse_duration(value: f64, unit: &str) -> Result<Duration, String> {
    let parser = DurationParser::with_all_time_units();
    // Try without space first (9000ms), then with space (9000 ms)
    let inputs = [format!("{}{}", value, unit), format!("{} {}", value, unit)];

    for input in &inputs {
        if let Ok(fundu_duration) = parser.parse(input) {
            if let Ok(duration) = fundu_duration.try_into() {
                return Ok(duration);
            }
        }
    }

    Err(format!("Failed to parse duration: {} {}", value, unit))
}

/// Helper: Parse data size from value + unit
fn parse_data_size(value: f64, unit: &str) -> Result<u64, String> {
    let inputs = [format!("{}{}", value, unit), format!("{} {}", value, unit)];

    for input in &inputs {
        if let Ok(bs) = ByteSize::from_str(input) {
            return Ok(bs.as_u64());
        }
    }

    Err(format!("Failed to parse data size: {} {}", value, unit))
}

/// Helper: Parse data rate from value + unit (e.g., KB/s, MB/s)
fn parse_data_rate(value: f64, unit_with_rate: &str) -> Result<f64, String> {
    let parts: Vec<&str> = unit_with_rate.split('/').collect();
    if parts.len() != 2 || parts[1] != "s" {
        return Err("Invalid rate format".to_string());
    }

    let multiplier = match parts[0].to_lowercase().as_str() {
        "b" => 1.0,
        "kb" => 1_000.0,
        "mb" => 1_000_000.0,
        "gb" => 1_000_000_000.0,
        "kib" => 1_024.0,
        "mib" => 1_048_576.0,
        "gib" => 1_073_741_824.0,
        _ => return Err(format!("Unknown unit: {}", parts[0])),
    };

    Ok(value * multiplier)
}
