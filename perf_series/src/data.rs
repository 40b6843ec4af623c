use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::units::Unit;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum RunError {
    #[error("A bench run needs a non-empty commit id")]
    EmptyCommitId,

    #[error("Measurement name must not be empty")]
    EmptyMeasurementName,

    #[error("Duplicate measurement '{name}' in run for commit {commit}")]
    DuplicateMeasurement { commit: String, name: String },

    #[error("Measurement '{name}' has non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },

    #[error("Measurement '{name}' has negative value {value} for unit {unit}")]
    NegativeValue { name: String, value: f64, unit: Unit },
}

/// A single named observation of a bench run.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
    pub unit: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile_label: Option<String>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, value: f64, unit: Unit) -> Self {
        Measurement {
            name: name.into(),
            value,
            unit,
            percentile_label: None,
        }
    }

    #[must_use]
    pub fn with_percentile_label(mut self, label: impl Into<String>) -> Self {
        self.percentile_label = Some(label.into());
        self
    }

    fn validate(&self) -> Result<(), RunError> {
        if self.name.is_empty() {
            return Err(RunError::EmptyMeasurementName);
        }
        if !self.value.is_finite() {
            return Err(RunError::NonFiniteValue {
                name: self.name.clone(),
                value: self.value,
            });
        }
        if self.unit.is_non_negative() && self.value < 0.0 {
            return Err(RunError::NegativeValue {
                name: self.name.clone(),
                value: self.value,
                unit: self.unit,
            });
        }
        Ok(())
    }
}

/// Identity of the commit a bench run was taken for.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// All measurements of one benchmark suite execution for one commit.
///
/// Runs are validated on construction and immutable afterwards. Measurements
/// keep their declaration order.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct BenchRun {
    commit: CommitInfo,
    measurements: Vec<Measurement>,
}

impl BenchRun {
    pub fn new(commit: CommitInfo, measurements: Vec<Measurement>) -> Result<Self, RunError> {
        if commit.id.is_empty() {
            return Err(RunError::EmptyCommitId);
        }

        let mut seen = HashSet::with_capacity(measurements.len());
        for m in &measurements {
            m.validate()?;
            if !seen.insert(m.name.as_str()) {
                return Err(RunError::DuplicateMeasurement {
                    commit: commit.id.clone(),
                    name: m.name.clone(),
                });
            }
        }

        Ok(BenchRun {
            commit,
            measurements,
        })
    }

    pub fn commit(&self) -> &CommitInfo {
        &self.commit
    }

    pub fn commit_id(&self) -> &str {
        &self.commit.id
    }

    pub fn timestamp(&self) -> i64 {
        self.commit.timestamp
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    #[must_use]
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.name == name)
    }

    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.measurement(name).map(|m| m.value)
    }
}

#[derive(Deserialize)]
struct RawBenchRun {
    commit: CommitInfo,
    #[serde(default)]
    measurements: Vec<Measurement>,
}

// Deserialization goes through the validating constructor.
impl<'de> Deserialize<'de> for BenchRun {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawBenchRun::deserialize(deserializer)?;
        BenchRun::new(raw.commit, raw.measurements).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(id: &str) -> CommitInfo {
        CommitInfo {
            id: id.to_string(),
            timestamp: 1_700_000_000_000,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_new_keeps_declaration_order() {
        let run = BenchRun::new(
            commit("abc123"),
            vec![
                Measurement::new("zeta", 3.0, Unit::Seconds),
                Measurement::new("alpha", 1.0, Unit::Seconds),
                Measurement::new("mid", 2.0, Unit::Count),
            ],
        )
        .unwrap();

        let names: Vec<_> = run.measurements().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(run.value_of("alpha"), Some(1.0));
        assert_eq!(run.value_of("missing"), None);
        assert_eq!(run.commit_id(), "abc123");
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = BenchRun::new(
            commit("abc123"),
            vec![
                Measurement::new("startup", 3.0, Unit::Seconds),
                Measurement::new("startup", 1.0, Unit::Seconds),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            RunError::DuplicateMeasurement {
                commit: "abc123".into(),
                name: "startup".into()
            }
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        // Negative durations and sizes are invalid
        assert!(matches!(
            BenchRun::new(
                commit("c"),
                vec![Measurement::new("t", -1.0, Unit::Milliseconds)]
            ),
            Err(RunError::NegativeValue { .. })
        ));
        assert!(matches!(
            BenchRun::new(commit("c"), vec![Measurement::new("rss", -1.0, Unit::Bytes)]),
            Err(RunError::NegativeValue { .. })
        ));

        // Counts may be negative (e.g. deltas)
        assert!(BenchRun::new(commit("c"), vec![Measurement::new("delta", -1.0, Unit::Count)]).is_ok());

        assert!(matches!(
            BenchRun::new(
                commit("c"),
                vec![Measurement::new("t", f64::NAN, Unit::Seconds)]
            ),
            Err(RunError::NonFiniteValue { .. })
        ));
        assert_eq!(
            BenchRun::new(commit(""), vec![]).unwrap_err(),
            RunError::EmptyCommitId
        );
        assert_eq!(
            BenchRun::new(commit("c"), vec![Measurement::new("", 1.0, Unit::Count)]).unwrap_err(),
            RunError::EmptyMeasurementName
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"commit":{"id":"abc","timestamp":1},"measurements":[{"name":"a","value":1.0,"unit":"s"},{"name":"a","value":2.0,"unit":"s"}]}"#;
        let result: Result<BenchRun, _> = serde_json::from_str(json);
        assert!(result.is_err());

        let json = r#"{"commit":{"id":"abc","timestamp":1},"measurements":[{"name":"a","value":1.0,"unit":"s","percentile_label":"p90"}]}"#;
        let run: BenchRun = serde_json::from_str(json).unwrap();
        assert_eq!(
            run.measurement("a").unwrap().percentile_label.as_deref(),
            Some("p90")
        );
    }
}
