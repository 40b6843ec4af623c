//! Classifies the latest run of a series against the runs preceding it.
//!
//! The baseline is a trimmed nearest-rank percentile over a window of prior
//! runs. Anything that prevents a meaningful comparison yields an
//! [`Verdict::Inconclusive`] verdict instead of an error.

use std::{fmt::Display, sync::Arc};

use log::{debug, error};

use crate::{
    data::BenchRun,
    defaults,
    series_store::{SeriesStore, StoreError},
    stats::{trimmed_percentile_with, StatsError},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationConfig {
    /// Number of prior runs forming the baseline window.
    pub window_size: usize,
    /// Nearest-rank percentile of the window used as baseline.
    pub percentile: f64,
    /// Allowed relative worsening before a run counts as regressed.
    pub threshold_ratio: f64,
    pub skip_first: bool,
    /// Leading window samples discarded when `skip_first` is set.
    pub trim_count: usize,
    pub higher_is_better: bool,
    /// Minimum number of window samples required for a verdict.
    pub min_baseline: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            window_size: defaults::DEFAULT_WINDOW_SIZE,
            percentile: defaults::DEFAULT_PERCENTILE,
            threshold_ratio: defaults::DEFAULT_THRESHOLD_RATIO,
            skip_first: defaults::DEFAULT_SKIP_FIRST,
            trim_count: defaults::DEFAULT_TRIM_COUNT,
            higher_is_better: defaults::DEFAULT_HIGHER_IS_BETTER,
            min_baseline: defaults::DEFAULT_MIN_BASELINE,
        }
    }
}

impl EvaluationConfig {
    /// Number of leading window samples to discard.
    pub fn effective_trim(&self) -> usize {
        if self.skip_first {
            self.trim_count
        } else {
            0
        }
    }

    /// Describes the first problem with this configuration, if any.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.percentile > 0.0 && self.percentile <= 100.0) {
            return Err(format!(
                "percentile {} is outside of (0, 100]",
                self.percentile
            ));
        }
        if !self.threshold_ratio.is_finite() || self.threshold_ratio < 0.0 {
            return Err(format!(
                "threshold ratio {} must be a non-negative number",
                self.threshold_ratio
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictState {
    Pending,
    Pass,
    Regressed,
    Inconclusive,
}

impl VerdictState {
    pub fn is_terminal(self) -> bool {
        self != VerdictState::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InconclusiveReason {
    /// The series holds no runs.
    NoData,
    /// No run of the series carries the measurement.
    UnknownMeasurement,
    /// The latest run does not carry the measurement.
    MissingCurrent,
    /// No prior run carries the measurement.
    NoBaseline,
    InsufficientBaseline { found: usize, required: usize },
    /// The baseline is zero or negative, so no ratio can be formed.
    DegenerateBaseline,
    InvalidConfiguration(String),
}

impl Display for InconclusiveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InconclusiveReason::NoData => write!(f, "no runs recorded"),
            InconclusiveReason::UnknownMeasurement => {
                write!(f, "measurement was never recorded in this series")
            }
            InconclusiveReason::MissingCurrent => {
                write!(f, "latest run has no value for this measurement")
            }
            InconclusiveReason::NoBaseline => write!(f, "no baseline (no prior runs)"),
            InconclusiveReason::InsufficientBaseline { found, required } => write!(
                f,
                "insufficient baseline ({found} prior runs, {required} required)"
            ),
            InconclusiveReason::DegenerateBaseline => {
                write!(f, "degenerate baseline (not above zero)")
            }
            InconclusiveReason::InvalidConfiguration(msg) => {
                write!(f, "invalid configuration: {msg}")
            }
        }
    }
}

/// Numbers behind a decided verdict. `ratio` is always `current / baseline`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub ratio: f64,
    pub baseline: f64,
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass(Comparison),
    Regressed(Comparison),
    Inconclusive(InconclusiveReason),
}

impl Verdict {
    pub fn state(&self) -> VerdictState {
        match self {
            Verdict::Pass(_) => VerdictState::Pass,
            Verdict::Regressed(_) => VerdictState::Regressed,
            Verdict::Inconclusive(_) => VerdictState::Inconclusive,
        }
    }

    pub fn is_regressed(&self) -> bool {
        matches!(self, Verdict::Regressed(_))
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        match self {
            Verdict::Pass(c) | Verdict::Regressed(c) => Some(c),
            Verdict::Inconclusive(_) => None,
        }
    }
}

/// A single evaluation of one measurement of one series.
///
/// Starts out [`VerdictState::Pending`] and settles on the first call to
/// [`Evaluation::run`]. Later calls return the settled verdict.
pub struct Evaluation<'a> {
    store: &'a SeriesStore,
    series: &'a str,
    measurement: &'a str,
    config: EvaluationConfig,
    verdict: Option<Verdict>,
}

impl<'a> Evaluation<'a> {
    pub fn new(
        store: &'a SeriesStore,
        series: &'a str,
        measurement: &'a str,
        config: EvaluationConfig,
    ) -> Self {
        Evaluation {
            store,
            series,
            measurement,
            config,
            verdict: None,
        }
    }

    pub fn state(&self) -> VerdictState {
        self.verdict
            .as_ref()
            .map_or(VerdictState::Pending, Verdict::state)
    }

    pub fn run(&mut self) -> &Verdict {
        let (store, series, measurement, config) =
            (self.store, self.series, self.measurement, &self.config);
        self.verdict
            .get_or_insert_with(|| evaluate(store, series, measurement, config))
    }

    pub fn into_verdict(self) -> Verdict {
        match self.verdict {
            Some(verdict) => verdict,
            None => evaluate(self.store, self.series, self.measurement, &self.config),
        }
    }
}

/// A verdict together with the snapshot of the series it was drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub verdict: Verdict,
    /// Latest run and baseline window, absent when the series or the
    /// measurement is unknown or the configuration is invalid.
    pub snapshot: Option<(Arc<BenchRun>, Vec<f64>)>,
}

/// Evaluates the latest run of `series` for `measurement`.
///
/// Reads one consistent snapshot of the series and never modifies the store,
/// so repeated calls on an unchanged store yield the same verdict.
pub fn evaluate(
    store: &SeriesStore,
    series: &str,
    measurement: &str,
    config: &EvaluationConfig,
) -> Verdict {
    assess(store, series, measurement, config).verdict
}

/// Like [`evaluate`], also returning the snapshot behind the verdict.
pub fn assess(
    store: &SeriesStore,
    series: &str,
    measurement: &str,
    config: &EvaluationConfig,
) -> Assessment {
    let assessment = take_snapshot(store, series, measurement, config);
    debug!("{series}/{measurement}: {:?}", assessment.verdict);
    assessment
}

fn take_snapshot(
    store: &SeriesStore,
    series: &str,
    measurement: &str,
    config: &EvaluationConfig,
) -> Assessment {
    let inconclusive = |reason| Assessment {
        verdict: Verdict::Inconclusive(reason),
        snapshot: None,
    };

    if let Err(msg) = config.validate() {
        error!("Cannot evaluate '{measurement}' of series '{series}': {msg}");
        return inconclusive(InconclusiveReason::InvalidConfiguration(msg));
    }

    match store.latest_with_window(series, measurement, config.window_size) {
        Ok((latest, window)) => Assessment {
            verdict: classify(&latest, &window, measurement, config),
            snapshot: Some((latest, window)),
        },
        Err(StoreError::UnknownMeasurement { .. }) => {
            inconclusive(InconclusiveReason::UnknownMeasurement)
        }
        Err(_) => inconclusive(InconclusiveReason::NoData),
    }
}

fn classify(
    latest: &BenchRun,
    window: &[f64],
    measurement: &str,
    config: &EvaluationConfig,
) -> Verdict {
    use InconclusiveReason::*;

    let Some(current) = latest.value_of(measurement) else {
        return Verdict::Inconclusive(MissingCurrent);
    };

    if window.is_empty() {
        return Verdict::Inconclusive(NoBaseline);
    }

    if window.len() < config.min_baseline {
        return Verdict::Inconclusive(InsufficientBaseline {
            found: window.len(),
            required: config.min_baseline,
        });
    }

    let baseline =
        match trimmed_percentile_with(window, config.percentile, config.effective_trim()) {
            Ok(baseline) => baseline,
            Err(StatsError::InsufficientSamples) => return Verdict::Inconclusive(NoBaseline),
            Err(e @ StatsError::InvalidPercentile(_)) => {
                return Verdict::Inconclusive(InvalidConfiguration(e.to_string()))
            }
        };

    if baseline <= 0.0 {
        return Verdict::Inconclusive(DegenerateBaseline);
    }

    let comparison = Comparison {
        ratio: current / baseline,
        baseline,
        current,
    };

    let worsening = if config.higher_is_better {
        baseline / current
    } else {
        comparison.ratio
    };

    // A zero throughput makes `worsening` infinite, which counts as regressed
    if worsening > 1.0 + config.threshold_ratio {
        Verdict::Regressed(comparison)
    } else {
        Verdict::Pass(comparison)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use super::*;
    use crate::data::{BenchRun, CommitInfo, Measurement};
    use crate::storage::MemoryPersistence;
    use crate::units::Unit;

    fn run(id: &str, value: f64) -> BenchRun {
        BenchRun::new(
            CommitInfo {
                id: id.to_string(),
                timestamp: 0,
                metadata: BTreeMap::new(),
            },
            vec![Measurement::new("startup", value, Unit::Milliseconds)],
        )
        .unwrap()
    }

    fn store_with(values: &[f64]) -> SeriesStore {
        let store = SeriesStore::open(MemoryPersistence::new()).unwrap();
        for (i, v) in values.iter().enumerate() {
            store.append("suite", run(&format!("c{i}"), *v)).unwrap();
        }
        store
    }

    fn no_trim() -> EvaluationConfig {
        EvaluationConfig {
            skip_first: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_regressed() {
        let store = store_with(&[10.0, 10.2, 9.8, 10.1, 15.0]);
        let verdict = evaluate(&store, "suite", "startup", &no_trim());
        let Verdict::Regressed(c) = verdict else {
            panic!("expected regression, got {verdict:?}");
        };
        assert_eq!(c.baseline, 10.2);
        assert_eq!(c.current, 15.0);
        assert!((c.ratio - 15.0 / 10.2).abs() < 1e-12);
    }

    #[test]
    fn test_pass() {
        let store = store_with(&[10.0, 10.2, 9.8, 10.1, 10.5]);
        let verdict = evaluate(&store, "suite", "startup", &no_trim());
        assert_eq!(verdict.state(), VerdictState::Pass);
        assert_eq!(verdict.comparison().unwrap().baseline, 10.2);
    }

    #[test]
    fn test_skip_first_ignores_cold_run() {
        // The cold first run would otherwise make the baseline huge
        let store = store_with(&[100.0, 1.0, 2.0, 3.0, 5.0]);
        let verdict = evaluate(&store, "suite", "startup", &EvaluationConfig::default());
        assert!(verdict.is_regressed());

        let verdict = evaluate(&store, "suite", "startup", &no_trim());
        assert_eq!(verdict.state(), VerdictState::Pass);
    }

    #[test]
    fn test_threshold_boundary_passes() {
        let store = store_with(&[10.0, 11.0]);
        let config = EvaluationConfig {
            threshold_ratio: 0.1,
            ..no_trim()
        };
        // Exactly at 1 + threshold is not a regression
        assert_eq!(
            evaluate(&store, "suite", "startup", &config).state(),
            VerdictState::Pass
        );
    }

    #[test]
    fn test_single_run_is_inconclusive() {
        let store = store_with(&[10.0]);
        assert_eq!(
            evaluate(&store, "suite", "startup", &EvaluationConfig::default()),
            Verdict::Inconclusive(InconclusiveReason::NoBaseline)
        );
    }

    #[test]
    fn test_missing_series_and_measurement() {
        let store = store_with(&[10.0, 11.0]);
        let config = EvaluationConfig::default();
        assert_eq!(
            evaluate(&store, "other", "startup", &config),
            Verdict::Inconclusive(InconclusiveReason::NoData)
        );
        assert_eq!(
            evaluate(&store, "suite", "memory", &config),
            Verdict::Inconclusive(InconclusiveReason::UnknownMeasurement)
        );
    }

    #[test]
    fn test_latest_without_measurement() {
        let store = store_with(&[10.0, 11.0]);
        store
            .append(
                "suite",
                BenchRun::new(
                    CommitInfo {
                        id: "c9".into(),
                        timestamp: 0,
                        metadata: BTreeMap::new(),
                    },
                    vec![Measurement::new("memory", 1.0, Unit::Bytes)],
                )
                .unwrap(),
            )
            .unwrap();
        assert_eq!(
            evaluate(&store, "suite", "startup", &EvaluationConfig::default()),
            Verdict::Inconclusive(InconclusiveReason::MissingCurrent)
        );
    }

    #[test]
    fn test_zero_baseline_is_degenerate() {
        let store = store_with(&[0.0, 0.0, 0.0, 4.0]);
        assert_eq!(
            evaluate(&store, "suite", "startup", &EvaluationConfig::default()),
            Verdict::Inconclusive(InconclusiveReason::DegenerateBaseline)
        );
    }

    #[test]
    fn test_min_baseline() {
        let store = store_with(&[10.0, 10.0, 10.0]);
        let config = EvaluationConfig {
            min_baseline: 3,
            ..Default::default()
        };
        assert_eq!(
            evaluate(&store, "suite", "startup", &config),
            Verdict::Inconclusive(InconclusiveReason::InsufficientBaseline {
                found: 2,
                required: 3
            })
        );
    }

    #[test]
    fn test_invalid_configuration() {
        let store = store_with(&[10.0, 10.0]);
        for config in [
            EvaluationConfig {
                percentile: 0.0,
                ..Default::default()
            },
            EvaluationConfig {
                threshold_ratio: f64::NAN,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                evaluate(&store, "suite", "startup", &config),
                Verdict::Inconclusive(InconclusiveReason::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_higher_is_better() {
        let config = EvaluationConfig {
            higher_is_better: true,
            ..no_trim()
        };

        let store = store_with(&[100.0, 100.0, 80.0]);
        let verdict = evaluate(&store, "suite", "startup", &config);
        assert!(verdict.is_regressed());
        // The ratio keeps its orientation
        assert_eq!(verdict.comparison().unwrap().ratio, 0.8);

        let store = store_with(&[100.0, 100.0, 150.0]);
        assert_eq!(
            evaluate(&store, "suite", "startup", &config).state(),
            VerdictState::Pass
        );

        let store = store_with(&[100.0, 100.0, 0.0]);
        assert!(evaluate(&store, "suite", "startup", &config).is_regressed());
    }

    #[test]
    fn test_window_size_limits_baseline() {
        let store = store_with(&[50.0, 50.0, 10.0, 10.0, 10.5]);
        let config = EvaluationConfig {
            window_size: 2,
            ..no_trim()
        };
        let verdict = evaluate(&store, "suite", "startup", &config);
        assert_eq!(verdict.comparison().unwrap().baseline, 10.0);
        assert_eq!(verdict.state(), VerdictState::Pass);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let store = store_with(&[10.0, 10.2, 9.8, 10.1, 15.0]);
        let config = EvaluationConfig::default();
        let first = evaluate(&store, "suite", "startup", &config);
        let second = evaluate(&store, "suite", "startup", &config);
        assert_eq!(first, second);
        assert_eq!(store.runs("suite").unwrap().len(), 5);
    }

    #[test]
    fn test_evaluation_lifecycle() {
        let store = store_with(&[10.0, 10.2, 9.8, 10.1, 15.0]);
        let mut evaluation = Evaluation::new(&store, "suite", "startup", no_trim());
        assert_eq!(evaluation.state(), VerdictState::Pending);
        assert!(!evaluation.state().is_terminal());

        assert!(evaluation.run().is_regressed());
        assert_eq!(evaluation.state(), VerdictState::Regressed);

        // Settled verdicts do not move even if the store changes
        store.append("suite", run("c9", 10.0)).unwrap();
        assert!(evaluation.run().is_regressed());
        assert!(evaluation.into_verdict().is_regressed());
    }

    #[test]
    fn test_pending_evaluation_settles_on_into_verdict() {
        let store = store_with(&[10.0, 10.2, 9.8, 10.1, 10.5]);
        let evaluation = Evaluation::new(&store, "suite", "startup", no_trim());
        assert_eq!(evaluation.state(), VerdictState::Pending);
        assert_eq!(evaluation.into_verdict().state(), VerdictState::Pass);
    }

    #[test]
    fn test_assessment_carries_judged_snapshot() {
        let store = store_with(&[10.0, 10.2, 9.8, 10.1, 15.0]);
        let assessment = assess(&store, "suite", "startup", &no_trim());
        assert!(assessment.verdict.is_regressed());

        let (latest, window) = assessment.snapshot.unwrap();
        assert_eq!(latest.commit_id(), "c4");
        assert_eq!(window, vec![10.0, 10.2, 9.8, 10.1]);

        let missing = assess(&store, "suite", "memory", &no_trim());
        assert_eq!(
            missing.verdict,
            Verdict::Inconclusive(InconclusiveReason::UnknownMeasurement)
        );
        assert!(missing.snapshot.is_none());
    }
}
