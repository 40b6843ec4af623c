use std::cmp::Ordering;
use std::iter;

use anyhow::{bail, Result};
use itertools::Itertools;
use sparklines::spark;

use crate::{
    defaults,
    regression::{self, Assessment, Comparison, EvaluationConfig, Verdict},
    series_store::SeriesStore,
    stats,
    units::{format_value, Unit},
};

/// Arrow showing how the current value moved relative to the baseline.
fn get_direction_arrow(current: f64, baseline: f64) -> &'static str {
    match current.total_cmp(&baseline) {
        Ordering::Greater => "↑",
        Ordering::Less => "↓",
        Ordering::Equal => "→",
    }
}

fn short_commit(id: &str) -> &str {
    id.char_indices()
        .nth(defaults::DEFAULT_COMMIT_HASH_DISPLAY_LENGTH)
        .map_or(id, |(end, _)| &id[..end])
}

#[derive(Debug, PartialEq)]
struct AuditResult {
    message: String,
    verdict: Verdict,
}

/// Evaluates each measurement of `series` with its configuration and prints
/// one report block per measurement.
///
/// Fails only if at least one measurement regressed. Inconclusive verdicts
/// are reported but do not fail.
pub fn evaluate_multiple(
    store: &SeriesStore,
    series: &str,
    evaluations: &[(String, EvaluationConfig)],
) -> Result<()> {
    if evaluations.is_empty() {
        println!("No measurements to evaluate in series '{series}'.");
        return Ok(());
    }

    let mut regressed = Vec::new();

    for (measurement, config) in evaluations {
        let result = audit(store, series, measurement, config);
        println!("{}", result.message);

        if result.verdict.is_regressed() {
            regressed.push(measurement.as_str());
        }
    }

    if !regressed.is_empty() {
        bail!(
            "{} measurement(s) regressed in series '{series}': {}",
            regressed.len(),
            regressed.iter().join(", ")
        );
    }

    Ok(())
}

fn audit(
    store: &SeriesStore,
    series: &str,
    measurement: &str,
    config: &EvaluationConfig,
) -> AuditResult {
    let Assessment { verdict, snapshot } =
        regression::assess(store, series, measurement, config);

    let comparison = match &verdict {
        Verdict::Inconclusive(reason) => {
            return AuditResult {
                message: format!("❔ '{measurement}'\nInconclusive: {reason}."),
                verdict,
            };
        }
        Verdict::Pass(c) | Verdict::Regressed(c) => *c,
    };

    // Decided verdicts always come with the snapshot they were judged on
    let (commit, unit, window) = snapshot
        .and_then(|(run, window)| {
            let unit = run.measurement(measurement)?.unit;
            Some((short_commit(run.commit_id()).to_string(), unit, window))
        })
        .unwrap_or_else(|| (String::new(), Unit::Count, Vec::new()));

    let text_summary = summarize(&comparison, &window, unit, config);

    let message = if verdict.is_regressed() {
        format!(
            "❌ '{measurement}' ({commit})\nLatest run regressed beyond the allowed threshold.\n{text_summary}"
        )
    } else {
        format!("✅ '{measurement}' ({commit})\n{text_summary}")
    };

    AuditResult { message, verdict }
}

fn summarize(
    comparison: &Comparison,
    window: &[f64],
    unit: Unit,
    config: &EvaluationConfig,
) -> String {
    let Comparison {
        ratio,
        baseline,
        current,
    } = *comparison;

    let limit = if config.higher_is_better {
        format!("ratio ≥ {:.2}", 1.0 / (1.0 + config.threshold_ratio))
    } else {
        format!("ratio ≤ {:.2}", 1.0 + config.threshold_ratio)
    };

    let window_summary = stats::aggregate_measurements(window.iter().copied());

    let all_values = window
        .iter()
        .copied()
        .chain(iter::once(current))
        .collect_vec();
    let relative_min = all_values.iter().copied().fold(f64::INFINITY, f64::min) / baseline - 1.0;
    let relative_max =
        all_values.iter().copied().fold(f64::NEG_INFINITY, f64::max) / baseline - 1.0;

    format!(
        "ratio: {}{ratio:.3} ({limit})\nLatest: {}\nBaseline p{}: {}\nWindow: {window_summary}\n [{:+.1}% – {:+.1}%] {}",
        get_direction_arrow(current, baseline),
        format_value(current, unit),
        config.percentile,
        format_value(baseline, unit),
        relative_min * 100.0,
        relative_max * 100.0,
        spark(all_values.as_slice()),
    )
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use super::*;
    use crate::data::{BenchRun, CommitInfo, Measurement};
    use crate::regression::InconclusiveReason;
    use crate::storage::MemoryPersistence;

    fn store_with(values: &[f64]) -> SeriesStore {
        let store = SeriesStore::open(MemoryPersistence::new()).unwrap();
        for (i, v) in values.iter().enumerate() {
            let run = BenchRun::new(
                CommitInfo {
                    id: format!("{i:040}"),
                    timestamp: i as i64,
                    metadata: BTreeMap::new(),
                },
                vec![Measurement::new("startup", *v, Unit::Milliseconds)],
            )
            .unwrap();
            store.append("suite", run).unwrap();
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
    fn test_direction_arrows() {
        assert_eq!(get_direction_arrow(5.0, 3.0), "↑");
        assert_eq!(get_direction_arrow(1.0, 3.0), "↓");
        assert_eq!(get_direction_arrow(3.0, 3.0), "→");
    }

    #[test]
    fn test_short_commit() {
        assert_eq!(short_commit("0123456789abcdef"), "01234567");
        assert_eq!(short_commit("abc"), "abc");
    }

    #[test]
    fn test_audit_regressed_message() {
        let store = store_with(&[10.0, 10.2, 9.8, 10.1, 15.0]);
        let result = audit(&store, "suite", "startup", &no_trim());
        assert!(result.verdict.is_regressed());
        assert!(result.message.starts_with("❌ 'startup' (00000000)"));
        assert!(result.message.contains("ratio: ↑1.471 (ratio ≤ 1.10)"));
        assert!(result.message.contains("Baseline p90:"));
        assert!(result.message.contains("n: 4"));
    }

    #[test]
    fn test_audit_pass_message() {
        let store = store_with(&[10.0, 10.2, 9.8, 10.1, 10.2]);
        let result = audit(&store, "suite", "startup", &no_trim());
        assert_eq!(result.verdict.state(), regression::VerdictState::Pass);
        assert!(result.message.starts_with("✅ 'startup'"));
        assert!(result.message.contains("ratio: →1.000"));
    }

    #[test]
    fn test_audit_inconclusive_message() {
        let store = store_with(&[10.0]);
        let result = audit(&store, "suite", "startup", &no_trim());
        assert_eq!(
            result.verdict,
            Verdict::Inconclusive(InconclusiveReason::NoBaseline)
        );
        assert_eq!(
            result.message,
            "❔ 'startup'\nInconclusive: no baseline (no prior runs)."
        );
    }

    #[test]
    fn test_evaluate_multiple_fails_only_on_regression() {
        let store = store_with(&[10.0, 10.2, 9.8, 10.1, 15.0]);

        let inconclusive_and_pass = [
            ("memory".to_string(), no_trim()),
            (
                "startup".to_string(),
                EvaluationConfig {
                    threshold_ratio: 1.0,
                    ..no_trim()
                },
            ),
        ];
        assert!(evaluate_multiple(&store, "suite", &inconclusive_and_pass).is_ok());

        let regressed = [("startup".to_string(), no_trim())];
        let err = evaluate_multiple(&store, "suite", &regressed).unwrap_err();
        assert!(err.to_string().contains("startup"));
    }

    #[test]
    fn test_evaluate_multiple_nothing_to_do() {
        let store = store_with(&[]);
        assert!(evaluate_multiple(&store, "suite", &[]).is_ok());
    }
}
