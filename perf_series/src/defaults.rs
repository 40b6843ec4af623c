//! Centralized default values for perf-series configuration.
//!
//! These defaults are used as fallback values when neither the command line
//! nor the configuration files provide a setting.

// ============================================================================
// Evaluation Defaults
// ============================================================================

/// Default number of runs preceding the latest one that form the baseline.
///
/// Benchmark histories are short and noisy; ten runs is enough to smooth
/// out a single bad run without reaching back past unrelated changes.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Default percentile of the baseline window the latest value is compared to.
pub const DEFAULT_PERCENTILE: f64 = 90.0;

/// Default tolerated relative slowdown before a regression is reported.
///
/// A value of 0.1 flags the latest run when it is more than 10% worse than
/// the baseline percentile.
pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.1;

/// Whether the oldest baseline sample is discarded by default.
pub const DEFAULT_SKIP_FIRST: bool = true;

/// Default number of leading baseline samples discarded when skipping is on.
pub const DEFAULT_TRIM_COUNT: usize = 1;

/// Whether larger values are better by default. Durations are the common
/// case, so this is off.
pub const DEFAULT_HIGHER_IS_BETTER: bool = false;

/// Default minimum number of baseline samples required for a verdict.
pub const DEFAULT_MIN_BASELINE: usize = 1;

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default directory of the series files, relative to the working directory.
pub const DEFAULT_STORE_DIR: &str = ".perf-series";

/// Default maximum elapsed time (in seconds) for acquiring a series lock.
///
/// A concurrent writer holding the lock makes the append retry with
/// exponential backoff up to this duration before giving up.
pub const DEFAULT_BACKOFF_MAX_ELAPSED_SECONDS: u64 = 60;

// ============================================================================
// Reporting Defaults
// ============================================================================

/// Number of characters of a commit id shown in reports.
pub const DEFAULT_COMMIT_HASH_DISPLAY_LENGTH: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_defaults() {
        assert_eq!(DEFAULT_WINDOW_SIZE, 10);
        assert_eq!(DEFAULT_PERCENTILE, 90.0);
        assert_eq!(DEFAULT_THRESHOLD_RATIO, 0.1);
        assert!(DEFAULT_SKIP_FIRST);
        assert_eq!(DEFAULT_TRIM_COUNT, 1);
        assert!(!DEFAULT_HIGHER_IS_BETTER);
        assert_eq!(DEFAULT_MIN_BASELINE, 1);
    }

    #[test]
    fn test_storage_defaults() {
        assert_eq!(DEFAULT_STORE_DIR, ".perf-series");
        assert_eq!(DEFAULT_BACKOFF_MAX_ELAPSED_SECONDS, 60);
    }
}
