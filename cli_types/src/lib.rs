use anyhow::{anyhow, bail, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImportFormat {
    /// Line-delimited JSON messages emitted by `cargo criterion --message-format=json`
    CriterionJson,
    /// JSON written by `hyperfine --export-json`
    HyperfineJson,
}

#[derive(Parser)]
#[command(version, name = "perf-series")]
pub struct Cli {
    /// Increase verbosity level (can be specified multiple times.) The first level sets level
    /// "info", second sets level "debug", and third sets level "trace" for the logger.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory holding the series files. Overrides `store.dir` from the configuration.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Create a versionless command for manpage generation
    pub fn command_without_version() -> clap::Command {
        let mut cmd = Self::command();
        cmd = cmd.version(None::<&str>);
        cmd
    }
}

/// A single `name[@label]=value[unit]` measurement given on the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementSpec {
    pub name: String,
    pub percentile_label: Option<String>,
    pub value: f64,
    pub unit: Option<String>,
}

#[derive(Args)]
pub struct CliRun {
    /// Name of the benchmark series (suite) to append to
    #[arg(short = 's', long, value_parser=parse_spaceless_string)]
    pub series: String,

    /// Commit the results belong to
    #[arg(short = 'c', long, value_parser=parse_spaceless_string)]
    pub commit: String,

    /// Timestamp of the run in milliseconds since the UNIX epoch. Defaults to now.
    #[arg(long)]
    pub timestamp: Option<i64>,

    /// Commit metadata as key-value pairs separated by '='
    #[arg(short, long, value_parser=parse_key_value)]
    pub key_value: Vec<(String, String)>,

    /// Append even if the commit already has a run in this series
    #[arg(long)]
    pub rerun: bool,
}

#[derive(Args)]
pub struct CliEvaluation {
    /// Number of runs preceding the latest one used as baseline
    #[arg(short = 'n', long, value_parser=clap::value_parser!(u32).range(1..))]
    pub window_size: Option<u32>,

    /// Percentile (0, 100] of the baseline window the latest value is compared to
    #[arg(short, long)]
    pub percentile: Option<f64>,

    /// Relative slowdown tolerated before a regression is reported (0.1 = 10%)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Number of oldest baseline samples discarded as cold-start outliers (0 disables)
    #[arg(long)]
    pub trim_count: Option<usize>,

    /// Treat larger values as better (throughput-style measurements)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub higher_is_better: Option<bool>,

    /// Minimum number of baseline samples needed. If less, the verdict is inconclusive.
    #[arg(long, value_parser=clap::value_parser!(u32).range(1..))]
    pub min_baseline: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Append one bench run with the given measurements
    Add {
        #[command(flatten)]
        run: CliRun,

        /// Measurement as `name[@label]=value[unit]`, e.g. `startup=12.5ms` or `latency@p99=3us`
        #[arg(short = 'm', long = "measurement", value_parser=parse_measurement_spec, required = true)]
        measurements: Vec<MeasurementSpec>,
    },

    /// Import a bench run from the output of an external benchmark runner
    Import {
        /// Format of the input
        #[arg(short, long, value_enum)]
        format: ImportFormat,

        /// Input file. Reads stdin if omitted.
        #[arg(short = 'i', long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        run: CliRun,

        /// Prefix prepended to every imported measurement name
        #[arg(long, value_parser=parse_spaceless_string)]
        prefix: Option<String>,

        /// Only import measurements whose name matches this regex
        #[arg(long)]
        filter: Option<String>,

        /// Print what would be imported without appending
        #[arg(long)]
        dry_run: bool,
    },

    /// For the given measurements, compare the latest run of a series against
    /// a robust percentile of the runs preceding it.
    ///
    /// The oldest sample of the baseline window is discarded before the
    /// percentile is taken, since the first run after a cold start is
    /// systematically slower. The baseline is the nearest-rank percentile of
    /// the remaining samples.
    ///
    /// ## Verdicts
    ///
    /// - **pass**: `latest / baseline <= 1 + threshold`
    /// - **regressed**: `latest / baseline > 1 + threshold`
    /// - **inconclusive**: no data, no baseline, or a zero baseline
    ///
    /// For measurements where higher is better the comparison is inverted.
    /// Only regressed verdicts cause a non-zero exit status.
    ///
    /// ## Configuration
    ///
    /// Settings are read from `.perfseriesconfig`:
    ///
    /// - `[evaluate].threshold_ratio = 0.05`
    /// - `[evaluate.measurement."name"].higher_is_better = true`
    /// - `[evaluate.measurement."*"].window_size = 20`
    ///
    /// CLI options take precedence over measurement-specific settings, which
    /// take precedence over the wildcard and the global settings.
    Evaluate {
        /// Series to evaluate
        #[arg(short = 's', long, value_parser=parse_spaceless_string)]
        series: String,

        /// Measurements to evaluate. Evaluates every measurement of the latest run if omitted.
        #[arg(short, long, value_parser=parse_spaceless_string, action = clap::ArgAction::Append)]
        measurement: Vec<String>,

        /// Regex selecting measurements of the latest run (combined with OR)
        #[arg(long)]
        filter: Vec<String>,

        #[command(flatten)]
        evaluation: CliEvaluation,
    },

    /// Show the latest run of a series
    Show {
        #[arg(short = 's', long, value_parser=parse_spaceless_string)]
        series: String,
    },

    /// Print the baseline window of a measurement
    Window {
        #[arg(short = 's', long, value_parser=parse_spaceless_string)]
        series: String,

        #[arg(short, long, value_parser=parse_spaceless_string)]
        measurement: String,

        /// Number of runs preceding the latest one
        #[arg(short = 'n', long, default_value = "10")]
        size: usize,
    },

    /// List all series in the store
    List {},

    /// Show configuration information
    Config {},
}

fn parse_key_value(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow!("invalid key=value: no '=' found in '{}'", s))?;
    let key = parse_spaceless_string(&s[..pos])?;
    let value = parse_spaceless_string(&s[pos + 1..])?;
    Ok((key, value))
}

fn parse_spaceless_string(s: &str) -> Result<String> {
    if s.split_whitespace().count() > 1 {
        Err(anyhow!("invalid string/key/value: found space in '{}'", s))
    } else {
        Ok(String::from(s))
    }
}

fn parse_measurement_spec(s: &str) -> Result<MeasurementSpec> {
    let (lhs, rhs) = parse_key_value(s)?;
    if lhs.is_empty() {
        bail!("missing measurement name in '{}'", s);
    }

    let (name, percentile_label) = match lhs.split_once('@') {
        Some((name, label)) if !name.is_empty() && !label.is_empty() => {
            (name.to_string(), Some(label.to_string()))
        }
        Some(_) => bail!("invalid measurement label in '{}'", s),
        None => (lhs, None),
    };

    let split = rhs
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .unwrap_or(rhs.len());
    // An exponent marker must be followed by digits, otherwise it starts the unit.
    let split = match rhs[..split].rfind(['e', 'E']) {
        Some(pos) if pos + 1 == split => pos,
        _ => split,
    };
    let (number, unit) = rhs.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|e| anyhow!("invalid value '{}' in '{}': {}", number, s, e))?;
    let unit = (!unit.is_empty()).then(|| unit.to_string());

    Ok(MeasurementSpec {
        name,
        percentile_label,
        value,
        unit,
    })
}
