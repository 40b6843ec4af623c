use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::Level;
use std::path::Path;

use crate::audit;
use crate::config;
use crate::filter::{compile_filters, select_measurements};
use crate::import::handle_import;
use crate::measurement_retrieval;
use crate::measurement_storage::{add, open_store, RunTarget};
use crate::regression::EvaluationConfig;
use crate::series_store::SeriesStore;
use perf_series_cli_types::{Cli, CliEvaluation, Commands};

pub fn handle_calls() -> Result<()> {
    let cli = Cli::parse();
    let logger_level = match cli.verbose {
        0 => Level::Warn,
        1 => Level::Info,
        2 => Level::Debug,
        _ => Level::Trace,
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(logger_level.as_str())).init();

    let store_dir = cli.store.as_deref();

    match cli.command {
        Commands::Add { run, measurements } => {
            let store = open_store(store_dir)?;
            add(&store, RunTarget::from_cli(&run), &measurements)
        }
        Commands::Import {
            format,
            file,
            run,
            prefix,
            filter,
            dry_run,
        } => handle_import(
            format,
            file.as_deref(),
            RunTarget::from_cli(&run),
            prefix,
            filter.as_deref(),
            dry_run,
            || open_store(store_dir),
        ),
        Commands::Evaluate {
            series,
            measurement,
            filter,
            evaluation,
        } => {
            let store = open_store(store_dir)?;
            evaluate(&store, &series, &measurement, &filter, &evaluation)
        }
        Commands::Show { series } => measurement_retrieval::show(&open_store(store_dir)?, &series),
        Commands::Window {
            series,
            measurement,
            size,
        } => measurement_retrieval::window(&open_store(store_dir)?, &series, &measurement, size),
        Commands::List {} => measurement_retrieval::list(&open_store(store_dir)?),
        Commands::Config {} => show_config_info(store_dir),
    }
}

fn evaluate(
    store: &SeriesStore,
    series: &str,
    measurements: &[String],
    filters: &[String],
    overrides: &CliEvaluation,
) -> Result<()> {
    let filters = compile_filters(filters)?;
    let latest = store.latest(series);
    let available = latest
        .iter()
        .flat_map(|run| run.measurements())
        .map(|m| m.name.as_str());
    let selected = select_measurements(measurements, &filters, available);

    let evaluations: Vec<(String, EvaluationConfig)> = selected
        .into_iter()
        .map(|name| {
            let config = apply_overrides(config::evaluation_config(&name), overrides);
            (name, config)
        })
        .collect();

    audit::evaluate_multiple(store, series, &evaluations)
}

/// Command line options take precedence over configured settings.
fn apply_overrides(mut config: EvaluationConfig, cli: &CliEvaluation) -> EvaluationConfig {
    if let Some(window_size) = cli.window_size {
        config.window_size = window_size as usize;
    }
    if let Some(percentile) = cli.percentile {
        config.percentile = percentile;
    }
    if let Some(threshold) = cli.threshold {
        config.threshold_ratio = threshold;
    }
    if let Some(trim_count) = cli.trim_count {
        config.trim_count = trim_count;
        config.skip_first = trim_count > 0;
    }
    if let Some(higher_is_better) = cli.higher_is_better {
        config.higher_is_better = higher_is_better;
    }
    if let Some(min_baseline) = cli.min_baseline {
        config.min_baseline = min_baseline as usize;
    }
    config
}

/// Show configuration file locations and the effective global settings
fn show_config_info(store_dir: Option<&Path>) -> Result<()> {
    println!("Performance Series Configuration Information");
    println!("============================================");

    match config::system_config_path() {
        Some(path) if path.is_file() => println!("User config: {} (exists)", path.display()),
        Some(path) => println!("User config: {} (not found)", path.display()),
        None => println!("User config: no home directory"),
    }
    match config::find_local_config_path() {
        Some(path) => println!("Local config: {}", path.display()),
        None => println!(
            "Local config: no {} found in this or any parent directory",
            config::LOCAL_CONFIG_FILE_NAME
        ),
    }

    let dir = store_dir.map_or_else(config::store_dir, Path::to_path_buf);
    println!("\nStore directory: {}", dir.display());
    println!(
        "Lock backoff: up to {}s",
        config::backoff_max_elapsed_seconds()
    );

    let EvaluationConfig {
        window_size,
        percentile,
        threshold_ratio,
        skip_first,
        trim_count,
        higher_is_better,
        min_baseline,
    } = config::evaluation_config("*");
    println!("\nEvaluation defaults:");
    println!("  window_size: {window_size}");
    println!("  percentile: {percentile}");
    println!("  threshold_ratio: {threshold_ratio}");
    println!("  skip_first: {skip_first}");
    println!("  trim_count: {trim_count}");
    println!("  higher_is_better: {higher_is_better}");
    println!("  min_baseline: {min_baseline}");

    Ok(())
}
