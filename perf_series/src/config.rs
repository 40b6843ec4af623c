use anyhow::Result;
use config::{Config, ConfigError, File, FileFormat, Map, Value};
use log::{debug, warn};
use std::{
    env,
    fs::File as StdFile,
    io::Read,
    path::{Path, PathBuf},
};
use toml_edit::{DocumentMut, Item};

use crate::{defaults, regression::EvaluationConfig};

pub const LOCAL_CONFIG_FILE_NAME: &str = ".perfseriesconfig";
const APP_CONFIG_DIR: &str = "perf-series";

/// User-wide config (XDG_CONFIG_HOME or ~/.config/perf-series/config.toml)
pub fn system_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return Some(
            Path::new(&xdg_config_home)
                .join(APP_CONFIG_DIR)
                .join("config.toml"),
        );
    }
    dirs_next::home_dir().map(|home| home.join(".config").join(APP_CONFIG_DIR).join("config.toml"))
}

/// Nearest `.perfseriesconfig` walking up from the current directory.
pub fn find_local_config_path() -> Option<PathBuf> {
    let mut current_dir = env::current_dir().ok()?;
    loop {
        let candidate = current_dir.join(LOCAL_CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current_dir.pop() {
            return None;
        }
    }
}

/// Read hierarchical configuration (user-wide -> local override)
pub fn read_hierarchical_config() -> Result<Config, ConfigError> {
    let mut builder = Config::builder();

    if let Some(system_config_path) = system_config_path() {
        builder = builder.add_source(
            File::from(system_config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    if let Some(local_path) = find_local_config_path() {
        builder = builder.add_source(
            File::from(local_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    builder.build()
}

fn read_config_from_file<P: AsRef<Path>>(file: P) -> Result<String> {
    let mut conf_str = String::new();
    StdFile::open(file)?.read_to_string(&mut conf_str)?;
    Ok(conf_str)
}

fn hierarchical_config() -> Option<Config> {
    match read_hierarchical_config() {
        Ok(config) => Some(config),
        Err(e) => {
            // Expected when no config exists
            debug!("Could not read hierarchical config: {e}");
            None
        }
    }
}

/// Directory holding the series files, `.perf-series` if not configured.
pub fn store_dir() -> PathBuf {
    hierarchical_config()
        .and_then(|config| config.get_string("store.dir").ok())
        .map_or_else(|| PathBuf::from(defaults::DEFAULT_STORE_DIR), PathBuf::from)
}

/// Returns the backoff max elapsed seconds from config, or 60 if not set.
pub fn backoff_max_elapsed_seconds() -> u64 {
    hierarchical_config()
        .and_then(|config| config.get_int("backoff.max_elapsed_seconds").ok())
        .and_then(|seconds| u64::try_from(seconds).ok())
        .unwrap_or(defaults::DEFAULT_BACKOFF_MAX_ELAPSED_SECONDS)
}

/// The `[evaluate.measurement."*"]` table of the local config file.
///
/// Read with toml_edit since the config crate cannot address a quoted `*` key.
fn wildcard_measurement_settings() -> Option<Item> {
    let local_path = find_local_config_path()?;
    let content = read_config_from_file(&local_path)
        .map_err(|e| warn!("Cannot read {}: {e}", local_path.display()))
        .ok()?;
    let doc = content
        .parse::<DocumentMut>()
        .map_err(|e| warn!("Cannot parse {}: {e}", local_path.display()))
        .ok()?;
    doc.get("evaluate")
        .and_then(|e| e.get("measurement"))
        .and_then(|m| m.get("*"))
        .cloned()
}

/// Evaluation settings of one measurement, layered from most to least
/// specific.
struct EvaluationLayers {
    measurement: Option<Map<String, Value>>,
    wildcard: Option<Item>,
    global: Option<Map<String, Value>>,
}

impl EvaluationLayers {
    fn load(measurement: &str) -> Self {
        let config = hierarchical_config();

        // Looked up as a table entry so names with dots or colons work
        let specific = config
            .as_ref()
            .and_then(|c| c.get_table("evaluate.measurement").ok())
            .and_then(|mut measurements| measurements.remove(measurement))
            .and_then(|v| v.into_table().ok());

        EvaluationLayers {
            measurement: specific,
            wildcard: wildcard_measurement_settings(),
            global: config.and_then(|c| c.get_table("evaluate").ok()),
        }
    }

    fn lookup<T>(
        &self,
        key: &str,
        from_value: impl Fn(Value) -> Option<T>,
        from_item: impl Fn(&Item) -> Option<T>,
    ) -> Option<T> {
        let from_table =
            |table: &Option<Map<String, Value>>| table.as_ref()?.get(key).cloned().and_then(&from_value);

        from_table(&self.measurement)
            .or_else(|| self.wildcard.as_ref()?.get(key).and_then(&from_item))
            .or_else(|| from_table(&self.global))
    }

    fn float(&self, key: &str) -> Option<f64> {
        self.lookup(
            key,
            |v| v.into_float().ok(),
            |i| i.as_float().or_else(|| i.as_integer().map(|n| n as f64)),
        )
    }

    fn int(&self, key: &str) -> Option<i64> {
        self.lookup(key, |v| v.into_int().ok(), Item::as_integer)
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.lookup(key, |v| v.into_bool().ok(), Item::as_bool)
    }

    fn count(&self, key: &str, min: usize) -> Option<usize> {
        let raw = self.int(key)?;
        match usize::try_from(raw) {
            Ok(n) if n >= min => Some(n),
            _ => {
                warn!("Ignoring evaluate setting {key} = {raw}, must be at least {min}");
                None
            }
        }
    }
}

/// Evaluation settings of `measurement`.
///
/// Precedence: `[evaluate.measurement."<name>"]`, then
/// `[evaluate.measurement."*"]`, then `[evaluate]`, then built-in defaults.
pub fn evaluation_config(measurement: &str) -> EvaluationConfig {
    let layers = EvaluationLayers::load(measurement);
    let defaults = EvaluationConfig::default();

    EvaluationConfig {
        window_size: layers.count("window_size", 1).unwrap_or(defaults.window_size),
        percentile: layers.float("percentile").unwrap_or(defaults.percentile),
        threshold_ratio: layers
            .float("threshold_ratio")
            .unwrap_or(defaults.threshold_ratio),
        skip_first: layers.bool("skip_first").unwrap_or(defaults.skip_first),
        trim_count: layers.count("trim_count", 0).unwrap_or(defaults.trim_count),
        higher_is_better: layers
            .bool("higher_is_better")
            .unwrap_or(defaults.higher_is_better),
        min_baseline: layers
            .count("min_baseline", 0)
            .unwrap_or(defaults.min_baseline),
    }
}
