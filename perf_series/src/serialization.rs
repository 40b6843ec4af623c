use std::borrow::Borrow;

use itertools::Itertools;
use log::warn;

use crate::data::BenchRun;

/// Serializes a run into a single newline-terminated JSON line.
pub fn serialize_single<R>(run: &R) -> Result<String, serde_json::Error>
where
    R: Borrow<BenchRun>,
{
    let mut line = serde_json::to_string(run.borrow())?;
    line.push('\n');
    Ok(line)
}

fn deserialize_single(line_num: usize, line: &str) -> Option<BenchRun> {
    match serde_json::from_str(line) {
        Ok(run) => Some(run),
        Err(err) => {
            warn!("Cannot parse bench run on line {line_num}: {err}, skipping record");
            None
        }
    }
}

/// Deserializes JSON lines, skipping blank and malformed lines.
pub fn deserialize(lines: &str) -> Vec<BenchRun> {
    lines
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .filter_map(|(i, l)| deserialize_single(i + 1, l))
        .collect_vec()
}
