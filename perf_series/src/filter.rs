use anyhow::{Context, Result};
use itertools::Itertools;
use regex::Regex;

/// Compile measurement name patterns into regexes.
pub fn compile_filters(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).with_context(|| format!("Invalid regex pattern: '{pattern}'"))
        })
        .collect()
}

/// True if `name` matches any filter. No filters match everything.
pub fn matches_any_filter(name: &str, filters: &[Regex]) -> bool {
    filters.is_empty() || filters.iter().any(|re| re.is_match(name))
}

/// Picks the measurements to evaluate.
///
/// Explicitly named measurements are always kept. Names from `available` are
/// added when they match a filter, or unconditionally when neither names nor
/// filters were given. The result is deduplicated and keeps first-seen order.
pub fn select_measurements<'a>(
    explicit: &[String],
    filters: &[Regex],
    available: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let from_available = !filters.is_empty() || explicit.is_empty();

    explicit
        .iter()
        .cloned()
        .chain(
            available
                .into_iter()
                .filter(|_| from_available)
                .filter(|name| matches_any_filter(name, filters))
                .map(str::to_string),
        )
        .unique()
        .collect()
}
