//! Parsers for benchmark harness output.
//!
//! Every parser turns its input into [`BenchmarkMeasurement`]s, which the
//! converters then turn into measurements of a bench run.

pub mod criterion_json;
pub mod hyperfine_json;
pub mod types;

pub use criterion_json::CriterionJsonParser;
pub use hyperfine_json::HyperfineJsonParser;
pub use types::{BenchStatistics, BenchmarkMeasurement, Parser};
