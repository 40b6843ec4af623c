pub mod audit;
pub mod cli;
pub mod config;
pub mod converters;
pub mod data;
pub mod defaults;
pub mod filter;
pub mod import;
pub mod measurement_retrieval;
pub mod measurement_storage;
pub mod parsers;
pub mod regression;
pub mod serialization;
pub mod series_store;
pub mod stats;
pub mod storage;
pub mod units;

// Shared by unit tests, integration tests and benchmarks
#[doc(hidden)]
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
