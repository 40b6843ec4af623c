use anyhow::Result;

use crate::units::Unit;

/// Summary statistics of one benchmark, all in `unit`.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchStatistics {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub slope: Option<f64>,
    pub mad: Option<f64>,
    pub stddev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub unit: Unit,
}

impl BenchStatistics {
    pub fn empty(unit: Unit) -> Self {
        BenchStatistics {
            mean: None,
            median: None,
            slope: None,
            mad: None,
            stddev: None,
            min: None,
            max: None,
            unit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkMeasurement {
    pub id: String,
    pub statistics: BenchStatistics,
}

pub trait Parser {
    fn parse(&self, input: &str) -> Result<Vec<BenchmarkMeasurement>>;
}
