//! Aggregation kinds of metric series

use serde::{Deserialize, Serialize};
use std::fmt;

/// How samples of a metric are aggregated; fixed per metric name for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic sum
    Counter,
    /// Fraction of non-zero samples
    Rate,
    /// Latency-style values in milliseconds
    Distribution,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Rate => "rate",
            MetricKind::Distribution => "distribution",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
