//! Error types for metric recording and threshold parsing

use crate::kind::MetricKind;
use thiserror::Error;

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised while recording samples
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("metric '{name}' is a {registered} metric, cannot record a {requested} sample")]
    KindMismatch {
        name: String,
        registered: MetricKind,
        requested: MetricKind,
    },

    #[error("invalid value {value} for {kind} metric '{name}'")]
    InvalidValue {
        name: String,
        kind: MetricKind,
        value: f64,
    },

    #[error("histogram error for '{name}': {reason}")]
    Histogram { name: String, reason: String },
}

/// Errors raised while parsing selectors and threshold expressions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThresholdParseError {
    #[error("invalid metric selector '{0}'")]
    InvalidSelector(String),

    #[error("invalid tag filter '{filter}' in selector '{selector}'")]
    InvalidTagFilter { selector: String, filter: String },

    #[error("invalid threshold expression '{0}'")]
    InvalidExpression(String),

    #[error("unknown statistic '{0}'")]
    UnknownStatistic(String),

    #[error("percentile must be within 0..=100, got '{0}'")]
    InvalidPercentile(String),

    #[error("invalid bound '{0}'")]
    InvalidBound(String),
}
