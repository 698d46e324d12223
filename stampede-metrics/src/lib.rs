//! Metric accumulation and threshold evaluation for Stampede
//!
//! A [`MetricsRegistry`] is created once per run and shared by `Arc` with
//! every session. Samples are folded into series keyed by metric name and
//! tag set; a [`MetricsSnapshot`] freezes the aggregates for reporting and
//! for the [`threshold`] evaluator.

pub mod error;
pub mod kind;
pub mod registry;
pub mod series;
pub mod snapshot;
pub mod tags;
pub mod threshold;

pub use error::{MetricsError, MetricsResult, ThresholdParseError};
pub use kind::MetricKind;
pub use registry::{MetricSample, MetricsRegistry};
pub use snapshot::{DistributionStats, MetricsSnapshot, RateStats, SeriesSnapshot, SeriesStats};
pub use tags::Tags;
pub use threshold::{
    evaluate, Comparison, MetricSelector, Statistic, ThresholdOutcome, ThresholdRule, ThresholdSet,
};
