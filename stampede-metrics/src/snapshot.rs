//! Frozen views of the registry

use crate::kind::MetricKind;
use crate::series::MICROS_PER_MILLI;
use crate::tags::Tags;
use crate::threshold::MetricSelector;
use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Percentiles always included in summaries and exports
pub const SUMMARY_PERCENTILES: [f64; 4] = [50.0, 90.0, 95.0, 99.0];

/// Aggregates of every series at one instant
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub taken_at: DateTime<Utc>,
    /// Every declared or recorded metric name and its kind
    pub kinds: BTreeMap<String, MetricKind>,
    /// Series ordered by name, then tags
    pub series: Vec<SeriesSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesSnapshot {
    pub name: String,
    pub tags: Tags,
    pub kind: MetricKind,
    pub stats: SeriesStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SeriesStats {
    Counter { value: f64 },
    Rate(RateStats),
    Distribution(DistributionStats),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateStats {
    pub trues: u64,
    pub total: u64,
}

impl RateStats {
    /// Fraction of true samples; `None` without samples
    pub fn rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.trues as f64 / self.total as f64)
    }

    pub fn falses(&self) -> u64 {
        self.total - self.trues
    }
}

/// Exact count, sum and extremes plus an HDR histogram for percentiles
///
/// Percentiles are read from a 3-significant-digit histogram of the
/// millisecond values scaled to microseconds, so they are within 0.1%
/// of the true value and deterministic for the same samples.
#[derive(Debug, Clone)]
pub struct DistributionStats {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    histogram: Histogram<u64>,
}

impl DistributionStats {
    pub(crate) fn new(histogram: Histogram<u64>, count: u64, sum: f64, min: f64, max: f64) -> Self {
        let (min, max) = if count == 0 { (None, None) } else { (Some(min), Some(max)) };
        Self {
            count,
            sum,
            min,
            max,
            histogram,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Value at percentile `p` (0..=100), in milliseconds
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let (min, max) = (self.min?, self.max?);
        let micros = self.histogram.value_at_quantile((p / 100.0).clamp(0.0, 1.0));
        Some((micros as f64 / MICROS_PER_MILLI).clamp(min, max))
    }

    pub fn median(&self) -> Option<f64> {
        self.percentile(50.0)
    }

    fn merge(&mut self, other: &DistributionStats) {
        if let Err(e) = self.histogram.add(&other.histogram) {
            tracing::warn!(error = %e, "failed to merge distribution histograms");
        }
        self.count += other.count;
        self.sum += other.sum;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

impl Serialize for DistributionStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DistributionStats", 9)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("min", &self.min)?;
        state.serialize_field("max", &self.max)?;
        state.serialize_field("avg", &self.mean())?;
        state.serialize_field("med", &self.median())?;
        state.serialize_field("p(90)", &self.percentile(90.0))?;
        state.serialize_field("p(95)", &self.percentile(95.0))?;
        state.serialize_field("p(99)", &self.percentile(99.0))?;
        state.serialize_field("sum", &self.sum)?;
        state.end()
    }
}

impl SeriesStats {
    pub fn kind(&self) -> MetricKind {
        match self {
            SeriesStats::Counter { .. } => MetricKind::Counter,
            SeriesStats::Rate(_) => MetricKind::Rate,
            SeriesStats::Distribution(_) => MetricKind::Distribution,
        }
    }

    /// Fold another series of the same kind into this one
    fn merge(&mut self, other: &SeriesStats) {
        match (self, other) {
            (SeriesStats::Counter { value }, SeriesStats::Counter { value: other }) => {
                *value += other;
            }
            (SeriesStats::Rate(rate), SeriesStats::Rate(other)) => {
                rate.trues += other.trues;
                rate.total += other.total;
            }
            (SeriesStats::Distribution(dist), SeriesStats::Distribution(other)) => {
                dist.merge(other);
            }
            // Kinds are fixed per name, so mixed merges cannot be selected
            _ => {}
        }
    }
}

impl MetricsSnapshot {
    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.kinds.get(name).copied()
    }

    /// Merge every series named by the selector whose tags contain its filter
    pub fn select(&self, selector: &MetricSelector) -> Option<SeriesStats> {
        let mut matching = self
            .series
            .iter()
            .filter(|s| s.name == selector.name && s.tags.contains(&selector.filter));

        let mut merged = matching.next()?.stats.clone();
        for series in matching {
            merged.merge(&series.stats);
        }
        Some(merged)
    }

    /// Sum of a counter selection; missing counters read as 0
    pub fn counter(&self, selector: &MetricSelector) -> f64 {
        match self.select(selector) {
            Some(SeriesStats::Counter { value }) => value,
            _ => 0.0,
        }
    }

    pub fn rate(&self, selector: &MetricSelector) -> Option<RateStats> {
        match self.select(selector) {
            Some(SeriesStats::Rate(rate)) => Some(rate),
            _ => None,
        }
    }

    pub fn distribution(&self, selector: &MetricSelector) -> Option<DistributionStats> {
        match self.select(selector) {
            Some(SeriesStats::Distribution(dist)) => Some(dist),
            _ => None,
        }
    }

    /// Names of all series in snapshot order, without repeats
    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.series.iter().map(|s| s.name.as_str()).collect();
        names.dedup();
        names
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
