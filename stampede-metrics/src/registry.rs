//! Thread-safe metric registry shared by all sessions of a run

use crate::error::{MetricsError, MetricsResult};
use crate::kind::MetricKind;
use crate::series::Series;
use crate::snapshot::{MetricsSnapshot, SeriesSnapshot};
use crate::tags::Tags;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One immutable observation
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub kind: MetricKind,
    pub tags: Tags,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, kind: MetricKind, tags: Tags, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            tags,
            value,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    name: String,
    tags: Tags,
}

/// Registry of typed series keyed by (name, tags)
///
/// The series map is only write-locked when a new series appears; samples
/// for existing series take the map read lock and the series' own mutex.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    kinds: RwLock<HashMap<String, MetricKind>>,
    series: RwLock<HashMap<SeriesKey, Arc<Mutex<Series>>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the kind of a metric name before any sample arrives
    pub fn declare(&self, name: &str, kind: MetricKind) -> MetricsResult<()> {
        self.check_kind(name, kind)
    }

    pub fn record_sample(&self, sample: &MetricSample) -> MetricsResult<()> {
        self.record(&sample.name, sample.kind, &sample.tags, sample.value)
    }

    /// Fold `value` into the series `(name, tags)`, creating it on first use
    pub fn record(&self, name: &str, kind: MetricKind, tags: &Tags, value: f64) -> MetricsResult<()> {
        let invalid = match kind {
            MetricKind::Counter | MetricKind::Distribution => !value.is_finite() || value < 0.0,
            MetricKind::Rate => !value.is_finite(),
        };
        if invalid {
            return Err(MetricsError::InvalidValue {
                name: name.to_string(),
                kind,
                value,
            });
        }

        self.check_kind(name, kind)?;
        let series = self.series_for(name, kind, tags)?;
        let mut guard = series.lock();
        guard.record(value).map_err(|reason| MetricsError::Histogram {
            name: name.to_string(),
            reason,
        })
    }

    pub fn add_counter(&self, name: &str, tags: &Tags, delta: f64) -> MetricsResult<()> {
        self.record(name, MetricKind::Counter, tags, delta)
    }

    pub fn add_rate(&self, name: &str, tags: &Tags, success: bool) -> MetricsResult<()> {
        self.record(name, MetricKind::Rate, tags, if success { 1.0 } else { 0.0 })
    }

    pub fn add_distribution(&self, name: &str, tags: &Tags, millis: f64) -> MetricsResult<()> {
        self.record(name, MetricKind::Distribution, tags, millis)
    }

    /// Aggregate every series; later snapshots never see smaller counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let kinds: BTreeMap<String, MetricKind> = self
            .kinds
            .read()
            .iter()
            .map(|(name, kind)| (name.clone(), *kind))
            .collect();

        let handles: Vec<(SeriesKey, Arc<Mutex<Series>>)> = self
            .series
            .read()
            .iter()
            .map(|(key, series)| (key.clone(), Arc::clone(series)))
            .collect();

        let mut series: Vec<SeriesSnapshot> = handles
            .into_iter()
            .map(|(key, handle)| {
                let stats = handle.lock().stats();
                SeriesSnapshot {
                    kind: stats.kind(),
                    name: key.name,
                    tags: key.tags,
                    stats,
                }
            })
            .collect();
        series.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.tags.cmp(&b.tags)));

        MetricsSnapshot {
            taken_at: Utc::now(),
            kinds,
            series,
        }
    }

    fn check_kind(&self, name: &str, kind: MetricKind) -> MetricsResult<()> {
        if let Some(registered) = self.kinds.read().get(name) {
            return mismatch(name, *registered, kind);
        }
        let mut kinds = self.kinds.write();
        let registered = *kinds.entry(name.to_string()).or_insert(kind);
        mismatch(name, registered, kind)
    }

    fn series_for(&self, name: &str, kind: MetricKind, tags: &Tags) -> MetricsResult<Arc<Mutex<Series>>> {
        let key = SeriesKey {
            name: name.to_string(),
            tags: tags.clone(),
        };
        if let Some(series) = self.series.read().get(&key) {
            return Ok(Arc::clone(series));
        }

        let mut map = self.series.write();
        if let Some(series) = map.get(&key) {
            return Ok(Arc::clone(series));
        }
        let series = Arc::new(Mutex::new(Series::new(kind).map_err(|reason| {
            MetricsError::Histogram {
                name: name.to_string(),
                reason,
            }
        })?));
        map.insert(key, Arc::clone(&series));
        Ok(series)
    }
}

fn mismatch(name: &str, registered: MetricKind, requested: MetricKind) -> MetricsResult<()> {
    if registered == requested {
        Ok(())
    } else {
        Err(MetricsError::KindMismatch {
            name: name.to_string(),
            registered,
            requested,
        })
    }
}
