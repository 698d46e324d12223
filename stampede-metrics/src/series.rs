//! Per-series accumulators

use crate::kind::MetricKind;
use crate::snapshot::{DistributionStats, RateStats, SeriesStats};
use hdrhistogram::Histogram;

/// Significant figures kept by distribution histograms
pub const HISTOGRAM_SIGFIG: u8 = 3;

/// Distribution values are milliseconds; the histogram stores microseconds
pub(crate) const MICROS_PER_MILLI: f64 = 1000.0;

// `new` auto-resizes, so no upper bound has to be guessed up front
fn new_histogram() -> Result<Histogram<u64>, String> {
    Histogram::new(HISTOGRAM_SIGFIG).map_err(|e| e.to_string())
}

/// Accumulator behind one (name, tags) series
#[derive(Debug, Clone)]
pub(crate) enum Series {
    Counter { sum: f64 },
    Rate { trues: u64, total: u64 },
    Distribution(DistributionAccumulator),
}

#[derive(Debug, Clone)]
pub(crate) struct DistributionAccumulator {
    histogram: Histogram<u64>,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Series {
    pub(crate) fn new(kind: MetricKind) -> Result<Self, String> {
        Ok(match kind {
            MetricKind::Counter => Series::Counter { sum: 0.0 },
            MetricKind::Rate => Series::Rate { trues: 0, total: 0 },
            MetricKind::Distribution => Series::Distribution(DistributionAccumulator {
                histogram: new_histogram()?,
                count: 0,
                sum: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            }),
        })
    }

    /// Fold one already-validated value into the series
    pub(crate) fn record(&mut self, value: f64) -> Result<(), String> {
        match self {
            Series::Counter { sum } => *sum += value,
            Series::Rate { trues, total } => {
                *total += 1;
                if value != 0.0 {
                    *trues += 1;
                }
            }
            Series::Distribution(acc) => {
                let micros = (value * MICROS_PER_MILLI).round() as u64;
                acc.histogram.record(micros).map_err(|e| e.to_string())?;
                acc.count += 1;
                acc.sum += value;
                acc.min = acc.min.min(value);
                acc.max = acc.max.max(value);
            }
        }
        Ok(())
    }

    pub(crate) fn stats(&self) -> SeriesStats {
        match self {
            Series::Counter { sum } => SeriesStats::Counter { value: *sum },
            Series::Rate { trues, total } => SeriesStats::Rate(RateStats {
                trues: *trues,
                total: *total,
            }),
            Series::Distribution(acc) => SeriesStats::Distribution(DistributionStats::new(
                acc.histogram.clone(),
                acc.count,
                acc.sum,
                acc.min,
                acc.max,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_counts_non_zero_as_true() {
        let mut series = Series::new(MetricKind::Rate).unwrap();
        for value in [1.0, 0.0, 1.0, 2.0] {
            series.record(value).unwrap();
        }
        match series.stats() {
            SeriesStats::Rate(rate) => {
                assert_eq!(rate.trues, 3);
                assert_eq!(rate.total, 4);
            }
            other => panic!("unexpected stats {:?}", other),
        }
    }

    #[test]
    fn test_distribution_tracks_exact_extremes() {
        let mut series = Series::new(MetricKind::Distribution).unwrap();
        for value in [12.5, 3.25, 7.0] {
            series.record(value).unwrap();
        }
        match series.stats() {
            SeriesStats::Distribution(dist) => {
                assert_eq!(dist.count, 3);
                assert_eq!(dist.min, Some(3.25));
                assert_eq!(dist.max, Some(12.5));
                assert!((dist.mean().unwrap() - 22.75 / 3.0).abs() < 1e-9);
            }
            other => panic!("unexpected stats {:?}", other),
        }
    }
}
