//! Run outcome, verdict and JSON summary export

use crate::session::SessionOutcome;
use crate::worker::{ItemResult, IterationOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use stampede_config::WorkloadMode;
use stampede_metrics::{MetricSelector, MetricsSnapshot, SeriesSnapshot, SeriesStats, ThresholdOutcome};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Exit code of a run whose thresholds failed
pub const THRESHOLDS_FAILED_EXIT_CODE: i32 = 99;

/// Exit code of a run stopped early by a shutdown request
pub const RUN_CANCELLED_EXIT_CODE: i32 = 105;

/// Per-run counts of how dispatched events ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTally {
    pub dispatched: u64,
    pub completed: u64,
    pub aborted: u64,
    pub dropped: u64,
    pub interrupted: u64,
}

impl RunTally {
    pub fn absorb(&mut self, result: ItemResult) {
        match result {
            ItemResult::Completed(IterationOutcome::Session(SessionOutcome::Aborted(_)))
            | ItemResult::Completed(IterationOutcome::Validation { success: false }) => {
                self.aborted += 1;
            }
            ItemResult::Completed(_) => self.completed += 1,
            ItemResult::Dropped => self.dropped += 1,
            ItemResult::Interrupted => self.interrupted += 1,
        }
    }

    /// Sessions that started (got a slot)
    pub fn started(&self) -> u64 {
        self.completed + self.aborted + self.interrupted
    }
}

/// Everything known about a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: WorkloadMode,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub tally: RunTally,
    /// The run was stopped early by a shutdown request
    pub cancelled: bool,
    pub snapshot: MetricsSnapshot,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunReport {
    pub fn thresholds_passed(&self) -> bool {
        self.thresholds.iter().all(|outcome| outcome.passed)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|outcome| !outcome.passed)
    }

    /// A cancelled run reports 105 whatever its thresholds say
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            RUN_CANCELLED_EXIT_CODE
        } else if self.thresholds_passed() {
            0
        } else {
            THRESHOLDS_FAILED_EXIT_CODE
        }
    }

    /// Every metric merged across its tag sets, by name
    pub fn metric_totals(&self) -> BTreeMap<String, SeriesStats> {
        self.snapshot
            .metric_names()
            .into_iter()
            .filter_map(|name| {
                self.snapshot
                    .select(&MetricSelector::new(name))
                    .map(|stats| (name.to_string(), stats))
            })
            .collect()
    }

    pub fn export(&self) -> SummaryExport<'_> {
        SummaryExport {
            run: RunInfo {
                run_id: self.run_id,
                mode: self.mode,
                seed: self.seed,
                started_at: self.started_at,
                duration_ms: self.elapsed.as_millis() as u64,
                cancelled: self.cancelled,
                passed: self.thresholds_passed(),
            },
            tally: self.tally,
            metrics: self.metric_totals(),
            series: &self.snapshot.series,
            thresholds: &self.thresholds,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export())
    }

    /// Write the JSON summary to `path`
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

#[derive(Debug, Serialize)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub mode: WorkloadMode,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub cancelled: bool,
    pub passed: bool,
}

/// Shape of the exported JSON summary
#[derive(Debug, Serialize)]
pub struct SummaryExport<'a> {
    pub run: RunInfo,
    pub tally: RunTally,
    pub metrics: BTreeMap<String, SeriesStats>,
    pub series: &'a [SeriesSnapshot],
    pub thresholds: &'a [ThresholdOutcome],
}
