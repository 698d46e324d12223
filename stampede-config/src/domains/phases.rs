//! Arrival-rate phase configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One constant-arrival-rate phase of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub name: String,

    /// Iterations started per `time_unit`; 0 makes the phase an observation window
    pub rate: u32,

    #[serde(with = "humantime_serde", default = "default_time_unit")]
    pub time_unit: Duration,

    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    #[serde(default)]
    pub pre_allocated_vus: u32,

    pub max_vus: u32,

    /// Offset from run start
    #[serde(with = "humantime_serde", default)]
    pub start_time: Duration,

    /// Drain interval after the phase ends
    #[serde(with = "humantime_serde", default = "default_graceful_stop")]
    pub graceful_stop: Duration,
}

impl PhaseConfig {
    /// Convenience constructor with default time unit and graceful stop
    pub fn new(name: impl Into<String>, rate: u32, duration: Duration, pre_allocated_vus: u32, max_vus: u32) -> Self {
        Self {
            name: name.into(),
            rate,
            time_unit: default_time_unit(),
            duration,
            pre_allocated_vus,
            max_vus,
            start_time: Duration::ZERO,
            graceful_stop: default_graceful_stop(),
        }
    }

    pub fn starting_at(mut self, start_time: Duration) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    /// Offset from run start at which the phase stops dispatching
    pub fn end_time(&self) -> Duration {
        self.start_time + self.duration
    }
}

impl Validatable for PhaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.name, "name", self.domain_name())?;
        validate_positive(self.duration.as_nanos(), "duration", self.domain_name())?;
        validate_positive(self.time_unit.as_nanos(), "time_unit", self.domain_name())?;
        validate_positive(self.max_vus, "max_vus", self.domain_name())?;

        if self.pre_allocated_vus > self.max_vus {
            return Err(self.validation_error(format!(
                "phase '{}': pre_allocated_vus ({}) exceeds max_vus ({})",
                self.name, self.pre_allocated_vus, self.max_vus
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "phases"
    }
}

fn default_time_unit() -> Duration {
    Duration::from_secs(1)
}

fn default_graceful_stop() -> Duration {
    Duration::from_secs(30)
}
