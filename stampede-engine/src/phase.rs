//! Runtime view of a configured arrival-rate phase

use stampede_config::PhaseConfig;
use std::time::Duration;

/// A validated phase with precomputed timing
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub name: String,
    pub rate: u32,
    pub time_unit: Duration,
    pub duration: Duration,
    pub start: Duration,
    pub graceful_stop: Duration,
    pub pre_allocated: u32,
    pub max_workers: u32,
}

impl From<&PhaseConfig> for Phase {
    fn from(config: &PhaseConfig) -> Self {
        Self {
            name: config.name.clone(),
            rate: config.rate,
            time_unit: config.time_unit,
            duration: config.duration,
            start: config.start_time,
            graceful_stop: config.graceful_stop,
            pre_allocated: config.pre_allocated_vus,
            max_workers: config.max_vus,
        }
    }
}

impl Phase {
    /// Offset from run start of iteration `k`, or `None` once past the phase
    ///
    /// Computed from `k` alone, never from earlier dispatch times.
    pub fn offset_of(&self, k: u64) -> Option<Duration> {
        if self.rate == 0 {
            return None;
        }
        let unit = self.time_unit.as_nanos();
        let within = (k as u128).checked_mul(unit)? / self.rate as u128;
        if within >= self.duration.as_nanos() {
            return None;
        }
        let within = u64::try_from(within).ok()?;
        Some(self.start + Duration::from_nanos(within))
    }

    /// Number of events the phase emits
    pub fn expected_iterations(&self) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        // ceil(duration * rate / unit)
        let numerator = self.duration.as_nanos() * self.rate as u128;
        let unit = self.time_unit.as_nanos();
        u64::try_from(numerator.div_ceil(unit)).unwrap_or(u64::MAX)
    }

    /// Offset at which dispatching stops
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    /// Offset after which in-flight sessions are interrupted
    pub fn deadline(&self) -> Duration {
        self.end() + self.graceful_stop
    }
}
