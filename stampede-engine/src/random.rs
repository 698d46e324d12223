//! Injectable randomness for session decisions

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Source of the random choices a session makes
pub trait RandomSource: Send {
    /// Uniform whole number of seconds in `[min, max]`; sub-second parts of the bounds are dropped
    fn seconds_between(&mut self, min: Duration, max: Duration) -> Duration;

    /// Uniform index in `0..len`; `len` must be non-zero
    fn index(&mut self, len: usize) -> usize;
}

/// `StdRng`-backed source, reproducible from its seed
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Independent stream for one session of a run
    pub fn for_session(run_seed: u64, sequence: u64) -> Self {
        Self::new(run_seed ^ sequence)
    }
}

impl RandomSource for SeededRandom {
    fn seconds_between(&mut self, min: Duration, max: Duration) -> Duration {
        let (lo, hi) = (min.as_secs(), max.as_secs());
        if hi <= lo {
            return Duration::from_secs(lo);
        }
        Duration::from_secs(self.rng.random_range(lo..=hi))
    }

    fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.rng.random_range(0..len)
    }
}

/// Pick a run seed when none is configured
pub fn fresh_seed() -> u64 {
    rand::rng().random()
}
