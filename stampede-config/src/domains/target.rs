//! Services under test

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};

/// Base URLs and fixture identities of the services under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Queue (admission) service base URL
    pub queue_url: String,

    /// Booking (core) service base URL, used by end-to-end runs
    pub core_url: String,

    /// Concert the simulated clients queue for
    pub concert_id: String,

    /// Schedule whose seats are queried and reserved
    pub schedule_id: i64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            queue_url: "http://queue-service:8081".to_string(),
            core_url: "http://core-service:8080".to_string(),
            concert_id: "1".to_string(),
            schedule_id: 1,
        }
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.queue_url, "queue_url", self.domain_name())?;
        validate_required_string(&self.concert_id, "concert_id", self.domain_name())?;
        validate_positive(self.schedule_id, "schedule_id", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}
