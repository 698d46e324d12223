//! Per-session workload configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which protocol each session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadMode {
    /// Enter the queue and stop
    EntryOnly,
    /// Enter, wait for activation, use, remove
    #[default]
    Circulation,
    /// Enter, wait for activation, query seats, reserve, pay
    EndToEnd,
    /// Validate a pooled admission token
    Validation,
}

impl WorkloadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadMode::EntryOnly => "entry_only",
            WorkloadMode::Circulation => "circulation",
            WorkloadMode::EndToEnd => "end_to_end",
            WorkloadMode::Validation => "validation",
        }
    }

    /// Whether sessions continue into the booking service after activation
    pub fn books(&self) -> bool {
        matches!(self, WorkloadMode::EndToEnd)
    }
}

impl fmt::Display for WorkloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an active session leaves the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemovalMode {
    /// Issue `DELETE /queue/remove`
    #[default]
    Explicit,
    /// Rely on the service expiring the token
    OutOfBand,
}

/// Workload behaviour shared by every session of the run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub mode: WorkloadMode,

    #[serde(default)]
    pub polling: PollingConfig,

    /// Simulated usage after activation; `~` means no usage step
    pub usage: Option<UsageConfig>,

    #[serde(default)]
    pub removal: RemovalMode,

    #[serde(default)]
    pub booking: BookingConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// How long a dispatch waits for a free slot before it is dropped
    #[serde(with = "humantime_serde", default = "default_admission_window")]
    pub admission_window: Duration,

    /// Pause at the end of every session
    #[serde(with = "humantime_serde", default)]
    pub think_time: Duration,

    /// Run seed; a random one is chosen when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Activation polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Sleep before each status request
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub interval: Duration,

    /// Status values that count as activated
    #[serde(default = "default_activated_states")]
    pub activated_states: Vec<String>,
}

/// Inclusive range the usage duration is drawn from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageConfig {
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

/// Payment request values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    #[serde(default = "default_payment_amount")]
    pub payment_amount: i64,

    #[serde(default = "default_payment_method")]
    pub payment_method: String,

    /// Call the test-data init endpoint during setup
    #[serde(default = "default_true")]
    pub init_fixture: bool,
}

/// Token-validation benchmark settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Number of users entered during setup to collect tokens
    #[serde(default = "default_token_pool_size")]
    pub token_pool_size: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            mode: WorkloadMode::default(),
            polling: PollingConfig::default(),
            usage: Some(UsageConfig {
                min: Duration::from_secs(5),
                max: Duration::from_secs(30),
            }),
            removal: RemovalMode::default(),
            booking: BookingConfig::default(),
            validation: ValidationConfig::default(),
            admission_window: default_admission_window(),
            think_time: Duration::ZERO,
            seed: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_polls: default_max_polls(),
            interval: default_poll_interval(),
            activated_states: default_activated_states(),
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            payment_amount: default_payment_amount(),
            payment_method: default_payment_method(),
            init_fixture: true,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            token_pool_size: default_token_pool_size(),
        }
    }
}

impl Validatable for ScenarioConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.admission_window.as_millis(),
            "admission_window",
            self.domain_name(),
        )?;

        match self.mode {
            WorkloadMode::EntryOnly => {}
            WorkloadMode::Circulation | WorkloadMode::EndToEnd => {
                self.polling.validate()?;
                if let Some(usage) = &self.usage {
                    usage.validate()?;
                }
            }
            WorkloadMode::Validation => self.validation.validate()?,
        }

        if self.mode.books() {
            self.booking.validate()?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "scenario"
    }
}

impl Validatable for PollingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_polls, "max_polls", self.domain_name())?;
        validate_positive(self.interval.as_millis(), "interval", self.domain_name())?;

        if self.activated_states.is_empty() {
            return Err(self.validation_error("activated_states cannot be empty"));
        }
        for state in &self.activated_states {
            validate_required_string(state, "activated state", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "scenario.polling"
    }
}

impl Validatable for UsageConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.min > self.max {
            return Err(self.validation_error(format!(
                "min ({:?}) must not exceed max ({:?})",
                self.min, self.max
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "scenario.usage"
    }
}

impl Validatable for BookingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.payment_amount, "payment_amount", self.domain_name())?;
        validate_required_string(&self.payment_method, "payment_method", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "scenario.booking"
    }
}

impl Validatable for ValidationConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.token_pool_size, "token_pool_size", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "scenario.validation"
    }
}

// Default value functions
fn default_admission_window() -> Duration {
    Duration::from_millis(100)
}

fn default_max_polls() -> u32 {
    300
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_activated_states() -> Vec<String> {
    vec!["READY".to_string(), "ACTIVE".to_string()]
}

fn default_payment_amount() -> i64 {
    50_000
}

fn default_payment_method() -> String {
    "CREDIT_CARD".to_string()
}

fn default_token_pool_size() -> u32 {
    1000
}

fn default_true() -> bool {
    true
}
