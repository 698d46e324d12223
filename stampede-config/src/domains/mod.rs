//! Domain-specific configuration modules

pub mod http;
pub mod logging;
pub mod phases;
pub mod scenario;
pub mod target;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Main Stampede configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StampedeConfig {
    /// Services under test
    #[serde(default)]
    pub target: target::TargetConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Per-session workload behaviour
    #[serde(default)]
    pub scenario: scenario::ScenarioConfig,

    /// Arrival-rate phases, in declaration order
    #[serde(default)]
    pub phases: Vec<phases::PhaseConfig>,

    /// Threshold expressions keyed by metric selector,
    /// e.g. `http_req_duration{step:enter}: ["p(95)<200"]`
    #[serde(default)]
    pub thresholds: BTreeMap<String, Vec<String>>,
}

impl StampedeConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.http.validate()?;
        self.logging.validate()?;
        self.scenario.validate()?;

        if self.scenario.mode == scenario::WorkloadMode::EndToEnd {
            crate::validation::validate_url(&self.target.core_url, "core_url", self.target.domain_name())?;
        }

        self.validate_phases()?;

        for (selector, expressions) in &self.thresholds {
            crate::validation::validate_required_string(selector, "threshold metric", "thresholds")?;
            if expressions.is_empty() {
                return Err(crate::error::ConfigError::DomainError {
                    domain: "thresholds".to_string(),
                    message: format!("threshold '{}' declares no expressions", selector),
                });
            }
        }

        Ok(())
    }

    fn validate_phases(&self) -> ConfigResult<()> {
        if self.phases.is_empty() {
            return Err(crate::error::ConfigError::DomainError {
                domain: "phases".to_string(),
                message: "At least one phase must be configured".to_string(),
            });
        }

        let mut names = HashSet::new();
        let mut previous_start = None;
        for phase in &self.phases {
            phase.validate()?;

            if !names.insert(phase.name.as_str()) {
                return Err(phase.validation_error(format!("duplicate phase name '{}'", phase.name)));
            }

            if let Some(previous) = previous_start {
                if phase.start_time < previous {
                    return Err(phase.validation_error(format!(
                        "phase '{}' starts before the phase declared ahead of it",
                        phase.name
                    )));
                }
            }
            previous_start = Some(phase.start_time);
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = crate::presets::Preset::default().config();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
