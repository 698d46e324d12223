//! Configuration loading and environment variable handling

use crate::domains::logging::{LogFormat, LogLevel};
use crate::domains::StampedeConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::presets::Preset;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "STAMPEDE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML or JSON file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<StampedeConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: StampedeConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load a built-in preset with environment overrides
    pub fn from_preset(&self, preset: Preset) -> ConfigResult<StampedeConfig> {
        let mut config = preset.config();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load the default preset with environment overrides
    pub fn from_env(&self) -> ConfigResult<StampedeConfig> {
        self.from_preset(Preset::default())
    }

    /// Load configuration with fallback chain: file, then preset, then default preset
    pub fn load(
        &self,
        config_path: Option<impl AsRef<Path>>,
        preset: Option<Preset>,
    ) -> ConfigResult<StampedeConfig> {
        match (config_path, preset) {
            (Some(path), _) => self.from_file(path),
            (None, Some(preset)) => self.from_preset(preset),
            (None, None) => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut StampedeConfig) -> ConfigResult<()> {
        self.apply_target_overrides(&mut config.target)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_logging_overrides(&mut config.logging)?;

        if let Ok(seed) = self.get_env_var("SEED") {
            let seed: u64 = seed
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid SEED: {}", e)))?;
            config.scenario.seed = Some(seed);
        }

        Ok(())
    }

    fn apply_target_overrides(
        &self,
        config: &mut crate::domains::target::TargetConfig,
    ) -> ConfigResult<()> {
        if let Ok(url) = self.get_env_var("QUEUE_URL") {
            config.queue_url = url;
        }

        if let Ok(url) = self.get_env_var("CORE_URL") {
            config.core_url = url;
        }

        if let Ok(concert_id) = self.get_env_var("CONCERT_ID") {
            config.concert_id = concert_id;
        }

        if let Ok(schedule_id) = self.get_env_var("SCHEDULE_ID") {
            config.schedule_id = schedule_id
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid SCHEDULE_ID: {}", e)))?;
        }

        Ok(())
    }

    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Ok(timeout) = self.get_env_var("HTTP_TIMEOUT") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_TIMEOUT: {}", e)))?;
            config.timeout = Duration::from_secs(seconds);
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
