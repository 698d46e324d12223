//! Domain-driven configuration management for Stampede
//!
//! This crate provides modular configuration split by functional domains
//! (target services, HTTP client, logging, scenario behaviour, phases and
//! thresholds), with validation, defaults, built-in presets and environment
//! variable overrides.

pub mod error;
pub mod loader;
pub mod presets;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use presets::Preset;

// Re-export domain configurations
pub use domains::{
    http::HttpConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    phases::PhaseConfig,
    scenario::{
        BookingConfig, PollingConfig, RemovalMode, ScenarioConfig, UsageConfig,
        ValidationConfig, WorkloadMode,
    },
    target::TargetConfig,
    StampedeConfig,
};
