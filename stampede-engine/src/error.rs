//! Error types for run setup and execution

use stampede_config::ConfigError;
use stampede_http::ProtocolError;
use stampede_metrics::{MetricsError, ThresholdParseError};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failures that stop a run before or outside its phases
///
/// Per-session failures never surface here; they become metrics.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid threshold: {0}")]
    ThresholdError(#[from] ThresholdParseError),

    #[error("Health check failed for {service}: {source}")]
    HealthCheckFailed {
        service: &'static str,
        #[source]
        source: ProtocolError,
    },

    #[error("Test fixture creation failed: {0}")]
    FixtureFailed(#[source] ProtocolError),

    #[error("Token pool creation failed: none of {requested} entries returned a token")]
    TokenPoolEmpty { requested: u32 },

    #[error("Client setup failed: {0}")]
    ClientError(#[source] ProtocolError),

    #[error("Metrics error: {0}")]
    MetricsError(#[from] MetricsError),

    #[error("End-to-end runs require a booking client")]
    MissingBookingClient,
}

// Convert from config errors
impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}
