//! Errors raised while installing the tracing subscriber

use thiserror::Error;
use tracing_subscriber::filter::{FromEnvError, ParseError};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive '{directive}': {source}")]
    InvalidDirective {
        directive: String,
        #[source]
        source: ParseError,
    },

    #[error("Invalid RUST_LOG filter: {0}")]
    InvalidEnvFilter(#[from] FromEnvError),
}
