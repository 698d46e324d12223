//! Structured logging for Stampede
//!
//! Installs one global `tracing` subscriber from the `logging` section of
//! the run configuration. `RUST_LOG`, when set, replaces the configured
//! level and directives.

pub mod error;
pub mod init;

// Re-export main types for convenience
pub use error::LoggingError;
pub use init::{build_filter, init_logging, init_simple_tracing};
