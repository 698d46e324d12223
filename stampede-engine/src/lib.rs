//! Stampede load engine
//!
//! Turns a [`StampedeConfig`](stampede_config::StampedeConfig) into a run:
//! phases are expanded into a lazy arrival-rate [`Schedule`], each event is
//! executed on a slot of its phase's elastic [`PhasePool`], and each slot
//! drives one client through the admission [`SessionMachine`] (or the token
//! validation workload). All samples land in one
//! [`MetricsRegistry`](stampede_metrics::MetricsRegistry) per run, whose
//! snapshot is evaluated against the configured thresholds at the end.

pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod phase;
pub mod pool;
pub mod protocol;
pub mod random;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod validation;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-export main types
pub use error::{EngineError, EngineResult};
pub use metrics::Recorder;
pub use orchestrator::LoadRun;
pub use phase::Phase;
pub use pool::{Admission, PhasePool, Slot};
pub use protocol::{Protocol, Step, Timed};
pub use random::{fresh_seed, RandomSource, SeededRandom};
pub use report::{RunReport, RunTally, SummaryExport, RUN_CANCELLED_EXIT_CODE, THRESHOLDS_FAILED_EXIT_CODE};
pub use scheduler::{DispatchEvent, Schedule};
pub use session::{
    AbortReason, ClientSession, Completion, SessionMachine, SessionOutcome, SessionSettings, SessionState,
};
pub use validation::TokenPool;
pub use worker::{ClientIds, ItemResult, IterationOutcome, PhaseWorker, Workload};
