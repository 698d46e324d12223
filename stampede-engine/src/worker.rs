//! Pool slot execution: one dispatched event, one workload instance

use crate::metrics;
use crate::phase::Phase;
use crate::pool::{Admission, PhasePool};
use crate::protocol::Protocol;
use crate::random::SeededRandom;
use crate::scheduler::DispatchEvent;
use crate::session::{ClientSession, SessionMachine, SessionOutcome, SessionSettings};
use crate::validation::{self, TokenPool};
use stampede_config::WorkloadMode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

/// Generates client identities unique within a run
#[derive(Debug, Clone)]
pub struct ClientIds {
    run_tag: String,
    run_start_ms: u64,
    numeric: bool,
}

impl ClientIds {
    /// The booking service expects numeric user ids, so end-to-end runs
    /// derive them from the run start; other modes use `USER-<tag>-<seq>`.
    pub fn new(mode: WorkloadMode, run_start_ms: u64) -> Self {
        let run_tag = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            run_tag,
            run_start_ms,
            numeric: mode == WorkloadMode::EndToEnd,
        }
    }

    pub fn run_tag(&self) -> &str {
        &self.run_tag
    }

    pub fn client_id(&self, sequence: u64) -> String {
        if self.numeric {
            (self.run_start_ms * 1_000_000 + sequence).to_string()
        } else {
            format!("USER-{}-{}", self.run_tag, sequence)
        }
    }
}

/// What a slot runs for each event
#[derive(Debug, Clone)]
pub enum Workload {
    Session(SessionSettings),
    Validation { concert_id: String, pool: TokenPool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    Session(SessionOutcome),
    Validation { success: bool },
}

/// How one dispatched event ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemResult {
    Completed(IterationOutcome),
    /// No slot became free within the admission window
    Dropped,
    /// Still running at the phase's graceful-stop deadline
    Interrupted,
}

/// Records an interruption unless disarmed; aborted tasks drop it mid-flight
struct InFlight<'a> {
    protocol: &'a Protocol,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.protocol.recorder().count(metrics::INTERRUPTED_ITERATIONS);
        }
    }
}

/// Everything a phase needs to run its events
pub struct PhaseWorker {
    phase: Phase,
    pool: PhasePool,
    protocol: Protocol,
    workload: Arc<Workload>,
    ids: Arc<ClientIds>,
    run_seed: u64,
    admission_window: Duration,
}

impl PhaseWorker {
    /// Builds the pool with its pre-allocated slots, which count toward `vus_allocated`
    pub fn new(
        phase: Phase,
        protocol: Protocol,
        workload: Arc<Workload>,
        ids: Arc<ClientIds>,
        run_seed: u64,
        admission_window: Duration,
    ) -> Self {
        let pool = PhasePool::new(phase.pre_allocated, phase.max_workers);
        if phase.pre_allocated > 0 {
            protocol
                .recorder()
                .add(metrics::VUS_ALLOCATED, f64::from(phase.pre_allocated));
        }
        Self {
            phase,
            pool,
            protocol,
            workload,
            ids,
            run_seed,
            admission_window,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn pool(&self) -> &PhasePool {
        &self.pool
    }

    /// Acquire a slot, then run the workload under the phase deadline
    pub async fn run_item(&self, event: DispatchEvent, run_start: Instant) -> ItemResult {
        let recorder = self.protocol.recorder();
        let mut guard = InFlight {
            protocol: &self.protocol,
            armed: true,
        };
        let Some(slot) = self.pool.acquire(self.admission_window).await else {
            guard.armed = false;
            debug!(phase = %self.phase.name, sequence = event.sequence, "no free slot, iteration dropped");
            recorder.count(metrics::DROPPED_ITERATIONS);
            return ItemResult::Dropped;
        };
        if slot.admission == Admission::Grown {
            recorder.count(metrics::VUS_ALLOCATED);
        }

        let started = Instant::now();
        let deadline = run_start + self.phase.deadline();
        let result = tokio::time::timeout_at(deadline, self.execute(&event)).await;
        drop(slot);

        match result {
            Ok(outcome) => {
                guard.armed = false;
                recorder.count(metrics::ITERATIONS);
                recorder.trend(metrics::ITERATION_DURATION, started.elapsed());
                trace!(phase = %self.phase.name, sequence = event.sequence, outcome = ?outcome, "iteration complete");
                ItemResult::Completed(outcome)
            }
            Err(_) => {
                debug!(phase = %self.phase.name, sequence = event.sequence, "iteration interrupted at graceful stop");
                ItemResult::Interrupted
            }
        }
    }

    /// Run one workload instance to completion
    pub async fn execute(&self, event: &DispatchEvent) -> IterationOutcome {
        let mut rng = SeededRandom::for_session(self.run_seed, event.sequence);
        match self.workload.as_ref() {
            Workload::Session(settings) => {
                let session = ClientSession::new(self.ids.client_id(event.sequence), event.sequence);
                let (outcome, _) = SessionMachine::new(&self.protocol, settings, &mut rng, session)
                    .run()
                    .await;
                IterationOutcome::Session(outcome)
            }
            Workload::Validation { concert_id, pool } => {
                let success = validation::validate_once(&self.protocol, concert_id, pool, &mut rng).await;
                IterationOutcome::Validation { success }
            }
        }
    }
}
