//! Run lifecycle: setup, phase dispatch, drain and verdict

use crate::error::{EngineError, EngineResult};
use crate::metrics::{declare_builtin, Recorder};
use crate::phase::Phase;
use crate::protocol::Protocol;
use crate::random::fresh_seed;
use crate::report::{RunReport, RunTally};
use crate::scheduler::Schedule;
use crate::session::SessionSettings;
use crate::validation::TokenPool;
use crate::worker::{ClientIds, ItemResult, PhaseWorker, Workload};
use chrono::Utc;
use stampede_config::{StampedeConfig, WorkloadMode};
use stampede_http::{BookingApi, HttpBookingClient, HttpConfig, HttpQueueClient, ProtocolError, QueueApi};
use stampede_metrics::{MetricsRegistry, Tags, ThresholdSet};
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One load run against the configured services
pub struct LoadRun {
    config: StampedeConfig,
    queue: Arc<dyn QueueApi>,
    booking: Option<Arc<dyn BookingApi>>,
    registry: Arc<MetricsRegistry>,
}

impl LoadRun {
    pub fn new(config: StampedeConfig, queue: Arc<dyn QueueApi>, booking: Option<Arc<dyn BookingApi>>) -> Self {
        Self {
            config,
            queue,
            booking,
            registry: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Build HTTP clients for the configured target
    pub fn from_config(config: StampedeConfig) -> EngineResult<Self> {
        let http: HttpConfig = config.http.clone().into();
        let queue = HttpQueueClient::new(&config.target.queue_url, &http).map_err(EngineError::ClientError)?;
        let booking: Option<Arc<dyn BookingApi>> = if config.scenario.mode.books() {
            let client = HttpBookingClient::new(&config.target.core_url, &http).map_err(EngineError::ClientError)?;
            Some(Arc::new(client))
        } else {
            None
        };
        Ok(Self::new(config, Arc::new(queue), booking))
    }

    pub fn config(&self) -> &StampedeConfig {
        &self.config
    }

    pub async fn execute(self) -> EngineResult<RunReport> {
        self.execute_until(std::future::pending::<()>()).await
    }

    /// Run to completion, or until `shutdown` resolves
    ///
    /// On shutdown no further events are dispatched and in-flight sessions
    /// are cancelled and counted as interrupted.
    pub async fn execute_until<F>(self, shutdown: F) -> EngineResult<RunReport>
    where
        F: Future<Output = ()>,
    {
        self.config.validate_all()?;
        let thresholds = ThresholdSet::from_map(&self.config.thresholds)?;
        let phases: Vec<Phase> = self.config.phases.iter().map(Phase::from).collect();
        let mode = self.config.scenario.mode;

        let token_pool = self.setup().await?;
        declare_builtin(&self.registry)?;

        let run_id = Uuid::new_v4();
        let seed = self.config.scenario.seed.unwrap_or_else(fresh_seed);
        let started_at = Utc::now();
        let ids = Arc::new(ClientIds::new(mode, started_at.timestamp_millis().max(0) as u64));
        let workload = Arc::new(match token_pool {
            Some(pool) => Workload::Validation {
                concert_id: self.config.target.concert_id.clone(),
                pool,
            },
            None => Workload::Session(SessionSettings::from(&self.config)),
        });

        let workers: Vec<Arc<PhaseWorker>> = phases
            .iter()
            .map(|phase| {
                let recorder = Recorder::new(
                    Arc::clone(&self.registry),
                    Tags::new().with("scenario", phase.name.clone()),
                );
                let protocol = Protocol::new(Arc::clone(&self.queue), self.booking.clone(), recorder);
                Arc::new(PhaseWorker::new(
                    phase.clone(),
                    protocol,
                    Arc::clone(&workload),
                    Arc::clone(&ids),
                    seed,
                    self.config.scenario.admission_window,
                ))
            })
            .collect();

        let schedule = Schedule::new(&phases);
        info!(
            run_id = %run_id,
            mode = mode.as_str(),
            seed,
            run_tag = ids.run_tag(),
            phases = phases.len(),
            expected_iterations = schedule.expected_len(),
            horizon = ?schedule.horizon(),
            "starting run"
        );

        let run_start = Instant::now();
        let mut tally = RunTally::default();
        let mut tasks = JoinSet::new();
        let mut cancelled = false;
        tokio::pin!(shutdown);

        for event in schedule {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("shutdown requested, stopping dispatch");
                    cancelled = true;
                    break;
                }
                _ = sleep_until(run_start + event.offset) => {}
            }

            while let Some(joined) = tasks.try_join_next() {
                absorb(&mut tally, joined);
            }

            tally.dispatched += 1;
            let worker = Arc::clone(&workers[event.phase_index]);
            tasks.spawn(async move { worker.run_item(event, run_start).await });
        }

        // Observation windows extend the run even when nothing is dispatched
        if !cancelled {
            let horizon = phases.iter().map(Phase::end).max().unwrap_or_default();
            tokio::select! {
                biased;
                _ = &mut shutdown => cancelled = true,
                _ = sleep_until(run_start + horizon) => {}
            }
        }
        if cancelled {
            tasks.abort_all();
        }

        debug!(in_flight = tasks.len(), "dispatch finished, draining");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown, if !cancelled => {
                    warn!(in_flight = tasks.len(), "shutdown requested, cancelling in-flight sessions");
                    cancelled = true;
                    tasks.abort_all();
                }
                joined = tasks.join_next() => match joined {
                    Some(joined) => absorb(&mut tally, joined),
                    None => break,
                },
            }
        }

        for worker in &workers {
            worker.pool().close();
        }

        let snapshot = self.registry.snapshot();
        let outcomes = thresholds.evaluate(&snapshot);
        for outcome in outcomes.iter().filter(|outcome| !outcome.passed) {
            warn!(
                metric = %outcome.metric,
                expression = %outcome.expression,
                observed = ?outcome.observed,
                reason = outcome.failure.as_deref().unwrap_or(""),
                "threshold failed"
            );
        }

        let report = RunReport {
            run_id,
            mode,
            seed,
            started_at,
            elapsed: run_start.elapsed(),
            tally,
            cancelled,
            snapshot,
            thresholds: outcomes,
        };
        info!(
            run_id = %run_id,
            dispatched = tally.dispatched,
            completed = tally.completed,
            aborted = tally.aborted,
            dropped = tally.dropped,
            interrupted = tally.interrupted,
            passed = report.thresholds_passed(),
            "run finished"
        );
        Ok(report)
    }

    /// Health checks, fixture creation and the validation token pool
    ///
    /// Setup calls are not instrumented; any failure is fatal.
    async fn setup(&self) -> EngineResult<Option<TokenPool>> {
        let scenario = &self.config.scenario;

        self.queue.health().await.map_err(|source| {
            error!(service = "queue", error = %source, "health check failed");
            EngineError::HealthCheckFailed { service: "queue", source }
        })?;
        info!(url = %self.config.target.queue_url, "queue service healthy");

        if scenario.mode.books() {
            let booking = self.booking.as_ref().ok_or(EngineError::MissingBookingClient)?;
            booking.health().await.map_err(|source| {
                error!(service = "booking", error = %source, "health check failed");
                EngineError::HealthCheckFailed { service: "booking", source }
            })?;
            info!(url = %self.config.target.core_url, "booking service healthy");

            if scenario.booking.init_fixture {
                let report = booking.init_fixture().await.map_err(EngineError::FixtureFailed)?;
                if !report.success {
                    return Err(EngineError::FixtureFailed(ProtocolError::Rejected {
                        status: 200,
                        result: report.message.unwrap_or_else(|| "fixture not created".to_string()),
                    }));
                }
                info!(duration_ms = ?report.duration_ms, "test fixture created");
            }
        }

        if scenario.mode == WorkloadMode::Validation {
            let pool = TokenPool::create(
                self.queue.as_ref(),
                &self.config.target.concert_id,
                scenario.validation.token_pool_size,
            )
            .await?;
            return Ok(Some(pool));
        }

        Ok(None)
    }
}

fn absorb(tally: &mut RunTally, joined: Result<ItemResult, JoinError>) {
    match joined {
        Ok(result) => tally.absorb(result),
        Err(e) if e.is_cancelled() => tally.absorb(ItemResult::Interrupted),
        Err(e) => error!(error = %e, "session task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBooking, FakeQueue};
    use stampede_config::{PhaseConfig, RemovalMode, UsageConfig};
    use stampede_http::FixtureReport;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn three_phase_config(mode: WorkloadMode) -> StampedeConfig {
        let mut config = StampedeConfig::default();
        config.scenario.mode = mode;
        config.scenario.seed = Some(11);
        config.phases = vec![
            PhaseConfig::new("warmup", 10, secs(2), 10, 50),
            PhaseConfig::new("peak", 50, secs(4), 50, 200).starting_at(secs(2)),
            PhaseConfig::new("cooldown", 0, secs(2), 0, 10).starting_at(secs(6)),
        ];
        config
    }

    fn selector(text: &str) -> stampede_metrics::MetricSelector {
        text.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_phase_run_starts_exactly_220_sessions() {
        let queue = Arc::new(FakeQueue::default());
        let run = LoadRun::new(three_phase_config(WorkloadMode::EntryOnly), queue.clone(), None);
        assert_eq!(run.config().phases.len(), 3);
        let started = Instant::now();

        let report = run.execute().await.unwrap();

        assert_eq!(report.tally.dispatched, 220);
        assert_eq!(report.tally.completed, 220);
        assert_eq!(report.tally.dropped, 0);
        assert_eq!(FakeQueue::calls(&queue.enters), 220);
        assert_eq!(report.snapshot.counter(&selector("iterations")), 220.0);
        assert_eq!(report.snapshot.counter(&selector("iterations{scenario:warmup}")), 20.0);
        assert_eq!(report.snapshot.counter(&selector("iterations{scenario:peak}")), 200.0);
        assert_eq!(report.snapshot.counter(&selector("iterations{scenario:cooldown}")), 0.0);
        // The rate-0 cooldown window still extends the run to 8s
        assert!(Instant::now().duration_since(started) >= secs(8));
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_threshold_sets_exit_code() {
        let queue = Arc::new(FakeQueue {
            enter_result: Err(ProtocolError::UnexpectedStatus { status: 500 }),
            ..FakeQueue::default()
        });
        let mut config = three_phase_config(WorkloadMode::Circulation);
        config.phases.truncate(1);
        config
            .thresholds
            .insert("queue_entry_success_rate".to_string(), vec!["rate>0.99".to_string()]);
        config
            .thresholds
            .insert("http_req_duration{step:enter}".to_string(), vec!["p(95)<2000".to_string()]);

        let report = LoadRun::new(config, queue.clone(), None).execute().await.unwrap();

        assert_eq!(report.tally.aborted, 20);
        assert_eq!(FakeQueue::calls(&queue.polls), 0);
        assert_eq!(report.snapshot.counter(&selector("queue_entry_failures")), 20.0);
        assert_eq!(report.failed_thresholds().count(), 1);
        assert_eq!(report.exit_code(), 99);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_phase_drops_iterations() {
        let queue = Arc::new(FakeQueue::default());
        let mut config = three_phase_config(WorkloadMode::Circulation);
        config.scenario.usage = Some(UsageConfig {
            min: secs(5),
            max: secs(5),
        });
        config.phases = vec![PhaseConfig::new("burst", 10, secs(1), 1, 2)];

        let report = LoadRun::new(config, queue, None).execute().await.unwrap();

        assert_eq!(report.tally.dispatched, 10);
        assert_eq!(report.tally.completed, 2);
        assert_eq!(report.tally.dropped, 8);
        assert_eq!(report.snapshot.counter(&selector("dropped_iterations{scenario:burst}")), 8.0);
        assert_eq!(report.snapshot.counter(&selector("vus_allocated{scenario:burst}")), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_stop_interrupts_long_sessions() {
        let queue = Arc::new(FakeQueue::default());
        let mut config = three_phase_config(WorkloadMode::Circulation);
        config.scenario.usage = Some(UsageConfig {
            min: secs(120),
            max: secs(120),
        });
        config.phases = vec![PhaseConfig::new("short", 2, secs(1), 2, 2).with_graceful_stop(secs(3))];
        let started = Instant::now();

        let report = LoadRun::new(config, queue.clone(), None).execute().await.unwrap();

        assert_eq!(report.tally.interrupted, 2);
        assert_eq!(report.snapshot.counter(&selector("interrupted_iterations")), 2.0);
        assert_eq!(FakeQueue::calls(&queue.removes), 0);
        let elapsed = Instant::now().duration_since(started);
        assert!(elapsed >= secs(4) && elapsed < secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_in_flight_sessions() {
        let queue = Arc::new(FakeQueue::default());
        let mut config = three_phase_config(WorkloadMode::Circulation);
        config.scenario.usage = Some(UsageConfig {
            min: secs(60),
            max: secs(60),
        });
        config.phases = vec![PhaseConfig::new("long", 1, secs(30), 5, 50)];

        let report = LoadRun::new(config, queue, None)
            .execute_until(tokio::time::sleep(Duration::from_millis(2500)))
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.exit_code(), crate::RUN_CANCELLED_EXIT_CODE);
        assert_eq!(report.tally.dispatched, 3);
        assert_eq!(report.tally.interrupted, 3);
        assert_eq!(report.snapshot.counter(&selector("interrupted_iterations")), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_queue_aborts_before_dispatch() {
        let queue = Arc::new(FakeQueue {
            health_result: Err(ProtocolError::UnexpectedStatus { status: 503 }),
            ..FakeQueue::default()
        });

        let err = LoadRun::new(three_phase_config(WorkloadMode::EntryOnly), queue.clone(), None)
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::HealthCheckFailed { service: "queue", .. }));
        assert_eq!(FakeQueue::calls(&queue.enters), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_threshold_is_rejected_up_front() {
        let queue = Arc::new(FakeQueue::default());
        let mut config = three_phase_config(WorkloadMode::EntryOnly);
        config
            .thresholds
            .insert("http_req_duration".to_string(), vec!["p(95)~200".to_string()]);

        let err = LoadRun::new(config, queue.clone(), None).execute().await.unwrap_err();

        assert!(matches!(err, EngineError::ThresholdError(_)));
        assert_eq!(FakeQueue::calls(&queue.enters), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_requires_booking_client() {
        let queue = Arc::new(FakeQueue::default());
        let err = LoadRun::new(three_phase_config(WorkloadMode::EndToEnd), queue, None)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingBookingClient));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_creates_fixture_then_books() {
        let queue = Arc::new(FakeQueue::default());
        let booking = Arc::new(FakeBooking::default());
        let mut config = three_phase_config(WorkloadMode::EndToEnd);
        config.scenario.removal = RemovalMode::OutOfBand;
        config.scenario.usage = None;
        config.phases = vec![PhaseConfig::new("e2e", 2, secs(1), 2, 4)];

        let report = LoadRun::new(config, queue.clone(), Some(booking.clone()))
            .execute()
            .await
            .unwrap();

        assert_eq!(booking.fixtures.load(Ordering::SeqCst), 1);
        assert_eq!(report.tally.completed, 2);
        assert_eq!(booking.payments.lock().unwrap().len(), 2);
        assert_eq!(FakeQueue::calls(&queue.removes), 0);
        let booked = report.snapshot.rate(&selector("booking_success_rate")).unwrap();
        assert_eq!(booked.rate(), Some(1.0));
        let payer: u64 = booking.payments.lock().unwrap()[0].user_id.parse().unwrap();
        assert!(payer > 1_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fixture_is_fatal() {
        let queue = Arc::new(FakeQueue::default());
        let booking = Arc::new(FakeBooking {
            fixture_result: Ok(FixtureReport {
                success: false,
                message: Some("schedule missing".to_string()),
                duration_ms: None,
            }),
            ..FakeBooking::default()
        });

        let err = LoadRun::new(three_phase_config(WorkloadMode::EndToEnd), queue.clone(), Some(booking))
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::FixtureFailed(_)));
        assert_eq!(FakeQueue::calls(&queue.enters), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_benchmark_uses_token_pool() {
        let queue = Arc::new(FakeQueue::default());
        let mut config = three_phase_config(WorkloadMode::Validation);
        config.scenario.validation.token_pool_size = 20;
        config.phases = vec![PhaseConfig::new("validate", 5, secs(2), 5, 10)];

        let report = LoadRun::new(config, queue.clone(), None).execute().await.unwrap();

        assert_eq!(FakeQueue::calls(&queue.enters), 20);
        assert_eq!(FakeQueue::calls(&queue.validations), 10);
        assert_eq!(report.tally.completed, 10);
        // Setup entries are not instrumented
        assert_eq!(report.snapshot.counter(&selector("http_reqs{step:enter}")), 0.0);
        assert_eq!(report.snapshot.counter(&selector("http_reqs{step:validate}")), 10.0);
    }
}
