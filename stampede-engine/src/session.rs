//! Per-client admission state machine
//!
//! `Entering -> WaitingActivation -> Active -> [QueryingSeats -> Reserving -> Paying]
//! -> Using -> Removing -> Done | Aborted`, with one handler per state.

use crate::metrics;
use crate::protocol::{Protocol, Step};
use crate::random::RandomSource;
use stampede_config::{RemovalMode, StampedeConfig, WorkloadMode};
use stampede_http::{PaymentRequest, ProtocolError, QueueCredentials};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Session behaviour derived from the run configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub concert_id: String,
    pub schedule_id: i64,
    pub mode: WorkloadMode,
    pub max_polls: u32,
    pub poll_interval: Duration,
    pub activated_states: Vec<String>,
    /// Inclusive usage range; `None` skips the usage step
    pub usage: Option<(Duration, Duration)>,
    pub removal: RemovalMode,
    pub payment_amount: i64,
    pub payment_method: String,
    pub think_time: Duration,
}

impl From<&StampedeConfig> for SessionSettings {
    fn from(config: &StampedeConfig) -> Self {
        let scenario = &config.scenario;
        Self {
            concert_id: config.target.concert_id.clone(),
            schedule_id: config.target.schedule_id,
            mode: scenario.mode,
            max_polls: scenario.polling.max_polls,
            poll_interval: scenario.polling.interval,
            activated_states: scenario.polling.activated_states.clone(),
            usage: scenario.usage.as_ref().map(|usage| (usage.min, usage.max)),
            removal: scenario.removal,
            payment_amount: scenario.booking.payment_amount,
            payment_method: scenario.booking.payment_method.clone(),
            think_time: scenario.think_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Entering,
    WaitingActivation { polls: u32 },
    Active,
    QueryingSeats,
    Reserving { seat_id: i64 },
    Paying { reservation_id: i64 },
    Using,
    Removing,
    Done(Completion),
    Aborted(AbortReason),
}

/// Successful terminal paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Entry-only workload entered the queue
    EntryOnly,
    Removed,
    /// The removal call failed; the session still finished
    RemovalFailed,
    /// Left to the service to expire
    RemovedOutOfBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    EntryFailed,
    ActivationTimeout,
    SeatsQueryFailed,
    NoSeatsAvailable,
    ReservationFailed,
    PaymentFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Done(Completion),
    Aborted(AbortReason),
}

impl SessionOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, SessionOutcome::Done(_))
    }
}

/// State owned by the slot executing one client
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub client_id: String,
    pub sequence: u64,
    pub state: SessionState,
    pub started_at: Instant,
    pub entered_at: Option<Instant>,
    pub activated_at: Option<Instant>,
    pub token: Option<String>,
    pub seat_id: Option<i64>,
    pub reservation_id: Option<i64>,
}

impl ClientSession {
    pub fn new(client_id: String, sequence: u64) -> Self {
        Self {
            client_id,
            sequence,
            state: SessionState::Entering,
            started_at: Instant::now(),
            entered_at: None,
            activated_at: None,
            token: None,
            seat_id: None,
            reservation_id: None,
        }
    }
}

/// Drives one [`ClientSession`] to a terminal state
pub struct SessionMachine<'a> {
    protocol: &'a Protocol,
    settings: &'a SessionSettings,
    rng: &'a mut dyn RandomSource,
    session: ClientSession,
}

impl<'a> SessionMachine<'a> {
    pub fn new(
        protocol: &'a Protocol,
        settings: &'a SessionSettings,
        rng: &'a mut dyn RandomSource,
        session: ClientSession,
    ) -> Self {
        Self {
            protocol,
            settings,
            rng,
            session,
        }
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Run until `Done` or `Aborted`, then pause for the think time
    pub async fn run(mut self) -> (SessionOutcome, ClientSession) {
        let outcome = loop {
            let next = match self.session.state.clone() {
                SessionState::Entering => self.on_entering().await,
                SessionState::WaitingActivation { polls } => self.on_waiting(polls).await,
                SessionState::Active => self.on_active(),
                SessionState::QueryingSeats => self.on_querying_seats().await,
                SessionState::Reserving { seat_id } => self.on_reserving(seat_id).await,
                SessionState::Paying { reservation_id } => self.on_paying(reservation_id).await,
                SessionState::Using => self.on_using().await,
                SessionState::Removing => self.on_removing().await,
                SessionState::Done(completion) => break SessionOutcome::Done(completion),
                SessionState::Aborted(reason) => break SessionOutcome::Aborted(reason),
            };
            self.session.state = next;
        };

        debug!(client_id = %self.session.client_id, outcome = ?outcome, "session finished");
        if !self.settings.think_time.is_zero() {
            tokio::time::sleep(self.settings.think_time).await;
        }
        (outcome, self.session)
    }

    fn books(&self) -> bool {
        self.settings.mode.books()
    }

    fn log_failure(&self, step: Step, error: &ProtocolError) {
        warn!(
            client_id = %self.session.client_id,
            step = step.as_str(),
            status = ?error.status(),
            error = %error,
            "protocol step failed"
        );
    }

    fn abort(&self, reason: AbortReason) -> SessionState {
        if self.books() {
            self.protocol.recorder().rate(metrics::BOOKING_SUCCESS_RATE, false);
        }
        SessionState::Aborted(reason)
    }

    /// What follows activation or payment once booking is settled
    fn after_active_work(&self) -> SessionState {
        if self.settings.usage.is_some() {
            SessionState::Using
        } else {
            self.removal_path()
        }
    }

    fn removal_path(&self) -> SessionState {
        match self.settings.removal {
            RemovalMode::Explicit => SessionState::Removing,
            RemovalMode::OutOfBand => SessionState::Done(Completion::RemovedOutOfBand),
        }
    }

    async fn on_entering(&mut self) -> SessionState {
        let recorder = self.protocol.recorder();
        let timed = self
            .protocol
            .enter(&self.settings.concert_id, &self.session.client_id)
            .await;

        match timed.result {
            Ok(data) => {
                recorder.rate(metrics::QUEUE_ENTRY_SUCCESS_RATE, true);
                recorder.trend(metrics::QUEUE_ENTRY_DURATION, timed.elapsed);
                self.session.entered_at = Some(timed.finished_at);
                if data.token.is_some() {
                    self.session.token = data.token;
                }
                debug!(client_id = %self.session.client_id, position = data.position, "entered queue");

                if self.settings.mode == WorkloadMode::EntryOnly {
                    SessionState::Done(Completion::EntryOnly)
                } else {
                    SessionState::WaitingActivation { polls: 0 }
                }
            }
            Err(e) => {
                self.log_failure(Step::Enter, &e);
                recorder.rate(metrics::QUEUE_ENTRY_SUCCESS_RATE, false);
                recorder.count(metrics::QUEUE_ENTRY_FAILURES);
                self.abort(AbortReason::EntryFailed)
            }
        }
    }

    async fn on_waiting(&mut self, polls: u32) -> SessionState {
        if polls >= self.settings.max_polls {
            warn!(
                client_id = %self.session.client_id,
                polls,
                "activation timed out"
            );
            self.protocol.recorder().count(metrics::ACTIVATION_TIMEOUTS);
            return self.abort(AbortReason::ActivationTimeout);
        }

        tokio::time::sleep(self.settings.poll_interval).await;
        let timed = self
            .protocol
            .poll(&self.settings.concert_id, &self.session.client_id)
            .await;

        match timed.result {
            Ok(status) => {
                let admitted = self.settings.activated_states.iter().any(|s| *s == status.status);
                // Booking needs the token: an admitted status without one counts as a
                // waiting poll, and only exhausting max_polls aborts the session
                let usable = !self.books() || status.token.is_some();
                if admitted && usable {
                    if status.token.is_some() {
                        self.session.token = status.token;
                    }
                    self.session.activated_at = Some(timed.finished_at);
                    let entered_at = self.session.entered_at.unwrap_or(self.session.started_at);
                    self.protocol.recorder().trend(
                        metrics::ACTIVATION_WAIT_TIME,
                        timed.finished_at.duration_since(entered_at),
                    );
                    debug!(client_id = %self.session.client_id, polls = polls + 1, "activated");
                    SessionState::Active
                } else {
                    SessionState::WaitingActivation { polls: polls + 1 }
                }
            }
            Err(e) => {
                self.log_failure(Step::Poll, &e);
                SessionState::WaitingActivation { polls: polls + 1 }
            }
        }
    }

    fn on_active(&self) -> SessionState {
        if self.books() {
            SessionState::QueryingSeats
        } else {
            self.after_active_work()
        }
    }

    fn credentials(&self) -> QueueCredentials {
        QueueCredentials {
            user_id: self.session.client_id.clone(),
            token: self.session.token.clone().unwrap_or_default(),
        }
    }

    async fn on_querying_seats(&mut self) -> SessionState {
        let timed = self
            .protocol
            .seats(&self.credentials(), self.settings.schedule_id)
            .await;

        let seats = match timed.result {
            Ok(seats) => seats,
            Err(e) => {
                self.log_failure(Step::Seats, &e);
                self.protocol.recorder().count(metrics::SEATS_QUERY_FAILURES);
                return self.abort(AbortReason::SeatsQueryFailed);
            }
        };

        let available: Vec<i64> = seats
            .iter()
            .filter(|seat| seat.is_available())
            .map(|seat| seat.seat_id)
            .collect();
        if available.is_empty() {
            warn!(client_id = %self.session.client_id, seats = seats.len(), "no available seats");
            self.protocol.recorder().count(metrics::SEATS_UNAVAILABLE);
            return self.abort(AbortReason::NoSeatsAvailable);
        }

        let seat_id = available[self.rng.index(available.len())];
        self.session.seat_id = Some(seat_id);
        SessionState::Reserving { seat_id }
    }

    async fn on_reserving(&mut self, seat_id: i64) -> SessionState {
        let timed = self
            .protocol
            .reserve(&self.credentials(), self.settings.schedule_id, seat_id)
            .await;

        match timed.result {
            Ok(reservation) => {
                self.session.reservation_id = Some(reservation.reservation_id);
                SessionState::Paying {
                    reservation_id: reservation.reservation_id,
                }
            }
            Err(e) => {
                self.log_failure(Step::Reserve, &e);
                self.protocol.recorder().count(metrics::RESERVATION_FAILURES);
                self.abort(AbortReason::ReservationFailed)
            }
        }
    }

    async fn on_paying(&mut self, reservation_id: i64) -> SessionState {
        let payment = PaymentRequest {
            reservation_id,
            user_id: self.session.client_id.clone(),
            amount: self.settings.payment_amount,
            payment_method: self.settings.payment_method.clone(),
            concert_id: self.settings.concert_id.clone(),
        };
        let timed = self.protocol.pay(&self.credentials(), &payment).await;

        match timed.result {
            Ok(_) => {
                let recorder = self.protocol.recorder();
                recorder.rate(metrics::BOOKING_SUCCESS_RATE, true);
                let activated_at = self.session.activated_at.unwrap_or(self.session.started_at);
                recorder.trend(
                    metrics::BOOKING_DURATION,
                    timed.finished_at.duration_since(activated_at),
                );
                recorder.trend(
                    metrics::E2E_TOTAL_DURATION,
                    timed.finished_at.duration_since(self.session.started_at),
                );
                self.after_active_work()
            }
            Err(e) => {
                self.log_failure(Step::Payment, &e);
                self.protocol.recorder().count(metrics::PAYMENT_FAILURES);
                self.abort(AbortReason::PaymentFailed)
            }
        }
    }

    async fn on_using(&mut self) -> SessionState {
        let Some((min, max)) = self.settings.usage else {
            return self.removal_path();
        };
        let usage = self.rng.seconds_between(min, max);
        tokio::time::sleep(usage).await;
        self.protocol.recorder().trend(metrics::ACTIVE_USAGE_TIME, usage);
        self.removal_path()
    }

    async fn on_removing(&mut self) -> SessionState {
        let timed = self
            .protocol
            .remove(&self.settings.concert_id, &self.session.client_id)
            .await;
        let recorder = self.protocol.recorder();

        match timed.result {
            Ok(()) => {
                recorder.rate(metrics::QUEUE_REMOVAL_SUCCESS, true);
                SessionState::Done(Completion::Removed)
            }
            Err(e) => {
                self.log_failure(Step::Remove, &e);
                recorder.rate(metrics::QUEUE_REMOVAL_SUCCESS, false);
                recorder.count(metrics::QUEUE_REMOVAL_FAILURES);
                SessionState::Done(Completion::RemovalFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{declare_builtin, Recorder};
    use crate::random::SeededRandom;
    use crate::testing::{self, FakeBooking, FakeQueue};
    use stampede_http::{BookingApi, QueueApi};
    use stampede_metrics::{MetricSelector, MetricsRegistry, MetricsSnapshot, Tags};
    use std::sync::Arc;

    fn settings(mode: WorkloadMode) -> SessionSettings {
        SessionSettings {
            concert_id: "1".to_string(),
            schedule_id: 1,
            mode,
            max_polls: 300,
            poll_interval: Duration::from_secs(1),
            activated_states: vec!["READY".to_string(), "ACTIVE".to_string()],
            usage: Some((Duration::from_secs(7), Duration::from_secs(7))),
            removal: RemovalMode::Explicit,
            payment_amount: 50_000,
            payment_method: "CREDIT_CARD".to_string(),
            think_time: Duration::ZERO,
        }
    }

    fn selector(text: &str) -> MetricSelector {
        text.parse().unwrap()
    }

    async fn run_session(
        queue: Arc<FakeQueue>,
        booking: Option<Arc<FakeBooking>>,
        settings: &SessionSettings,
    ) -> (SessionOutcome, ClientSession, MetricsSnapshot) {
        let registry = Arc::new(MetricsRegistry::new());
        declare_builtin(&registry).unwrap();
        let recorder = Recorder::new(Arc::clone(&registry), Tags::new().with("scenario", "test"));
        let booking = booking.map(|b| b as Arc<dyn BookingApi>);
        let protocol = Protocol::new(queue as Arc<dyn QueueApi>, booking, recorder);
        let mut rng = SeededRandom::new(7);
        let session = ClientSession::new("USER-test-1".to_string(), 1);

        let (outcome, session) = SessionMachine::new(&protocol, settings, &mut rng, session)
            .run()
            .await;
        (outcome, session, registry.snapshot())
    }

    #[tokio::test(start_paused = true)]
    async fn test_circulation_waits_uses_and_removes() {
        let queue = Arc::new(FakeQueue::with_statuses(vec![
            testing::status("WAITING", None),
            testing::status("WAITING", None),
            testing::status("WAITING", None),
            testing::status("ACTIVE", Some("T1")),
        ]));
        let started = Instant::now();

        let (outcome, session, snapshot) =
            run_session(Arc::clone(&queue), None, &settings(WorkloadMode::Circulation)).await;

        assert_eq!(outcome, SessionOutcome::Done(Completion::Removed));
        assert_eq!(FakeQueue::calls(&queue.polls), 4);
        assert_eq!(FakeQueue::calls(&queue.removes), 1);
        assert_eq!(session.token.as_deref(), Some("T1"));
        let elapsed = Instant::now().duration_since(started);
        assert!(elapsed >= Duration::from_secs(11) && elapsed < Duration::from_millis(11_100));

        let wait = snapshot.distribution(&selector("activation_wait_time")).unwrap();
        let waited = wait.min.unwrap();
        assert!((4000.0..4100.0).contains(&waited), "waited {waited}ms");
        let usage = snapshot.distribution(&selector("active_usage_time")).unwrap();
        assert_eq!(usage.min, Some(7000.0));
        let removal = snapshot.rate(&selector("queue_removal_success")).unwrap();
        assert_eq!((removal.trues, removal.total), (1, 1));
        assert_eq!(snapshot.counter(&selector("http_reqs{step:poll}")), 4.0);
        assert_eq!(snapshot.counter(&selector("http_reqs")), 6.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_failure_aborts_without_polling() {
        let queue = Arc::new(FakeQueue {
            enter_result: Err(ProtocolError::UnexpectedStatus { status: 500 }),
            ..FakeQueue::default()
        });

        let (outcome, _, snapshot) =
            run_session(Arc::clone(&queue), None, &settings(WorkloadMode::Circulation)).await;

        assert_eq!(outcome, SessionOutcome::Aborted(AbortReason::EntryFailed));
        assert_eq!(FakeQueue::calls(&queue.polls), 0);
        assert_eq!(snapshot.counter(&selector("queue_entry_failures")), 1.0);
        let entry = snapshot.rate(&selector("queue_entry_success_rate")).unwrap();
        assert_eq!(entry.rate(), Some(0.0));
        let failed = snapshot.rate(&selector("http_req_failed{step:enter}")).unwrap();
        assert_eq!(failed.trues, 1);
        assert!(snapshot.distribution(&selector("queue_entry_duration")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_entry_counts_as_failed_request() {
        let queue = Arc::new(FakeQueue {
            enter_result: Err(ProtocolError::Rejected {
                status: 201,
                result: "error".to_string(),
            }),
            ..FakeQueue::default()
        });

        let (outcome, _, snapshot) =
            run_session(Arc::clone(&queue), None, &settings(WorkloadMode::Circulation)).await;

        assert_eq!(outcome, SessionOutcome::Aborted(AbortReason::EntryFailed));
        assert_eq!(FakeQueue::calls(&queue.polls), 0);
        assert_eq!(snapshot.counter(&selector("queue_entry_failures")), 1.0);
        let failed = snapshot.rate(&selector("http_req_failed{step:enter}")).unwrap();
        assert_eq!((failed.trues, failed.total), (1, 1));
        assert_eq!(snapshot.counter(&selector("transport_errors")), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_timeout_after_max_polls() {
        let queue = Arc::new(FakeQueue {
            status_default: testing::status("WAITING", None),
            ..FakeQueue::default()
        });
        let mut settings = settings(WorkloadMode::Circulation);
        settings.max_polls = 3;

        let (outcome, _, snapshot) = run_session(Arc::clone(&queue), None, &settings).await;

        assert_eq!(outcome, SessionOutcome::Aborted(AbortReason::ActivationTimeout));
        assert_eq!(FakeQueue::calls(&queue.polls), 3);
        assert_eq!(FakeQueue::calls(&queue.removes), 0);
        assert_eq!(snapshot.counter(&selector("activation_timeouts")), 1.0);
        assert!(snapshot.distribution(&selector("activation_wait_time")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_consume_polls() {
        let queue = Arc::new(FakeQueue::with_statuses(vec![
            Err(ProtocolError::Transport("connection reset".to_string())),
            testing::status("READY", Some("T9")),
        ]));

        let (outcome, _, snapshot) =
            run_session(Arc::clone(&queue), None, &settings(WorkloadMode::Circulation)).await;

        assert_eq!(outcome, SessionOutcome::Done(Completion::Removed));
        assert_eq!(FakeQueue::calls(&queue.polls), 2);
        assert_eq!(snapshot.counter(&selector("transport_errors{step:poll}")), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_failure_still_completes() {
        let queue = Arc::new(FakeQueue {
            remove_result: Err(ProtocolError::UnexpectedStatus { status: 503 }),
            ..FakeQueue::default()
        });

        let (outcome, _, snapshot) =
            run_session(queue, None, &settings(WorkloadMode::Circulation)).await;

        assert_eq!(outcome, SessionOutcome::Done(Completion::RemovalFailed));
        assert!(outcome.is_done());
        assert_eq!(snapshot.counter(&selector("queue_removal_failures")), 1.0);
        let removal = snapshot.rate(&selector("queue_removal_success")).unwrap();
        assert_eq!(removal.falses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_band_removal_skips_remove_call() {
        let queue = Arc::new(FakeQueue::default());
        let mut settings = settings(WorkloadMode::Circulation);
        settings.removal = RemovalMode::OutOfBand;
        settings.usage = None;

        let (outcome, _, snapshot) = run_session(Arc::clone(&queue), None, &settings).await;

        assert_eq!(outcome, SessionOutcome::Done(Completion::RemovedOutOfBand));
        assert_eq!(FakeQueue::calls(&queue.removes), 0);
        assert!(snapshot.distribution(&selector("active_usage_time")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_only_stops_after_enter() {
        let queue = Arc::new(FakeQueue::default());

        let (outcome, session, snapshot) =
            run_session(Arc::clone(&queue), None, &settings(WorkloadMode::EntryOnly)).await;

        assert_eq!(outcome, SessionOutcome::Done(Completion::EntryOnly));
        assert_eq!(FakeQueue::calls(&queue.polls), 0);
        assert!(session.entered_at.is_some());
        assert!(snapshot.distribution(&selector("queue_entry_duration")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_books_available_seat() {
        let queue = Arc::new(FakeQueue::default());
        let booking = Arc::new(FakeBooking::default());
        let mut settings = settings(WorkloadMode::EndToEnd);
        settings.usage = None;

        let (outcome, session, snapshot) =
            run_session(Arc::clone(&queue), Some(Arc::clone(&booking)), &settings).await;

        assert_eq!(outcome, SessionOutcome::Done(Completion::Removed));
        assert_eq!(session.seat_id, Some(2));
        assert_eq!(session.reservation_id, Some(10));

        let payments = booking.payments.lock().unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].reservation_id, 10);
        assert_eq!(payments[0].amount, 50_000);
        assert_eq!(payments[0].user_id, "USER-test-1");

        let booked = snapshot.rate(&selector("booking_success_rate")).unwrap();
        assert_eq!(booked.rate(), Some(1.0));
        assert!(snapshot.distribution(&selector("booking_duration")).is_some());
        assert!(snapshot.distribution(&selector("e2e_total_duration")).is_some());
        assert_eq!(snapshot.counter(&selector("http_reqs{step:payment}")), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_keeps_polling_until_token_arrives() {
        let queue = Arc::new(FakeQueue::with_statuses(vec![
            testing::status("ACTIVE", None),
            testing::status("ACTIVE", None),
            testing::status("ACTIVE", Some("T7")),
        ]));
        let mut settings = settings(WorkloadMode::EndToEnd);
        settings.usage = None;

        let (outcome, session, snapshot) =
            run_session(Arc::clone(&queue), Some(Arc::new(FakeBooking::default())), &settings).await;

        assert_eq!(outcome, SessionOutcome::Done(Completion::Removed));
        assert_eq!(FakeQueue::calls(&queue.polls), 3);
        assert_eq!(session.token.as_deref(), Some("T7"));
        let wait = snapshot.distribution(&selector("activation_wait_time")).unwrap();
        assert_eq!(wait.count, 1);
        assert!(wait.min.unwrap() >= 3000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_without_token_times_out() {
        let queue = Arc::new(FakeQueue {
            status_default: testing::status("ACTIVE", None),
            ..FakeQueue::default()
        });
        let mut settings = settings(WorkloadMode::EndToEnd);
        settings.max_polls = 4;

        let (outcome, _, snapshot) =
            run_session(Arc::clone(&queue), Some(Arc::new(FakeBooking::default())), &settings).await;

        assert_eq!(outcome, SessionOutcome::Aborted(AbortReason::ActivationTimeout));
        assert_eq!(FakeQueue::calls(&queue.polls), 4);
        assert_eq!(snapshot.counter(&selector("activation_timeouts")), 1.0);
        assert!(snapshot.distribution(&selector("activation_wait_time")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_is_whole_seconds() {
        let mut settings = settings(WorkloadMode::Circulation);
        settings.usage = Some((Duration::from_secs(5), Duration::from_secs(30)));

        let (_, _, snapshot) = run_session(Arc::new(FakeQueue::default()), None, &settings).await;

        let usage = snapshot.distribution(&selector("active_usage_time")).unwrap();
        let slept = usage.min.unwrap();
        assert_eq!(slept % 1000.0, 0.0, "slept {slept}ms");
        assert!((5000.0..=30_000.0).contains(&slept));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_without_available_seats_aborts() {
        let queue = Arc::new(FakeQueue::default());
        let booking = Arc::new(FakeBooking {
            seats_result: Ok(vec![testing::seat(1, "RESERVED"), testing::seat(2, "SOLD")]),
            ..FakeBooking::default()
        });

        let (outcome, _, snapshot) =
            run_session(Arc::clone(&queue), Some(booking), &settings(WorkloadMode::EndToEnd)).await;

        assert_eq!(outcome, SessionOutcome::Aborted(AbortReason::NoSeatsAvailable));
        assert_eq!(FakeQueue::calls(&queue.removes), 0);
        assert_eq!(snapshot.counter(&selector("seats_unavailable")), 1.0);
        let booked = snapshot.rate(&selector("booking_success_rate")).unwrap();
        assert_eq!(booked.rate(), Some(0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_failure_aborts_booking() {
        let booking = Arc::new(FakeBooking {
            pay_result: Err(ProtocolError::Rejected {
                status: 200,
                result: "FAIL".to_string(),
            }),
            ..FakeBooking::default()
        });

        let (outcome, _, snapshot) = run_session(
            Arc::new(FakeQueue::default()),
            Some(booking),
            &settings(WorkloadMode::EndToEnd),
        )
        .await;

        assert_eq!(outcome, SessionOutcome::Aborted(AbortReason::PaymentFailed));
        assert_eq!(snapshot.counter(&selector("payment_failures")), 1.0);
        assert!(snapshot.distribution(&selector("booking_duration")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_think_time_delays_return() {
        let mut settings = settings(WorkloadMode::EntryOnly);
        settings.think_time = Duration::from_secs(2);
        let started = Instant::now();

        run_session(Arc::new(FakeQueue::default()), None, &settings).await;

        let elapsed = Instant::now().duration_since(started);
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2_100));
    }
}
