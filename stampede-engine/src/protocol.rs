//! Instrumented protocol steps
//!
//! Wraps the [`QueueApi`] and [`BookingApi`] clients so that every call
//! records `http_reqs`, `http_req_duration` and `http_req_failed` tagged
//! with its step, plus `transport_errors` when no response arrived.

use crate::metrics::{self, Recorder};
use stampede_http::{
    BookingApi, EnterData, PaymentData, PaymentRequest, ProtocolError, ProtocolResult,
    QueueApi, QueueCredentials, ReservationData, Seat, StatusData, TokenValidity,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Protocol step, used as the `step` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Enter,
    Poll,
    Remove,
    Validate,
    Seats,
    Reserve,
    Payment,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Enter => "enter",
            Step::Poll => "poll",
            Step::Remove => "remove",
            Step::Validate => "validate",
            Step::Seats => "seats",
            Step::Reserve => "reserve",
            Step::Payment => "payment",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one instrumented call and how long it took
#[derive(Debug)]
pub struct Timed<T> {
    pub result: ProtocolResult<T>,
    pub elapsed: Duration,
    /// Instant the response (or error) arrived
    pub finished_at: Instant,
}

/// Clients plus the recorder of the session's scenario
#[derive(Clone)]
pub struct Protocol {
    queue: Arc<dyn QueueApi>,
    booking: Option<Arc<dyn BookingApi>>,
    recorder: Recorder,
}

impl Protocol {
    pub fn new(queue: Arc<dyn QueueApi>, booking: Option<Arc<dyn BookingApi>>, recorder: Recorder) -> Self {
        Self {
            queue,
            booking,
            recorder,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    fn observe<T>(&self, step: Step, started: Instant, result: ProtocolResult<T>) -> Timed<T> {
        let finished_at = Instant::now();
        let elapsed = finished_at.duration_since(started);
        let tags = self.recorder.step_tags(step.as_str());

        self.recorder.count_tagged(metrics::HTTP_REQS, &tags);
        self.recorder.trend_tagged(metrics::HTTP_REQ_DURATION, &tags, elapsed);
        self.recorder.rate_tagged(metrics::HTTP_REQ_FAILED, &tags, result.is_err());
        if matches!(result, Err(ProtocolError::Transport(_))) {
            self.recorder.count_tagged(metrics::TRANSPORT_ERRORS, &tags);
        }

        Timed {
            result,
            elapsed,
            finished_at,
        }
    }

    fn booking(&self) -> ProtocolResult<&Arc<dyn BookingApi>> {
        self.booking
            .as_ref()
            .ok_or_else(|| ProtocolError::InvalidRequest("no booking service configured".to_string()))
    }

    pub async fn enter(&self, concert_id: &str, user_id: &str) -> Timed<EnterData> {
        let started = Instant::now();
        let result = self.queue.enter(concert_id, user_id).await;
        self.observe(Step::Enter, started, result)
    }

    pub async fn poll(&self, concert_id: &str, user_id: &str) -> Timed<StatusData> {
        let started = Instant::now();
        let result = self.queue.status(concert_id, user_id).await;
        self.observe(Step::Poll, started, result)
    }

    pub async fn remove(&self, concert_id: &str, user_id: &str) -> Timed<()> {
        let started = Instant::now();
        let result = self.queue.remove(concert_id, user_id).await;
        self.observe(Step::Remove, started, result)
    }

    pub async fn validate(&self, concert_id: &str, user_id: &str, token: &str) -> Timed<TokenValidity> {
        let started = Instant::now();
        let result = self.queue.validate(concert_id, user_id, token).await;
        self.observe(Step::Validate, started, result)
    }

    pub async fn seats(&self, credentials: &QueueCredentials, schedule_id: i64) -> Timed<Vec<Seat>> {
        let started = Instant::now();
        let result = match self.booking() {
            Ok(booking) => booking.seats(credentials, schedule_id).await,
            Err(e) => Err(e),
        };
        self.observe(Step::Seats, started, result)
    }

    pub async fn reserve(&self, credentials: &QueueCredentials, schedule_id: i64, seat_id: i64) -> Timed<ReservationData> {
        let started = Instant::now();
        let result = match self.booking() {
            Ok(booking) => booking.reserve(credentials, schedule_id, seat_id).await,
            Err(e) => Err(e),
        };
        self.observe(Step::Reserve, started, result)
    }

    pub async fn pay(&self, credentials: &QueueCredentials, payment: &PaymentRequest) -> Timed<PaymentData> {
        let started = Instant::now();
        let result = match self.booking() {
            Ok(booking) => booking.pay(credentials, payment).await,
            Err(e) => Err(e),
        };
        self.observe(Step::Payment, started, result)
    }
}
