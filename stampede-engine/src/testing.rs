//! Scripted in-memory clients for engine tests

use async_trait::async_trait;
use stampede_http::{
    BookingApi, EnterData, FixtureReport, PaymentData, PaymentRequest, ProtocolError, ProtocolResult,
    QueueApi, QueueCredentials, ReservationData, Seat, StatusData, TokenValidity,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn status(value: &str, token: Option<&str>) -> ProtocolResult<StatusData> {
    Ok(StatusData {
        status: value.to_string(),
        token: token.map(str::to_string),
        position: None,
    })
}

pub fn entered(position: i64) -> ProtocolResult<EnterData> {
    Ok(EnterData { position, token: None })
}

/// Queue service whose answers are fixed up front
pub struct FakeQueue {
    pub enter_result: ProtocolResult<EnterData>,
    /// Answers consumed by successive polls; `status_default` afterwards
    pub statuses: Mutex<VecDeque<ProtocolResult<StatusData>>>,
    pub status_default: ProtocolResult<StatusData>,
    pub remove_result: ProtocolResult<()>,
    pub validate_result: ProtocolResult<TokenValidity>,
    pub health_result: ProtocolResult<()>,
    /// Simulated latency of every call
    pub latency: Duration,
    pub enters: AtomicUsize,
    pub polls: AtomicUsize,
    pub removes: AtomicUsize,
    pub validations: AtomicUsize,
}

impl Default for FakeQueue {
    fn default() -> Self {
        Self {
            enter_result: entered(1),
            statuses: Mutex::new(VecDeque::new()),
            status_default: status("ACTIVE", Some("T1")),
            remove_result: Ok(()),
            validate_result: Ok(TokenValidity::Valid),
            health_result: Ok(()),
            latency: Duration::ZERO,
            enters: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            validations: AtomicUsize::new(0),
        }
    }
}

impl FakeQueue {
    pub fn with_statuses(statuses: Vec<ProtocolResult<StatusData>>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            ..Self::default()
        }
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueApi for FakeQueue {
    async fn enter(&self, _concert_id: &str, user_id: &str) -> ProtocolResult<EnterData> {
        self.enters.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.enter_result.clone().map(|mut data| {
            if data.token.is_none() {
                data.token = Some(format!("token-{}", user_id));
            }
            data
        })
    }

    async fn status(&self, _concert_id: &str, _user_id: &str) -> ProtocolResult<StatusData> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        let next = self.statuses.lock().ok().and_then(|mut queue| queue.pop_front());
        next.unwrap_or_else(|| self.status_default.clone())
    }

    async fn remove(&self, _concert_id: &str, _user_id: &str) -> ProtocolResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.remove_result.clone()
    }

    async fn validate(&self, _concert_id: &str, _user_id: &str, _token: &str) -> ProtocolResult<TokenValidity> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.validate_result.clone()
    }

    async fn health(&self) -> ProtocolResult<()> {
        self.health_result.clone()
    }
}

/// Booking service whose answers are fixed up front
pub struct FakeBooking {
    pub seats_result: ProtocolResult<Vec<Seat>>,
    pub reserve_result: ProtocolResult<ReservationData>,
    pub pay_result: ProtocolResult<PaymentData>,
    pub health_result: ProtocolResult<()>,
    pub fixture_result: ProtocolResult<FixtureReport>,
    pub payments: Mutex<Vec<PaymentRequest>>,
    pub fixtures: AtomicUsize,
}

pub fn seat(seat_id: i64, status: &str) -> Seat {
    Seat {
        seat_id,
        schedule_id: Some(1),
        seat_number: Some(seat_id as i32),
        grade: None,
        price: None,
        status: status.to_string(),
    }
}

impl Default for FakeBooking {
    fn default() -> Self {
        Self {
            seats_result: Ok(vec![seat(1, "RESERVED"), seat(2, "AVAILABLE")]),
            reserve_result: Ok(ReservationData {
                reservation_id: 10,
                status: None,
            }),
            pay_result: Ok(PaymentData {
                payment_id: 20,
                status: None,
            }),
            health_result: Ok(()),
            fixture_result: Ok(FixtureReport {
                success: true,
                message: None,
                duration_ms: Some(5),
            }),
            payments: Mutex::new(Vec::new()),
            fixtures: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BookingApi for FakeBooking {
    async fn seats(&self, _credentials: &QueueCredentials, _schedule_id: i64) -> ProtocolResult<Vec<Seat>> {
        self.seats_result.clone()
    }

    async fn reserve(
        &self,
        credentials: &QueueCredentials,
        _schedule_id: i64,
        _seat_id: i64,
    ) -> ProtocolResult<ReservationData> {
        if credentials.token.is_empty() {
            return Err(ProtocolError::UnexpectedStatus { status: 401 });
        }
        self.reserve_result.clone()
    }

    async fn pay(&self, _credentials: &QueueCredentials, payment: &PaymentRequest) -> ProtocolResult<PaymentData> {
        if let Ok(mut payments) = self.payments.lock() {
            payments.push(payment.clone());
        }
        self.pay_result.clone()
    }

    async fn health(&self) -> ProtocolResult<()> {
        self.health_result.clone()
    }

    async fn init_fixture(&self) -> ProtocolResult<FixtureReport> {
        self.fixtures.fetch_add(1, Ordering::SeqCst);
        self.fixture_result.clone()
    }
}
