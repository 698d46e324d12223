//! Queue and booking service clients

use crate::config::HttpConfig;
use crate::errors::{ProtocolError, ProtocolResult};
use crate::response;
use crate::types::{
    EnterData, EnterRequest, FixtureReport, PaymentData, PaymentRequest, QueueCredentials,
    ReservationData, ReservationRequest, Seat, StatusData, TokenValidity, ValidateRequest,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, trace};
use url::Url;

const USER_ID_HEADER: &str = "X-User-Id";
const QUEUE_TOKEN_HEADER: &str = "X-Queue-Token";

/// Operations of the admission-control service
#[async_trait]
pub trait QueueApi: Send + Sync {
    /// `POST /api/v1/queue/enter`
    async fn enter(&self, concert_id: &str, user_id: &str) -> ProtocolResult<EnterData>;

    /// `GET /api/v1/queue/status`
    async fn status(&self, concert_id: &str, user_id: &str) -> ProtocolResult<StatusData>;

    /// `DELETE /api/v1/queue/remove`
    async fn remove(&self, concert_id: &str, user_id: &str) -> ProtocolResult<()>;

    /// `POST /api/v1/queue/validate`
    async fn validate(&self, concert_id: &str, user_id: &str, token: &str) -> ProtocolResult<TokenValidity>;

    /// `GET /actuator/health`
    async fn health(&self) -> ProtocolResult<()>;
}

/// Operations of the booking service
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// `GET /api/v1/schedules/{id}/seats`
    async fn seats(&self, credentials: &QueueCredentials, schedule_id: i64) -> ProtocolResult<Vec<Seat>>;

    /// `POST /api/v1/reservations`
    async fn reserve(
        &self,
        credentials: &QueueCredentials,
        schedule_id: i64,
        seat_id: i64,
    ) -> ProtocolResult<ReservationData>;

    /// `POST /api/v1/payments`
    async fn pay(&self, credentials: &QueueCredentials, payment: &PaymentRequest) -> ProtocolResult<PaymentData>;

    /// `GET /actuator/health`
    async fn health(&self) -> ProtocolResult<()>;

    /// `POST /api/admin/test-data/init`
    async fn init_fixture(&self) -> ProtocolResult<FixtureReport>;
}

/// Send a request and hand back status plus body text
async fn send(request: RequestBuilder) -> ProtocolResult<(u16, String)> {
    let response = request.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    trace!(status, body_len = body.len(), "response received");
    Ok((status, body))
}

fn join(base: &Url, path: &str) -> ProtocolResult<Url> {
    base.join(path)
        .map_err(|e| ProtocolError::InvalidRequest(format!("cannot join '{}' onto {}: {}", path, base, e)))
}

fn parse_base(base_url: &str) -> ProtocolResult<Url> {
    // A trailing slash keeps `join` from dropping the last path segment
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&normalized).map_err(|e| ProtocolError::InvalidRequest(format!("invalid base URL '{}': {}", base_url, e)))
}

/// `reqwest` implementation of [`QueueApi`]
#[derive(Debug, Clone)]
pub struct HttpQueueClient {
    client: Client,
    base: Url,
}

impl HttpQueueClient {
    pub fn new(base_url: &str, config: &HttpConfig) -> ProtocolResult<Self> {
        Ok(Self::with_client(config.build_client()?, parse_base(base_url)?))
    }

    /// Share an existing connection pool
    pub fn with_client(client: Client, base: Url) -> Self {
        debug!(base = %base, "queue client created");
        Self { client, base }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }
}

#[async_trait]
impl QueueApi for HttpQueueClient {
    async fn enter(&self, concert_id: &str, user_id: &str) -> ProtocolResult<EnterData> {
        let url = join(&self.base, "api/v1/queue/enter")?;
        let (status, body) = send(self.client.post(url).json(&EnterRequest { concert_id, user_id })).await?;
        response::decode_enter(status, &body)
    }

    async fn status(&self, concert_id: &str, user_id: &str) -> ProtocolResult<StatusData> {
        let url = join(&self.base, "api/v1/queue/status")?;
        let request = self
            .client
            .get(url)
            .query(&[("concertId", concert_id), ("userId", user_id)]);
        let (status, body) = send(request).await?;
        response::decode_status(status, &body)
    }

    async fn remove(&self, concert_id: &str, user_id: &str) -> ProtocolResult<()> {
        let url = join(&self.base, "api/v1/queue/remove")?;
        let request = self
            .client
            .delete(url)
            .query(&[("concertId", concert_id), ("userId", user_id)]);
        let (status, body) = send(request).await?;
        response::decode_remove(status, &body)
    }

    async fn validate(&self, concert_id: &str, user_id: &str, token: &str) -> ProtocolResult<TokenValidity> {
        let url = join(&self.base, "api/v1/queue/validate")?;
        let request = self.client.post(url).json(&ValidateRequest {
            concert_id,
            user_id,
            token,
        });
        let (status, _) = send(request).await?;
        response::decode_validate(status)
    }

    async fn health(&self) -> ProtocolResult<()> {
        let url = join(&self.base, "actuator/health")?;
        let (status, _) = send(self.client.get(url)).await?;
        response::decode_health(status)
    }
}

/// `reqwest` implementation of [`BookingApi`]
#[derive(Debug, Clone)]
pub struct HttpBookingClient {
    client: Client,
    base: Url,
}

impl HttpBookingClient {
    pub fn new(base_url: &str, config: &HttpConfig) -> ProtocolResult<Self> {
        Ok(Self::with_client(config.build_client()?, parse_base(base_url)?))
    }

    pub fn with_client(client: Client, base: Url) -> Self {
        debug!(base = %base, "booking client created");
        Self { client, base }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn authorized(&self, request: RequestBuilder, credentials: &QueueCredentials) -> RequestBuilder {
        request
            .header(USER_ID_HEADER, &credentials.user_id)
            .header(QUEUE_TOKEN_HEADER, &credentials.token)
    }
}

#[async_trait]
impl BookingApi for HttpBookingClient {
    async fn seats(&self, credentials: &QueueCredentials, schedule_id: i64) -> ProtocolResult<Vec<Seat>> {
        let url = join(&self.base, &format!("api/v1/schedules/{}/seats", schedule_id))?;
        let (status, body) = send(self.authorized(self.client.get(url), credentials)).await?;
        response::decode_seats(status, &body)
    }

    async fn reserve(
        &self,
        credentials: &QueueCredentials,
        schedule_id: i64,
        seat_id: i64,
    ) -> ProtocolResult<ReservationData> {
        let url = join(&self.base, "api/v1/reservations")?;
        let request = self
            .authorized(self.client.post(url), credentials)
            .json(&ReservationRequest { schedule_id, seat_id });
        let (status, body) = send(request).await?;
        response::decode_reservation(status, &body)
    }

    async fn pay(&self, credentials: &QueueCredentials, payment: &PaymentRequest) -> ProtocolResult<PaymentData> {
        let url = join(&self.base, "api/v1/payments")?;
        let request = self.authorized(self.client.post(url), credentials).json(payment);
        let (status, body) = send(request).await?;
        response::decode_payment(status, &body)
    }

    async fn health(&self) -> ProtocolResult<()> {
        let url = join(&self.base, "actuator/health")?;
        let (status, _) = send(self.client.get(url)).await?;
        response::decode_health(status)
    }

    async fn init_fixture(&self) -> ProtocolResult<FixtureReport> {
        let url = join(&self.base, "api/admin/test-data/init")?;
        let (status, body) = send(self.client.post(url)).await?;
        response::decode_fixture(status, &body)
    }
}
