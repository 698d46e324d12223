//! Request and response schemas of the queue and booking endpoints

use serde::{Deserialize, Serialize};

/// `{result, message, data}` wrapper used by both services
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

/// Envelope whose `data` may be absent or null
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultEnvelope {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterData {
    pub position: i64,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
    pub status: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub seat_id: i64,
    #[serde(default)]
    pub schedule_id: Option<i64>,
    #[serde(default)]
    pub seat_number: Option<i32>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub price: Option<serde_json::Number>,
    pub status: String,
}

impl Seat {
    pub fn is_available(&self) -> bool {
        self.status == "AVAILABLE"
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationData {
    pub reservation_id: i64,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    pub payment_id: i64,
    #[serde(default)]
    pub status: Option<String>,
}

/// Outcome of `POST /queue/validate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidity {
    Valid,
    Invalid,
}

/// Body of the test-data init endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixtureReport {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

fn default_success() -> bool {
    true
}

/// Identity and admission token sent to the booking service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCredentials {
    pub user_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnterRequest<'a> {
    pub concert_id: &'a str,
    pub user_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateRequest<'a> {
    pub concert_id: &'a str,
    pub user_id: &'a str,
    pub token: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReservationRequest {
    pub schedule_id: i64,
    pub seat_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub reservation_id: i64,
    pub user_id: String,
    pub amount: i64,
    pub payment_method: String,
    pub concert_id: String,
}
