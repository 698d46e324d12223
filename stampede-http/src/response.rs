//! Decoding of raw responses into step outcomes
//!
//! Each decoder takes the HTTP status and body text and applies the success
//! rule of one endpoint, so it can be exercised without a server.

use crate::errors::{ProtocolError, ProtocolResult};
use crate::types::{
    ApiEnvelope, EnterData, FixtureReport, PaymentData, ReservationData, ResultEnvelope, Seat,
    StatusData, TokenValidity,
};
use serde::de::DeserializeOwned;

const OK: u16 = 200;
const CREATED: u16 = 201;
const UNAUTHORIZED: u16 = 401;

fn expect_status(status: u16, expected: u16) -> ProtocolResult<()> {
    if status == expected {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedStatus { status })
    }
}

fn parse<T: DeserializeOwned>(status: u16, body: &str) -> ProtocolResult<T> {
    serde_json::from_str(body).map_err(|e| ProtocolError::Malformed {
        status,
        reason: e.to_string(),
    })
}

fn require_success(status: u16, result: Option<&str>) -> ProtocolResult<()> {
    match result {
        Some("success") => Ok(()),
        other => Err(ProtocolError::Rejected {
            status,
            result: other.unwrap_or("<missing>").to_string(),
        }),
    }
}

/// 201 with `result == "success"` and `data.position`
pub fn decode_enter(status: u16, body: &str) -> ProtocolResult<EnterData> {
    expect_status(status, CREATED)?;
    let envelope: ApiEnvelope<EnterData> = parse(status, body)?;
    require_success(status, envelope.result.as_deref())?;
    Ok(envelope.data)
}

/// 200 with `data.status`
pub fn decode_status(status: u16, body: &str) -> ProtocolResult<StatusData> {
    expect_status(status, OK)?;
    parse::<ApiEnvelope<StatusData>>(status, body).map(|envelope| envelope.data)
}

/// 200 with `result == "success"`
pub fn decode_remove(status: u16, body: &str) -> ProtocolResult<()> {
    expect_status(status, OK)?;
    let envelope: ResultEnvelope = parse(status, body)?;
    require_success(status, envelope.result.as_deref())
}

/// 200 is a valid token, 401 an invalid one; both are answers
pub fn decode_validate(status: u16) -> ProtocolResult<TokenValidity> {
    match status {
        OK => Ok(TokenValidity::Valid),
        UNAUTHORIZED => Ok(TokenValidity::Invalid),
        status => Err(ProtocolError::UnexpectedStatus { status }),
    }
}

/// 200 with a non-empty bare array
pub fn decode_seats(status: u16, body: &str) -> ProtocolResult<Vec<Seat>> {
    expect_status(status, OK)?;
    let seats: Vec<Seat> = parse(status, body)?;
    if seats.is_empty() {
        return Err(ProtocolError::Rejected {
            status,
            result: "empty seat list".to_string(),
        });
    }
    Ok(seats)
}

/// 201 with `data.reservationId`
pub fn decode_reservation(status: u16, body: &str) -> ProtocolResult<ReservationData> {
    expect_status(status, CREATED)?;
    parse::<ApiEnvelope<ReservationData>>(status, body).map(|envelope| envelope.data)
}

/// 201 with `data.paymentId`
pub fn decode_payment(status: u16, body: &str) -> ProtocolResult<PaymentData> {
    expect_status(status, CREATED)?;
    parse::<ApiEnvelope<PaymentData>>(status, body).map(|envelope| envelope.data)
}

/// 200 with a JSON report whose `success`, when present, is true
pub fn decode_fixture(status: u16, body: &str) -> ProtocolResult<FixtureReport> {
    expect_status(status, OK)?;
    let report: FixtureReport = parse(status, body)?;
    if !report.success {
        return Err(ProtocolError::Rejected {
            status,
            result: report
                .message
                .unwrap_or_else(|| "fixture not created".to_string()),
        });
    }
    Ok(report)
}

pub fn decode_health(status: u16) -> ProtocolResult<()> {
    expect_status(status, OK)
}
