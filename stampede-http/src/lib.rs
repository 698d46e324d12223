//! HTTP clients for the services a Stampede run drives
//!
//! The queue (admission) and booking services are reached through the
//! [`QueueApi`] and [`BookingApi`] traits. [`HttpQueueClient`] and
//! [`HttpBookingClient`] implement them over `reqwest`; tests substitute
//! their own implementations.

pub mod client;
pub mod config;
pub mod errors;
pub mod response;
pub mod types;

// Re-export main types for convenience
pub use client::{BookingApi, HttpBookingClient, HttpQueueClient, QueueApi};
pub use config::HttpConfig;
pub use errors::{ProtocolError, ProtocolResult};
pub use types::{
    ApiEnvelope, EnterData, FixtureReport, PaymentData, PaymentRequest, QueueCredentials,
    ReservationData, Seat, StatusData, TokenValidity,
};
