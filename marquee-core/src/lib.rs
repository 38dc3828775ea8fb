pub mod seat;
pub mod show;
pub mod booking;
pub mod repository;
pub mod payment;
pub mod jobs;
pub mod identity;
pub mod catalog;
pub mod notify;
pub mod events;

use booking::BookingStatus;
use seat::SeatLabel;

/// Failure taxonomy shared by every booking-facing operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    /// Bad input shape. Caller error, never retried.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// Another holder already owns these seats.
    #[error("Seats already taken: {}", seat::join_labels(.0))]
    SeatsTaken(Vec<SeatLabel>),
    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    /// Payment or catalog provider unavailable. Retryable by the caller.
    #[error("Gateway failure: {0}")]
    GatewayFailure(String),
    /// Persistence or transport failure.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl BookingError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn gateway(err: impl std::fmt::Display) -> Self {
        Self::GatewayFailure(err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayFailure(_) | Self::Storage(_))
    }
}

pub type CoreResult<T> = Result<T, BookingError>;
