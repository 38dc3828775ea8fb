use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::seat::SeatLabel;
use crate::show::{ReleaseSeats, Show, ShowId};
use crate::BookingError;

pub type BookingId = Uuid;

/// Lifecycle of a booking. `Paid` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Paid,
    Expired,
}

/// Result of a successful `mark_paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidTransition {
    Paid,
    /// The booking was already paid; duplicate provider notification.
    AlreadyPaid,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Decides what `mark_paid` does from the current status.
    pub fn paid_transition(self) -> Result<PaidTransition, BookingError> {
        match self {
            Self::Pending => Ok(PaidTransition::Paid),
            Self::Paid => Ok(PaidTransition::AlreadyPaid),
            Self::Expired => Err(BookingError::InvalidTransition {
                from: self,
                to: Self::Paid,
            }),
        }
    }

    /// Only pending bookings expire; anything else is a no-op for the sweeper.
    pub fn can_expire(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(BookingError::Storage(format!("Unknown booking status {:?}", other))),
        }
    }
}

/// One reservation attempt and its payment outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub holder_id: String,
    pub show_id: ShowId,
    pub seats: Vec<SeatLabel>,
    /// Fixed at creation: show price times seat count.
    pub amount_cents: i64,
    pub status: BookingStatus,
    /// Checkout session id at the payment provider.
    pub payment_reference: Option<String>,
    /// Where the holder completes payment. Cleared once paid.
    pub payment_link: Option<String>,
    pub hold_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn pending(
        id: BookingId,
        holder_id: impl Into<String>,
        show: &Show,
        seats: Vec<SeatLabel>,
        hold_timeout: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            holder_id: holder_id.into(),
            show_id: show.id,
            amount_cents: amount_for(show.price_cents, seats.len()),
            seats,
            status: BookingStatus::Pending,
            payment_reference: None,
            payment_link: None,
            hold_expires_at: now + hold_timeout,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn release_command(&self) -> ReleaseSeats {
        ReleaseSeats {
            show_id: self.show_id,
            booking_id: self.id,
            seats: self.seats.clone(),
        }
    }
}

pub fn amount_for(price_cents: i64, seat_count: usize) -> i64 {
    price_cents.saturating_mul(seat_count as i64)
}
