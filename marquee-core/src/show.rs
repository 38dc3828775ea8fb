use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::BookingId;
use crate::seat::SeatLabel;

pub type ShowId = Uuid;

/// One screening of a movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: ShowId,
    /// External catalog id of the movie.
    pub movie_id: String,
    pub starts_at: DateTime<Utc>,
    /// Price per seat in minor currency units.
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Show {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now
    }
}

/// Admin input for a screening that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShow {
    pub movie_id: String,
    pub starts_at: DateTime<Utc>,
    pub price_cents: i64,
}

impl NewShow {
    pub fn into_show(self, now: DateTime<Utc>) -> Show {
        Show {
            id: Uuid::new_v4(),
            movie_id: self.movie_id,
            starts_at: self.starts_at,
            price_cents: self.price_cents,
            created_at: now,
        }
    }
}

/// Who a held seat belongs to. The booking id is allocated before the hold so
/// every held seat can be traced back to exactly one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatHolder {
    pub holder_id: String,
    pub booking_id: BookingId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldResult {
    Held,
    /// Nothing was held; these requested seats already belong to someone.
    Conflict(Vec<SeatLabel>),
}

/// Instruction to free the seats a booking still owns on a show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSeats {
    pub show_id: ShowId,
    pub booking_id: BookingId,
    pub seats: Vec<SeatLabel>,
}
