use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::booking::{Booking, BookingId, PaidTransition};
use crate::catalog::Movie;
use crate::identity::UserProfile;
use crate::seat::SeatLabel;
use crate::show::{HoldResult, NewShow, ReleaseSeats, SeatHolder, Show, ShowId};
use crate::CoreResult;

/// Authoritative seat map of every show. Implementations must make
/// `try_hold_seats` atomic in storage: all requested seats become held by the
/// holder, or none do.
#[async_trait]
pub trait ShowInventory: Send + Sync {
    /// Fails with `NotFound` for an unknown show.
    async fn try_hold_seats(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        holder: &SeatHolder,
    ) -> CoreResult<HoldResult>;

    /// Frees the listed seats that the command's booking still owns.
    /// Releasing a free seat is a no-op.
    async fn release_seats(&self, release: &ReleaseSeats) -> CoreResult<()>;

    /// Display snapshot; never used for correctness decisions.
    async fn list_occupied(&self, show_id: ShowId) -> CoreResult<BTreeSet<SeatLabel>>;
}

#[async_trait]
pub trait ShowRepository: Send + Sync {
    async fn create_shows(&self, shows: Vec<NewShow>) -> CoreResult<Vec<Show>>;

    async fn get_show(&self, id: ShowId) -> CoreResult<Option<Show>>;

    /// Shows starting at or after `from`, earliest first.
    async fn list_upcoming(&self, from: DateTime<Utc>) -> CoreResult<Vec<Show>>;

    async fn list_upcoming_for_movie(&self, movie_id: &str, from: DateTime<Utc>) -> CoreResult<Vec<Show>>;

    /// Shows with `from <= starts_at <= to`, earliest first.
    async fn list_starting_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> CoreResult<Vec<Show>>;
}

/// Booking records and their state machine.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn create(&self, booking: &Booking) -> CoreResult<()>;

    async fn get(&self, id: BookingId) -> CoreResult<Option<Booking>>;

    async fn attach_payment(&self, id: BookingId, reference: &str, link: &str) -> CoreResult<()>;

    /// `PENDING -> PAID`. Idempotent on `PAID`; `InvalidTransition` on `EXPIRED`.
    async fn mark_paid(&self, id: BookingId) -> CoreResult<PaidTransition>;

    /// `PENDING -> EXPIRED`, handing back the seats to free. `None` when the
    /// booking is already terminal.
    async fn mark_expired(&self, id: BookingId) -> CoreResult<Option<ReleaseSeats>>;

    /// Newest first.
    async fn list_for_holder(&self, holder_id: &str) -> CoreResult<Vec<Booking>>;

    /// Newest first.
    async fn list_all(&self) -> CoreResult<Vec<Booking>>;

    async fn list_paid(&self) -> CoreResult<Vec<Booking>>;

    /// Paid bookings on any of the given shows.
    async fn paid_for_shows(&self, show_ids: &[ShowId]) -> CoreResult<Vec<Booking>>;
}

/// Local copies of catalog movies that have shows scheduled.
#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn get_movie(&self, id: &str) -> CoreResult<Option<Movie>>;

    async fn save_movie(&self, movie: &Movie) -> CoreResult<()>;

    /// Missing ids are skipped.
    async fn get_movies(&self, ids: &[String]) -> CoreResult<Vec<Movie>>;
}

/// Users mirrored from the identity provider.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn upsert(&self, user: &UserProfile) -> CoreResult<()>;

    /// Deleting an unknown user is a no-op.
    async fn delete(&self, id: &str) -> CoreResult<()>;

    async fn get(&self, id: &str) -> CoreResult<Option<UserProfile>>;

    async fn get_many(&self, ids: &[String]) -> CoreResult<Vec<UserProfile>>;

    async fn list_all(&self) -> CoreResult<Vec<UserProfile>>;

    async fn count(&self) -> CoreResult<u64>;

    /// Adds the movie if absent, removes it otherwise. Returns the new list.
    async fn toggle_favorite(&self, user_id: &str, movie_id: &str) -> CoreResult<Vec<String>>;
}
