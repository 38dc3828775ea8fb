use chrono::Utc;
use marquee_core::booking::{Booking, BookingId};
use marquee_core::events::{publish_json, EventPublisher};
use marquee_core::jobs::{Job, JobRunner};
use marquee_core::payment::{CheckoutRequest, PaymentGateway};
use marquee_core::repository::{BookingLedger, MovieStore, ShowInventory, ShowRepository};
use marquee_core::seat::SeatSelection;
use marquee_core::show::{HoldResult, SeatHolder, Show, ShowId};
use marquee_core::{BookingError, CoreResult};
use marquee_shared::models::events::{SeatsHeldEvent, TOPIC_SEATS_HELD};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::policy::ReservationPolicy;

/// A successful hold: the booking and where to pay for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub booking_id: BookingId,
    pub payment_url: String,
}

/// Runs one booking attempt end to end: hold, ledger entry, expiry sweep,
/// checkout session. Seats are held before anything payable exists, and any
/// failure after the hold gives them back before the error is returned.
pub struct ReservationService {
    shows: Arc<dyn ShowRepository>,
    inventory: Arc<dyn ShowInventory>,
    ledger: Arc<dyn BookingLedger>,
    gateway: Arc<dyn PaymentGateway>,
    jobs: Arc<dyn JobRunner>,
    movies: Arc<dyn MovieStore>,
    events: Arc<dyn EventPublisher>,
    policy: ReservationPolicy,
}

impl ReservationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shows: Arc<dyn ShowRepository>,
        inventory: Arc<dyn ShowInventory>,
        ledger: Arc<dyn BookingLedger>,
        gateway: Arc<dyn PaymentGateway>,
        jobs: Arc<dyn JobRunner>,
        movies: Arc<dyn MovieStore>,
        events: Arc<dyn EventPublisher>,
        policy: ReservationPolicy,
    ) -> Self {
        Self {
            shows,
            inventory,
            ledger,
            gateway,
            jobs,
            movies,
            events,
            policy,
        }
    }

    pub fn policy(&self) -> &ReservationPolicy {
        &self.policy
    }

    pub async fn reserve<S: AsRef<str> + Sync>(
        &self,
        show_id: ShowId,
        seats: &[S],
        holder_id: &str,
    ) -> CoreResult<Reservation> {
        let selection = SeatSelection::validate(seats, &self.policy.layout, self.policy.max_seats)?;
        if holder_id.trim().is_empty() {
            return Err(BookingError::InvalidRequest("Missing holder".to_string()));
        }

        let now = Utc::now();
        let show = self
            .shows
            .get_show(show_id)
            .await?
            .ok_or_else(|| BookingError::InvalidRequest(format!("Unknown show {}", show_id)))?;
        if show.has_started(now) {
            return Err(BookingError::InvalidRequest("This show has already started".to_string()));
        }

        let holder = SeatHolder {
            holder_id: holder_id.to_string(),
            booking_id: Uuid::new_v4(),
        };
        match self.inventory.try_hold_seats(show_id, selection.as_slice(), &holder).await {
            Ok(HoldResult::Held) => {}
            Ok(HoldResult::Conflict(taken)) => {
                tracing::info!(show_id = %show_id, "Seat conflict on {:?}", taken);
                return Err(BookingError::SeatsTaken(taken));
            }
            Err(BookingError::NotFound(_)) => {
                return Err(BookingError::InvalidRequest(format!("Unknown show {}", show_id)));
            }
            Err(e) => return Err(e),
        }

        let booking = Booking::pending(
            holder.booking_id,
            holder_id,
            &show,
            selection.into_vec(),
            self.policy.hold_timeout,
            now,
        );

        match self.open_checkout(&show, &booking).await {
            Ok(payment_url) => {
                tracing::info!(
                    booking_id = %booking.id,
                    show_id = %show_id,
                    amount_cents = booking.amount_cents,
                    "Seats held until {}",
                    booking.hold_expires_at
                );
                let event = SeatsHeldEvent {
                    show_id,
                    booking_id: booking.id,
                    holder_id: booking.holder_id.clone(),
                    seats: booking.seats.iter().map(|s| s.to_string()).collect(),
                    held_at: now.timestamp(),
                };
                publish_json(self.events.as_ref(), TOPIC_SEATS_HELD, &booking.id.to_string(), &event).await;

                Ok(Reservation {
                    booking_id: booking.id,
                    payment_url,
                })
            }
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, "Reservation failed after hold: {}", e);
                self.compensate(&booking).await;
                Err(e)
            }
        }
    }

    /// Everything after the hold. The sweep is scheduled before the checkout
    /// session exists so nothing payable is ever left without an expiry.
    async fn open_checkout(&self, show: &Show, booking: &Booking) -> CoreResult<String> {
        self.ledger.create(booking).await?;
        self.jobs
            .schedule_at(Job::CheckPayment { booking_id: booking.id }, booking.hold_expires_at)
            .await?;

        let request = CheckoutRequest {
            booking_id: booking.id,
            amount_cents: booking.amount_cents,
            currency: self.policy.currency.clone(),
            description: self.describe(show).await,
            expires_at: booking.hold_expires_at,
            success_url: self.policy.success_url.clone(),
            cancel_url: self.policy.cancel_url.clone(),
        };
        let session = self.gateway.create_session(&request).await?;

        self.ledger
            .attach_payment(booking.id, &session.session_id, &session.redirect_url)
            .await?;
        Ok(session.redirect_url)
    }

    async fn describe(&self, show: &Show) -> String {
        match self.movies.get_movie(&show.movie_id).await {
            Ok(Some(movie)) => movie.title,
            _ => format!("Show {}", show.id),
        }
    }

    /// Undo a hold whose booking could not be completed. Steps that fail here
    /// are queued as jobs so the runner keeps retrying them.
    async fn compensate(&self, booking: &Booking) {
        let mut follow_ups = Vec::new();

        match self.ledger.mark_expired(booking.id).await {
            Ok(_) | Err(BookingError::NotFound(_)) => {}
            Err(e) => {
                tracing::error!(booking_id = %booking.id, "Failed to expire abandoned booking: {}", e);
                follow_ups.push(Job::CheckPayment { booking_id: booking.id });
            }
        }

        let release = booking.release_command();
        if let Err(e) = self.inventory.release_seats(&release).await {
            tracing::error!(booking_id = %booking.id, "Failed to release held seats: {}", e);
            follow_ups.push(Job::ReleaseSeats(release));
        }

        for job in follow_ups {
            let name = job.name();
            if let Err(e) = self.jobs.run_now(job).await {
                tracing::error!(
                    booking_id = %booking.id,
                    "Could not queue {} after failed reservation, seats need manual release: {}",
                    name,
                    e
                );
            }
        }
    }
}
