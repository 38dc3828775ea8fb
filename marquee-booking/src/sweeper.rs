use chrono::{DateTime, Duration, Utc};
use marquee_core::booking::{BookingId, BookingStatus};
use marquee_core::events::{publish_json, EventPublisher};
use marquee_core::jobs::{Job, JobRunner};
use marquee_core::repository::{BookingLedger, ShowInventory};
use marquee_core::show::ReleaseSeats;
use marquee_core::{BookingError, CoreResult};
use marquee_shared::models::events::{BookingExpiredEvent, TOPIC_BOOKING_EXPIRED};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The booking was pending; it is now expired and its seats are free.
    Expired(ReleaseSeats),
    /// Already expired by an earlier run; the release was re-applied.
    AlreadyExpired,
    AlreadySettled,
    Missing,
    /// The sweep failed and a fresh `CheckPayment` is queued for this time.
    /// The failed run counts as handled so the runner does not retry it too.
    Rescheduled(DateTime<Utc>),
}

/// Reconciles a booking whose hold timed out. Safe to run any number of times
/// for the same booking.
pub struct ExpirySweeper {
    ledger: Arc<dyn BookingLedger>,
    inventory: Arc<dyn ShowInventory>,
    jobs: Arc<dyn JobRunner>,
    events: Arc<dyn EventPublisher>,
    retry_delay: Duration,
}

impl ExpirySweeper {
    pub fn new(
        ledger: Arc<dyn BookingLedger>,
        inventory: Arc<dyn ShowInventory>,
        jobs: Arc<dyn JobRunner>,
        events: Arc<dyn EventPublisher>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            ledger,
            inventory,
            jobs,
            events,
            retry_delay,
        }
    }

    /// On failure the sweep queues exactly one retry after the retry delay.
    /// The error is returned only when that retry could not be queued, so
    /// the runner's own redelivery takes over instead.
    pub async fn sweep(&self, booking_id: BookingId) -> CoreResult<SweepOutcome> {
        match self.try_sweep(booking_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let retry_at = Utc::now() + self.retry_delay;
                tracing::error!(booking_id = %booking_id, "Expiry sweep failed, retrying at {}: {}", retry_at, e);
                match self.jobs.schedule_at(Job::CheckPayment { booking_id }, retry_at).await {
                    Ok(_) => Ok(SweepOutcome::Rescheduled(retry_at)),
                    Err(schedule_err) => {
                        tracing::error!(booking_id = %booking_id, "Could not re-schedule expiry sweep: {}", schedule_err);
                        Err(e)
                    }
                }
            }
        }
    }

    async fn try_sweep(&self, booking_id: BookingId) -> CoreResult<SweepOutcome> {
        match self.ledger.mark_expired(booking_id).await {
            Ok(Some(release)) => {
                self.inventory.release_seats(&release).await?;
                tracing::info!(booking_id = %booking_id, "Released {} seats of unpaid booking", release.seats.len());

                let event = BookingExpiredEvent {
                    booking_id,
                    show_id: release.show_id,
                    released_seats: release.seats.iter().map(|s| s.to_string()).collect(),
                    timestamp: Utc::now().timestamp(),
                };
                publish_json(self.events.as_ref(), TOPIC_BOOKING_EXPIRED, &booking_id.to_string(), &event).await;
                Ok(SweepOutcome::Expired(release))
            }
            Ok(None) => self.reconcile_terminal(booking_id).await,
            Err(BookingError::NotFound(_)) => {
                tracing::debug!(booking_id = %booking_id, "Sweep for unknown booking");
                Ok(SweepOutcome::Missing)
            }
            Err(e) => Err(e),
        }
    }

    /// A previous run may have expired the booking and then failed to release.
    /// The release is owner-guarded, so repeating it never touches seats that
    /// were re-sold since.
    async fn reconcile_terminal(&self, booking_id: BookingId) -> CoreResult<SweepOutcome> {
        let Some(booking) = self.ledger.get(booking_id).await? else {
            return Ok(SweepOutcome::Missing);
        };

        match booking.status {
            BookingStatus::Expired => {
                self.inventory.release_seats(&booking.release_command()).await?;
                Ok(SweepOutcome::AlreadyExpired)
            }
            BookingStatus::Paid => Ok(SweepOutcome::AlreadySettled),
            // mark_expired declined a pending booking; let the next run decide.
            BookingStatus::Pending => Err(BookingError::Storage(format!(
                "Booking {} stayed pending after expiry",
                booking_id
            ))),
        }
    }
}
