use chrono::Utc;
use marquee_core::jobs::Job;
use marquee_core::repository::ShowInventory;
use marquee_core::CoreResult;
use std::sync::Arc;

use crate::notifications::{DeliveryReport, Notifier};
use crate::sweeper::{ExpirySweeper, SweepOutcome};
use crate::user_sync::{SyncOutcome, UserSync};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Swept(SweepOutcome),
    SeatsReleased,
    Confirmation { sent: bool },
    Reminders(DeliveryReport),
    Announced(DeliveryReport),
    UserSynced(SyncOutcome),
}

/// Routes a dequeued job to its handler. Handlers are idempotent, so an
/// error only means "deliver this again later".
pub struct JobDispatcher {
    sweeper: Arc<ExpirySweeper>,
    notifier: Arc<Notifier>,
    user_sync: Arc<UserSync>,
    inventory: Arc<dyn ShowInventory>,
}

impl JobDispatcher {
    pub fn new(
        sweeper: Arc<ExpirySweeper>,
        notifier: Arc<Notifier>,
        user_sync: Arc<UserSync>,
        inventory: Arc<dyn ShowInventory>,
    ) -> Self {
        Self {
            sweeper,
            notifier,
            user_sync,
            inventory,
        }
    }

    pub async fn dispatch(&self, job: &Job) -> CoreResult<DispatchOutcome> {
        tracing::debug!("Dispatching {}", job.name());
        match job {
            Job::CheckPayment { booking_id } => self.sweeper.sweep(*booking_id).await.map(DispatchOutcome::Swept),
            Job::ReleaseSeats(release) => {
                self.inventory.release_seats(release).await?;
                tracing::info!(booking_id = %release.booking_id, "Released seats of failed reservation");
                Ok(DispatchOutcome::SeatsReleased)
            }
            Job::SendBookingConfirmation { booking_id } => {
                let sent = self.notifier.send_booking_confirmation(*booking_id).await?;
                Ok(DispatchOutcome::Confirmation { sent })
            }
            Job::SendShowReminders => self
                .notifier
                .send_show_reminders(Utc::now())
                .await
                .map(DispatchOutcome::Reminders),
            Job::AnnounceShow { movie_title } => self
                .notifier
                .announce_show(movie_title)
                .await
                .map(DispatchOutcome::Announced),
            Job::SyncUser(event) => self.user_sync.apply(event).await.map(DispatchOutcome::UserSynced),
        }
    }
}
