use chrono::Utc;
use marquee_core::booking::{BookingId, PaidTransition};
use marquee_core::events::{publish_json, EventPublisher};
use marquee_core::jobs::{Job, JobRunner};
use marquee_core::payment::{PaymentEventKind, PaymentNotification};
use marquee_core::repository::BookingLedger;
use marquee_core::{BookingError, CoreResult};
use marquee_shared::models::events::{
    BookingPaidEvent, LatePaymentEvent, TOPIC_BOOKING_PAID, TOPIC_LATE_PAYMENT,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Paid(BookingId),
    /// Duplicate delivery for a booking that is already paid.
    AlreadyPaid(BookingId),
    /// Payment arrived after the hold expired and the seats were released.
    /// Needs a manual refund.
    LatePayment(BookingId),
    /// Checkout session lapsed; the expiry sweep was triggered early.
    SweepRequested(BookingId),
    Ignored,
}

/// Applies verified payment provider notifications to the booking ledger.
pub struct PaymentOrchestrator {
    ledger: Arc<dyn BookingLedger>,
    jobs: Arc<dyn JobRunner>,
    events: Arc<dyn EventPublisher>,
}

impl PaymentOrchestrator {
    pub fn new(ledger: Arc<dyn BookingLedger>, jobs: Arc<dyn JobRunner>, events: Arc<dyn EventPublisher>) -> Self {
        Self { ledger, jobs, events }
    }

    pub async fn handle_notification(&self, notification: &PaymentNotification) -> CoreResult<NotificationOutcome> {
        if notification.kind == PaymentEventKind::Other {
            tracing::debug!("Ignoring payment event {}", notification.event_type);
            return Ok(NotificationOutcome::Ignored);
        }

        let Some(booking_id) = notification.booking_id() else {
            tracing::warn!(
                "Payment event {} without a usable booking id: {:?}",
                notification.event_type,
                notification.correlation_id
            );
            return Ok(NotificationOutcome::Ignored);
        };

        match notification.kind {
            PaymentEventKind::Succeeded => self.settle(booking_id, notification).await,
            PaymentEventKind::SessionExpired => {
                self.jobs.run_now(Job::CheckPayment { booking_id }).await?;
                tracing::info!(booking_id = %booking_id, "Checkout session expired, sweep requested");
                Ok(NotificationOutcome::SweepRequested(booking_id))
            }
            PaymentEventKind::Other => Ok(NotificationOutcome::Ignored),
        }
    }

    async fn settle(&self, booking_id: BookingId, notification: &PaymentNotification) -> CoreResult<NotificationOutcome> {
        match self.ledger.mark_paid(booking_id).await {
            Ok(PaidTransition::Paid) => {
                tracing::info!(booking_id = %booking_id, "Booking paid");
                self.after_paid(booking_id).await;
                Ok(NotificationOutcome::Paid(booking_id))
            }
            Ok(PaidTransition::AlreadyPaid) => {
                tracing::debug!(booking_id = %booking_id, "Duplicate payment notification");
                Ok(NotificationOutcome::AlreadyPaid(booking_id))
            }
            Err(BookingError::InvalidTransition { from, to }) => {
                tracing::error!(
                    booking_id = %booking_id,
                    event_type = %notification.event_type,
                    "Payment received for {} booking (wanted {}), refund required",
                    from,
                    to
                );
                let event = LatePaymentEvent {
                    booking_id,
                    event_type: notification.event_type.clone(),
                    amount_cents: notification.amount_cents,
                    timestamp: Utc::now().timestamp(),
                };
                publish_json(self.events.as_ref(), TOPIC_LATE_PAYMENT, &booking_id.to_string(), &event).await;
                Ok(NotificationOutcome::LatePayment(booking_id))
            }
            Err(e) => Err(e),
        }
    }

    /// Side effects of a fresh payment. The booking is already committed, so
    /// failures here are logged and not propagated.
    async fn after_paid(&self, booking_id: BookingId) {
        if let Err(e) = self.jobs.run_now(Job::SendBookingConfirmation { booking_id }).await {
            tracing::warn!(booking_id = %booking_id, "Failed to queue confirmation email: {}", e);
        }

        match self.ledger.get(booking_id).await {
            Ok(Some(booking)) => {
                let event = BookingPaidEvent {
                    booking_id,
                    show_id: booking.show_id,
                    holder_id: booking.holder_id,
                    amount_cents: booking.amount_cents,
                    timestamp: Utc::now().timestamp(),
                };
                publish_json(self.events.as_ref(), TOPIC_BOOKING_PAID, &booking_id.to_string(), &event).await;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(booking_id = %booking_id, "Could not load paid booking for event: {}", e),
        }
    }
}
