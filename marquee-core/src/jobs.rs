use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::BookingId;
use crate::identity::UserEvent;
use crate::show::ReleaseSeats;
use crate::CoreResult;

/// Background work, serialized as `{"name": ..., "data": ...}` on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum Job {
    /// Expiry sweep for one booking.
    #[serde(rename = "booking/check-payment")]
    CheckPayment { booking_id: BookingId },
    /// Retry of a seat release that failed inline.
    #[serde(rename = "booking/release-seats")]
    ReleaseSeats(ReleaseSeats),
    #[serde(rename = "booking/send-confirmation")]
    SendBookingConfirmation { booking_id: BookingId },
    #[serde(rename = "show/send-reminders")]
    SendShowReminders,
    #[serde(rename = "show/announce")]
    AnnounceShow { movie_title: String },
    #[serde(rename = "user/sync")]
    SyncUser(UserEvent),
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::CheckPayment { .. } => "booking/check-payment",
            Job::ReleaseSeats(_) => "booking/release-seats",
            Job::SendBookingConfirmation { .. } => "booking/send-confirmation",
            Job::SendShowReminders => "show/send-reminders",
            Job::AnnounceShow { .. } => "show/announce",
            Job::SyncUser(_) => "user/sync",
        }
    }
}

/// Delayed execution with at-least-once delivery and no ordering guarantee.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn schedule_at(&self, job: Job, fire_at: DateTime<Utc>) -> CoreResult<Uuid>;

    async fn run_now(&self, job: Job) -> CoreResult<Uuid> {
        self.schedule_at(job, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_wire_shape() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(Job::CheckPayment { booking_id: id }).unwrap();
        assert_eq!(json["name"], "booking/check-payment");
        assert_eq!(json["data"]["booking_id"], id.to_string());

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back.name(), "booking/check-payment");
    }

    #[test]
    fn test_unit_job_deserializes_without_data() {
        let job: Job = serde_json::from_str(r#"{"name":"show/send-reminders"}"#).unwrap();
        assert_eq!(job, Job::SendShowReminders);
    }
}
