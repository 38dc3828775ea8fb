use uuid::Uuid;

pub const TOPIC_SEATS_HELD: &str = "seats.held";
pub const TOPIC_BOOKING_PAID: &str = "booking.paid";
pub const TOPIC_BOOKING_EXPIRED: &str = "booking.expired";
pub const TOPIC_LATE_PAYMENT: &str = "booking.late_payment";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SeatsHeldEvent {
    pub show_id: Uuid,
    pub booking_id: Uuid,
    pub holder_id: String,
    pub seats: Vec<String>,
    pub held_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingPaidEvent {
    pub booking_id: Uuid,
    pub show_id: Uuid,
    pub holder_id: String,
    pub amount_cents: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingExpiredEvent {
    pub booking_id: Uuid,
    pub show_id: Uuid,
    pub released_seats: Vec<String>,
    pub timestamp: i64,
}

/// A payment that arrived for a booking whose seats were already released.
/// Consumers reconcile these by hand (refund).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct LatePaymentEvent {
    pub booking_id: Uuid,
    pub event_type: String,
    pub amount_cents: Option<i64>,
    pub timestamp: i64,
}
