use chrono::Duration;
use marquee_core::seat::{SeatLayout, MAX_SEATS_PER_BOOKING};

/// Tunables of the reservation path, filled from `business_rules` config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// How long seats stay held while the customer pays.
    pub hold_timeout: Duration,
    pub max_seats: usize,
    pub layout: SeatLayout,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl ReservationPolicy {
    /// Checkout return URLs pointing back at the web front end.
    pub fn for_origin(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            success_url: format!("{}/loading/my-bookings", origin),
            cancel_url: format!("{}/my-bookings", origin),
            ..Self::default()
        }
    }
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            hold_timeout: Duration::minutes(10),
            max_seats: MAX_SEATS_PER_BOOKING,
            layout: SeatLayout::default(),
            currency: "usd".to_string(),
            success_url: "http://localhost:5173/loading/my-bookings".to_string(),
            cancel_url: "http://localhost:5173/my-bookings".to_string(),
        }
    }
}
