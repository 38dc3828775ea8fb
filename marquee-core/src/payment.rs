use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::BookingId;
use crate::CoreResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Travels to the provider as opaque metadata and comes back on the webhook.
    pub booking_id: BookingId,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    pub expires_at: DateTime<Utc>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub redirect_url: String,
}

/// Hosted checkout provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Errors surface as `GatewayFailure`.
    async fn create_session(&self, request: &CheckoutRequest) -> CoreResult<CheckoutSession>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    Succeeded,
    /// The checkout session lapsed without payment.
    SessionExpired,
    Other,
}

/// A provider notification that already passed signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub event_type: String,
    pub correlation_id: Option<String>,
    pub kind: PaymentEventKind,
    pub amount_cents: Option<i64>,
}

impl PaymentNotification {
    pub fn booking_id(&self) -> Option<BookingId> {
        self.correlation_id.as_deref().and_then(|id| id.parse().ok())
    }
}
