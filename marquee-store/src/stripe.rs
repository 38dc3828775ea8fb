use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marquee_core::payment::{CheckoutRequest, CheckoutSession, PaymentGateway};
use marquee_core::{BookingError, CoreResult};
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{error, info};

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// Stripe refuses checkout sessions that expire sooner than this.
const MIN_SESSION_MINUTES: i64 = 30;

/// The session may outlive the seat hold. The booking ledger, not the
/// session, decides whether a late payment is accepted.
pub fn session_expiry(requested: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    requested.max(now + Duration::minutes(MIN_SESSION_MINUTES))
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Hosted Stripe Checkout over the REST API.
#[derive(Clone)]
pub struct StripeCheckoutGateway {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl StripeCheckoutGateway {
    pub fn new(api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(StdDuration::from_secs(10)).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: STRIPE_API.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn form(request: &CheckoutRequest, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let booking_id = request.booking_id.to_string();
        vec![
            ("mode", "payment".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", request.currency.clone()),
            ("line_items[0][price_data][unit_amount]", request.amount_cents.to_string()),
            ("line_items[0][price_data][product_data][name]", request.description.clone()),
            ("metadata[booking_id]", booking_id.clone()),
            // Copied onto the payment intent so `payment_intent.succeeded` carries it too.
            ("payment_intent_data[metadata][booking_id]", booking_id),
            ("expires_at", session_expiry(request.expires_at, now).timestamp().to_string()),
        ]
    }
}

#[async_trait]
impl PaymentGateway for StripeCheckoutGateway {
    async fn create_session(&self, request: &CheckoutRequest) -> CoreResult<CheckoutSession> {
        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .form(&Self::form(request, Utc::now()))
            .send()
            .await
            .map_err(BookingError::gateway)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.to_string());
            error!(booking_id = %request.booking_id, "Stripe rejected checkout session: {}", message);
            return Err(BookingError::gateway(message));
        }

        let session: SessionResponse = response.json().await.map_err(BookingError::gateway)?;
        let Some(url) = session.url else {
            return Err(BookingError::gateway("Checkout session without redirect url"));
        };

        info!(booking_id = %request.booking_id, session_id = %session.id, "Checkout session created");
        Ok(CheckoutSession {
            session_id: session.id,
            redirect_url: url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request(expires_at: DateTime<Utc>) -> CheckoutRequest {
        CheckoutRequest {
            booking_id: Uuid::new_v4(),
            amount_cents: 2400,
            currency: "usd".to_string(),
            description: "Fight Club".to_string(),
            expires_at,
            success_url: "http://localhost:5173/loading/my-bookings".to_string(),
            cancel_url: "http://localhost:5173/my-bookings".to_string(),
        }
    }

    #[test]
    fn test_short_holds_get_minimum_session_lifetime() {
        let now = Utc::now();
        assert_eq!(session_expiry(now + Duration::minutes(10), now), now + Duration::minutes(30));
        assert_eq!(session_expiry(now + Duration::hours(2), now), now + Duration::hours(2));
    }

    #[test]
    fn test_form_carries_booking_id_and_amount() {
        let now = Utc::now();
        let req = request(now + Duration::minutes(10));
        let form = StripeCheckoutGateway::form(&req, now);
        let get = |key: &str| form.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());

        assert_eq!(get("metadata[booking_id]"), Some(req.booking_id.to_string()));
        assert_eq!(get("payment_intent_data[metadata][booking_id]"), Some(req.booking_id.to_string()));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("2400".to_string()));
        assert_eq!(get("expires_at"), Some((now + Duration::minutes(30)).timestamp().to_string()));
    }
}
