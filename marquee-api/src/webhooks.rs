use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use marquee_booking::NotificationOutcome;
use marquee_core::jobs::Job;
use marquee_core::BookingError;
use marquee_store::webhook;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/stripe", post(stripe_webhook))
        .route("/api/webhooks/identity", post(identity_webhook))
}

fn header<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
}

fn received() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "received": true })))
}

/// POST /api/stripe
///
/// Takes the raw body: the signature covers the exact bytes Stripe sent.
async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    webhook::verify_stripe_signature(
        &body,
        header(&headers, &["stripe-signature"]),
        &state.webhooks.stripe,
        state.webhooks.tolerance_seconds,
        Utc::now().timestamp(),
    )?;
    let notification = webhook::parse_payment_notification(&body)?;
    tracing::info!(event_type = %notification.event_type, "Stripe webhook received");

    match state.orchestrator.handle_notification(&notification).await {
        Ok(outcome) => {
            state.metrics.observe_notification(&outcome);
            if outcome == NotificationOutcome::Ignored {
                tracing::debug!("Unhandled event type: {}", notification.event_type);
            }
            Ok(received())
        }
        // No such booking will ever appear; retrying would not help.
        Err(BookingError::NotFound(what)) => {
            tracing::warn!(event_type = %notification.event_type, "Webhook for unknown {}", what);
            Ok(received())
        }
        // Anything else is transient: a 5xx makes Stripe redeliver.
        Err(e) => Err(e.into()),
    }
}

/// POST /api/webhooks/identity
async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    webhook::verify_identity_signature(
        &body,
        header(&headers, &["svix-id", "webhook-id"]),
        header(&headers, &["svix-timestamp", "webhook-timestamp"]),
        header(&headers, &["svix-signature", "webhook-signature"]),
        &state.webhooks.identity,
        state.webhooks.tolerance_seconds,
        Utc::now().timestamp(),
    )?;

    let Some(event) = webhook::parse_identity_event(&body)? else {
        return Ok(received());
    };
    let job_id = state.jobs.run_now(Job::SyncUser(event)).await?;
    tracing::info!(job_id = %job_id, "User sync queued");
    Ok(received())
}
