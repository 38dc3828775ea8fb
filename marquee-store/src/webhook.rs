//! Signature verification and parsing for inbound provider webhooks.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use marquee_core::identity::UserEvent;
use marquee_core::payment::{PaymentEventKind, PaymentNotification};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook secret is not configured")]
    MissingSecret,
    #[error("missing signature header")]
    MissingSignature,
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("timestamp outside tolerance: {0}")]
    TimestampTolerance(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn mac(key: &[u8], parts: &[&[u8]]) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| WebhookError::InvalidSignature(format!("HMAC init error: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}

fn check_tolerance(timestamp: i64, now: i64, tolerance_seconds: i64) -> Result<(), WebhookError> {
    let drift = (now - timestamp).abs();
    if drift > tolerance_seconds {
        return Err(WebhookError::TimestampTolerance(format!(
            "timestamp {} is {}s from now (tolerance {}s)",
            timestamp, drift, tolerance_seconds
        )));
    }
    Ok(())
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, as Stripe signs it.
pub fn compute_stripe_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let prefix = format!("{}.", timestamp);
    let mac = mac(secret.as_bytes(), &[prefix.as_bytes(), payload])?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `Stripe-Signature: t=...,v1=...[,v1=...]` header against the raw body.
pub fn verify_stripe_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }
    let header = header.ok_or(WebhookError::MissingSignature)?;

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| WebhookError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignature("no v1 signature".to_string()));
    }
    check_tolerance(timestamp, now, tolerance_seconds)?;

    let expected = compute_stripe_signature(secret, timestamp, payload)?;
    if !signatures.iter().any(|sig| constant_time_eq(expected.as_bytes(), sig.as_bytes())) {
        return Err(WebhookError::InvalidSignature("signature mismatch".to_string()));
    }

    debug!(timestamp, "Stripe signature verified");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Value,
}

/// Reduces a verified Stripe event to what the booking flow needs.
///
/// A completed checkout only counts as a payment once `payment_status` is
/// `paid`; delayed methods settle later through `async_payment_succeeded`.
pub fn parse_payment_notification(payload: &[u8]) -> Result<PaymentNotification, WebhookError> {
    let event: StripeEvent =
        serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
    let object = &event.data.object;

    let kind = match event.event_type.as_str() {
        "checkout.session.completed" if object["payment_status"] == "paid" => PaymentEventKind::Succeeded,
        "checkout.session.async_payment_succeeded" | "payment_intent.succeeded" => PaymentEventKind::Succeeded,
        "checkout.session.expired" => PaymentEventKind::SessionExpired,
        _ => PaymentEventKind::Other,
    };

    let amount_cents = object["amount_total"]
        .as_i64()
        .or_else(|| object["amount_received"].as_i64());

    Ok(PaymentNotification {
        correlation_id: object["metadata"]["booking_id"].as_str().map(str::to_string),
        event_type: event.event_type,
        kind,
        amount_cents,
    })
}

/// Base64 HMAC-SHA256 of `"{id}.{timestamp}.{payload}"` keyed with the
/// decoded `whsec_` secret, the identity provider's signing scheme.
pub fn compute_identity_signature(secret: &str, msg_id: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let key = BASE64
        .decode(secret.trim_start_matches("whsec_"))
        .map_err(|e| WebhookError::InvalidSignature(format!("bad secret encoding: {}", e)))?;
    let prefix = format!("{}.{}.", msg_id, timestamp);
    let mac = mac(&key, &[prefix.as_bytes(), payload])?;
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Verifies the `webhook-id`/`webhook-timestamp`/`webhook-signature` triple.
/// The signature header is a space-separated list of `v1,<base64>` entries.
pub fn verify_identity_signature(
    payload: &[u8],
    msg_id: Option<&str>,
    timestamp: Option<&str>,
    signature: Option<&str>,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }
    let (Some(msg_id), Some(timestamp), Some(signature)) = (msg_id, timestamp, signature) else {
        return Err(WebhookError::MissingSignature);
    };
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::InvalidSignature("bad timestamp".to_string()))?;
    check_tolerance(timestamp, now, tolerance_seconds)?;

    let expected = compute_identity_signature(secret, msg_id, timestamp, payload)?;
    let matched = signature
        .split_whitespace()
        .filter_map(|entry| entry.strip_prefix("v1,"))
        .any(|sig| constant_time_eq(expected.as_bytes(), sig.as_bytes()));
    if !matched {
        return Err(WebhookError::InvalidSignature("signature mismatch".to_string()));
    }
    Ok(())
}

/// `Ok(None)` for event types the user mirror does not track.
pub fn parse_identity_event(payload: &[u8]) -> Result<Option<UserEvent>, WebhookError> {
    let raw: Value = serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
    match raw["type"].as_str() {
        Some("user.created" | "user.updated" | "user.deleted") => serde_json::from_value(raw)
            .map(Some)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string())),
        _ => Ok(None),
    }
}
