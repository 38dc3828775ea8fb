use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marquee_core::BookingError;
use marquee_store::webhook::WebhookError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Booking(#[from] BookingError),
    #[error("{0}")]
    Webhook(#[from] WebhookError),
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, seats) = match self {
            AppError::Booking(BookingError::InvalidRequest(msg)) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Booking(BookingError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Booking(BookingError::SeatsTaken(labels)) => {
                let seats: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
                (StatusCode::CONFLICT, format!("Seats already taken: {}", seats.join(", ")), Some(seats))
            }
            AppError::Booking(BookingError::GatewayFailure(msg)) => {
                tracing::warn!("Upstream provider failure: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Payment provider unavailable, please try again".to_string(),
                    None,
                )
            }
            AppError::Booking(err @ (BookingError::InvalidTransition { .. } | BookingError::Storage(_))) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
            }
            AppError::Webhook(err) => {
                tracing::warn!("Rejected webhook: {}", err);
                (StatusCode::BAD_REQUEST, format!("Webhook Error: {}", err), None)
            }
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, None),
        };

        let mut body = json!({
            "success": false,
            "error": message,
        });
        if let Some(seats) = seats {
            body["seats"] = json!(seats);
        }

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, AppError>;
