use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use marquee_core::identity::Caller;
use marquee_core::show::ShowId;
use marquee_core::BookingError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::user_auth_middleware;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub show_id: ShowId,
    pub selected_seats: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    pub success: bool,
    pub booking_id: Uuid,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct OccupiedSeatsResponse {
    pub success: bool,
    pub occupied_seats: Vec<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/booking/create", post(create_booking))
        .route_layer(axum::middleware::from_fn_with_state(state, user_auth_middleware));

    Router::new()
        .route("/api/booking/seats/{show_id}", get(occupied_seats))
        .merge(protected)
}

/// POST /api/booking/create
async fn create_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<Json<CreateBookingResponse>> {
    let result = state
        .reservations
        .reserve(req.show_id, &req.selected_seats, &caller.user_id)
        .await;

    match &result {
        Ok(_) => state.metrics.reservations.inc(),
        Err(BookingError::SeatsTaken(_)) => state.metrics.seat_conflicts.inc(),
        Err(_) => {}
    }
    let reservation = result?;

    Ok(Json(CreateBookingResponse {
        success: true,
        booking_id: reservation.booking_id,
        url: reservation.payment_url,
    }))
}

/// GET /api/booking/seats/{show_id}
async fn occupied_seats(
    State(state): State<AppState>,
    Path(show_id): Path<ShowId>,
) -> ApiResult<Json<OccupiedSeatsResponse>> {
    let occupied = state.inventory.list_occupied(show_id).await?;
    Ok(Json(OccupiedSeatsResponse {
        success: true,
        occupied_seats: occupied.into_iter().map(String::from).collect(),
    }))
}
