use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use marquee_catalog::{AdminBooking, AdminShow, DashboardSummary};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub dashboard_data: DashboardSummary,
}

#[derive(Debug, Serialize)]
pub struct AdminShowsResponse {
    pub success: bool,
    pub shows: Vec<AdminShow>,
}

#[derive(Debug, Serialize)]
pub struct AdminBookingsResponse {
    pub success: bool,
    pub bookings: Vec<AdminBooking>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/is-admin", get(is_admin))
        .route("/api/admin/dashboard", get(dashboard))
        .route("/api/admin/all-shows", get(all_shows))
        .route("/api/admin/all-bookings", get(all_bookings))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

/// GET /api/admin/is-admin. Reaching the handler means the middleware passed.
async fn is_admin() -> Json<Value> {
    Json(json!({ "success": true, "isAdmin": true }))
}

/// GET /api/admin/dashboard
async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardResponse>> {
    let dashboard_data = state.dashboard.summary(Utc::now()).await?;
    Ok(Json(DashboardResponse { success: true, dashboard_data }))
}

/// GET /api/admin/all-shows
async fn all_shows(State(state): State<AppState>) -> ApiResult<Json<AdminShowsResponse>> {
    let shows = state.dashboard.all_shows(Utc::now()).await?;
    Ok(Json(AdminShowsResponse { success: true, shows }))
}

/// GET /api/admin/all-bookings
async fn all_bookings(State(state): State<AppState>) -> ApiResult<Json<AdminBookingsResponse>> {
    let bookings = state.dashboard.all_bookings().await?;
    Ok(Json(AdminBookingsResponse { success: true, bookings }))
}
