use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use marquee_catalog::{MovieSchedule, ShowInput};
use marquee_core::catalog::{Movie, MovieSummary};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddShowRequest {
    pub movie_id: String,
    pub shows_input: Vec<ShowInput>,
    /// Per seat, in minor currency units.
    pub show_price: i64,
}

#[derive(Debug, Serialize)]
pub struct MoviesResponse {
    pub success: bool,
    pub shows: Vec<Movie>,
}

#[derive(Debug, Serialize)]
pub struct NowPlayingResponse {
    pub success: bool,
    pub movies: Vec<MovieSummary>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub success: bool,
    #[serde(flatten)]
    pub schedule: MovieSchedule,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/api/show/now-playing", get(now_playing))
        .route("/api/show/add", post(add_shows))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware));

    Router::new()
        .route("/api/show/all", get(upcoming_movies))
        .route("/api/show/{movie_id}", get(movie_schedule))
        .merge(admin)
}

/// GET /api/show/all
async fn upcoming_movies(State(state): State<AppState>) -> ApiResult<Json<MoviesResponse>> {
    let shows = state.listing.upcoming_movies(Utc::now()).await?;
    Ok(Json(MoviesResponse { success: true, shows }))
}

/// GET /api/show/{movie_id}
async fn movie_schedule(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> ApiResult<Json<ScheduleResponse>> {
    let schedule = state.listing.movie_schedule(&movie_id, Utc::now()).await?;
    Ok(Json(ScheduleResponse { success: true, schedule }))
}

/// GET /api/show/now-playing
async fn now_playing(State(state): State<AppState>) -> ApiResult<Json<NowPlayingResponse>> {
    let movies = state.catalog.now_playing().await?;
    Ok(Json(NowPlayingResponse { success: true, movies }))
}

/// POST /api/show/add
async fn add_shows(State(state): State<AppState>, Json(req): Json<AddShowRequest>) -> ApiResult<Json<Value>> {
    let created = state
        .planner
        .add_shows(&req.movie_id, &req.shows_input, req.show_price)
        .await?;
    tracing::info!(movie_id = %req.movie_id, "Admin added {} shows", created.len());

    Ok(Json(json!({
        "success": true,
        "message": "Show added successfully.",
        "created": created.len(),
    })))
}
