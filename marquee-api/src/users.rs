use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use marquee_core::booking::Booking;
use marquee_core::catalog::Movie;
use marquee_core::identity::Caller;
use marquee_core::show::Show;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{ApiResult, AppError};
use crate::middleware::user_auth_middleware;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserBooking {
    #[serde(flatten)]
    pub booking: Booking,
    pub show: Option<Show>,
    pub movie: Option<Movie>,
}

#[derive(Debug, Serialize)]
pub struct UserBookingsResponse {
    pub success: bool,
    pub bookings: Vec<UserBooking>,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub movie_id: String,
}

#[derive(Debug, Serialize)]
pub struct FavoriteToggleResponse {
    pub success: bool,
    pub message: String,
    pub favorites: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub success: bool,
    pub movies: Vec<Movie>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/user/bookings", get(user_bookings))
        .route("/api/user/update-favorite", post(update_favorite))
        .route("/api/user/favorites", get(favorites))
        .route_layer(axum::middleware::from_fn_with_state(state, user_auth_middleware))
}

/// GET /api/user/bookings
async fn user_bookings(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<UserBookingsResponse>> {
    let bookings = state.ledger.list_for_holder(&caller.user_id).await?;

    let mut shows: HashMap<_, Show> = HashMap::new();
    for show_id in bookings.iter().map(|b| b.show_id).collect::<HashSet<_>>() {
        if let Some(show) = state.shows.get_show(show_id).await? {
            shows.insert(show_id, show);
        }
    }
    let movie_ids: Vec<String> = shows
        .values()
        .map(|s| s.movie_id.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let movies: HashMap<String, Movie> = state
        .movies
        .get_movies(&movie_ids)
        .await?
        .into_iter()
        .map(|m| (m.id.clone(), m))
        .collect();

    let bookings = bookings
        .into_iter()
        .map(|booking| {
            let show = shows.get(&booking.show_id).cloned();
            let movie = show.as_ref().and_then(|s| movies.get(&s.movie_id).cloned());
            UserBooking { booking, show, movie }
        })
        .collect();

    Ok(Json(UserBookingsResponse { success: true, bookings }))
}

/// POST /api/user/update-favorite
async fn update_favorite(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<FavoriteRequest>,
) -> ApiResult<Json<FavoriteToggleResponse>> {
    let movie_id = req.movie_id.trim();
    if movie_id.is_empty() {
        return Err(AppError::ValidationError("movie_id is required".to_string()));
    }

    let favorites = state.users.toggle_favorite(&caller.user_id, movie_id).await?;
    let message = if favorites.iter().any(|f| f == movie_id) {
        "Favorite added successfully"
    } else {
        "Favorite removed successfully"
    };

    Ok(Json(FavoriteToggleResponse {
        success: true,
        message: message.to_string(),
        favorites,
    }))
}

/// GET /api/user/favorites
async fn favorites(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<FavoritesResponse>> {
    let Some(user) = state.users.get(&caller.user_id).await? else {
        return Ok(Json(FavoritesResponse { success: true, movies: Vec::new() }));
    };
    let movies = state.movies.get_movies(&user.favorites).await?;
    Ok(Json(FavoritesResponse { success: true, movies }))
}
