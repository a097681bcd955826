use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::ShowId;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/shows", get(list_shows))
        .route("/shows/{show_id}", get(get_show))
}

// GET /api/movies
async fn list_movies(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, BookingError> {
    let movies = state.booking.store().list_movies().await?;
    Ok(Json(movies))
}

// GET /api/shows
async fn list_shows(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, BookingError> {
    let shows = state.booking.store().list_shows().await?;
    Ok(Json(shows))
}

// GET /api/shows/{show_id}
async fn get_show(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
) -> Result<impl IntoResponse, BookingError> {
    let show = state
        .booking
        .store()
        .find_show(show_id)
        .await?
        .ok_or(BookingError::ShowNotFound(show_id))?;
    Ok(Json(show))
}
