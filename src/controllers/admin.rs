use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::ApiJson;
use crate::error::BookingError;
use crate::models::{NewHall, NewMovie, NewShow, NewTheater};
use crate::services::catalog;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin", get(overview))
        .route("/admin/theaters", post(create_theater))
        .route("/admin/halls", post(create_hall))
        .route("/admin/movies", post(create_movie))
        .route("/admin/shows", post(create_show))
        .route("/admin/sample", post(create_sample))
}

// GET /api/admin
async fn overview(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, BookingError> {
    let store = state.booking.store();
    let theaters = store.list_theaters().await?;
    let halls = store.list_halls().await?;
    let movies = store.list_movies().await?;
    Ok(Json(json!({
        "theaters": theaters,
        "halls": halls,
        "movies": movies,
    })))
}

// POST /api/admin/theaters
async fn create_theater(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<NewTheater>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;
    let id = state.booking.store().create_theater(req.name.trim()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

// POST /api/admin/halls
async fn create_hall(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<NewHall>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;
    let id = state.booking.store().create_hall(&req).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

// POST /api/admin/movies
async fn create_movie(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<NewMovie>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;
    let id = state.booking.store().create_movie(&req).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

// POST /api/admin/shows
async fn create_show(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<NewShow>,
) -> Result<impl IntoResponse, BookingError> {
    let (id, seats) = catalog::schedule_show(&state.booking, &req).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id, "seats": seats }))))
}

// POST /api/admin/sample
async fn create_sample(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, BookingError> {
    tracing::warn!("Creating sample catalog data");
    let summary = catalog::create_sample_data(&state.booking).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}
