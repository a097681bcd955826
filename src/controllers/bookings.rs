use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::ApiJson;
use crate::error::BookingError;
use crate::models::{BookingId, SeatId, ShowId};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shows/{show_id}/seats", get(get_seats))
        .route("/shows/{show_id}/availability", post(check_availability))
        .route(
            "/shows/{show_id}/bookings",
            post(create_booking).get(get_show_bookings),
        )
        .route("/bookings/{booking_id}", get(get_booking))
}

/* ---------- request parsing ---------- */

#[derive(Debug, Deserialize, Validate)]
pub struct BookingRequest {
    #[serde(default)]
    pub seat_ids: Vec<SeatId>,
    // keep in step with MAX_CUSTOMER_LEN
    #[validate(length(max = 100))]
    pub customer: Option<String>,
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

// Seat-map forms post one `seats` field per ticked checkbox
fn parse_form(body: &[u8]) -> Result<BookingRequest, BookingError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| BookingError::Validation(format!("malformed form body: {}", e)))?;

    let mut req = BookingRequest {
        seat_ids: Vec::new(),
        customer: None,
    };
    for (key, value) in pairs {
        match key.as_str() {
            "seats" | "seat_ids" => {
                let id = value.trim().parse::<SeatId>().map_err(|_| {
                    BookingError::Validation(format!("seat id {:?} is not a number", value))
                })?;
                req.seat_ids.push(id);
            }
            "customer" => req.customer = Some(value),
            _ => {}
        }
    }
    Ok(req)
}

pub fn parse_booking_request(headers: &HeaderMap, body: &[u8]) -> Result<BookingRequest, BookingError> {
    let req = if is_form(headers) {
        parse_form(body)?
    } else {
        serde_json::from_slice(body)
            .map_err(|e| BookingError::Validation(format!("malformed JSON body: {}", e)))?
    };
    req.validate()?;
    Ok(req)
}

/* ---------- SEATS ---------- */

// GET /api/shows/{show_id}/seats
#[derive(Debug, Serialize)]
struct SeatResponse {
    id: SeatId,
    row: i32,
    col: i32,
    label: String,
    booked: bool,
}

async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
) -> Result<impl IntoResponse, BookingError> {
    let seats = state.booking.list_seats(show_id).await?;
    let payload: Vec<SeatResponse> = seats
        .into_iter()
        .map(|s| SeatResponse {
            label: s.label(),
            id: s.id,
            row: s.row_index,
            col: s.col_index,
            booked: s.booked,
        })
        .collect();
    Ok(Json(payload))
}

// POST /api/shows/{show_id}/availability
#[derive(Debug, Deserialize)]
struct AvailabilityRequest {
    seat_ids: Vec<SeatId>,
}

async fn check_availability(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
    ApiJson(req): ApiJson<AvailabilityRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let availability = state.booking.check_available(show_id, &req.seat_ids).await?;
    Ok(Json(availability))
}

/* ---------- BOOKINGS ---------- */

#[derive(Debug, Serialize)]
struct BookingCreated {
    booking_id: BookingId,
    show_id: ShowId,
    confirmation: String,
}

// POST /api/shows/{show_id}/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, BookingError> {
    let req = parse_booking_request(&headers, &body)?;
    let booking_id = state
        .booking
        .book(show_id, &req.seat_ids, req.customer.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingCreated {
            booking_id,
            show_id,
            confirmation: format!("/api/bookings/{}", booking_id),
        }),
    ))
}

// GET /api/shows/{show_id}/bookings
async fn get_show_bookings(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
) -> Result<impl IntoResponse, BookingError> {
    let bookings = state.booking.list_show_bookings(show_id).await?;
    Ok(Json(bookings))
}

// GET /api/bookings/{booking_id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<BookingId>,
) -> Result<impl IntoResponse, BookingError> {
    let details = state.booking.get_booking_details(booking_id).await?;
    Ok(Json(details))
}
