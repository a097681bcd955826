use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::{BookingId, SeatId, ShowId};

/// Every way a request against the booking core can fail.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("show {0} not found")]
    ShowNotFound(ShowId),

    #[error("seats unavailable: {0:?}")]
    SeatUnavailable(Vec<SeatId>),

    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("timed out after {0:?} waiting for the show lock")]
    LockTimeout(Duration),

    #[error("in-memory store lock poisoned")]
    Poisoned,

    #[error("commit task did not finish: {0}")]
    Interrupted(String),

    #[error("store inconsistency: {0}")]
    Inconsistent(String),
}

impl From<sqlx::Error> for BookingError {
    fn from(e: sqlx::Error) -> Self {
        BookingError::Storage(StorageError::from(e))
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(e: validator::ValidationErrors) -> Self {
        BookingError::Validation(e.to_string())
    }
}

// Malformed or mistyped JSON bodies are the caller's fault like any other bad input
impl From<JsonRejection> for BookingError {
    fn from(rejection: JsonRejection) -> Self {
        BookingError::Validation(rejection.body_text())
    }
}

impl BookingError {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation_error",
            BookingError::ShowNotFound(_) => "show_not_found",
            BookingError::SeatUnavailable(_) => "seat_unavailable",
            BookingError::BookingNotFound(_) => "booking_not_found",
            BookingError::Storage(_) => "storage_failure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::ShowNotFound(_) | BookingError::BookingNotFound(_) => StatusCode::NOT_FOUND,
            BookingError::SeatUnavailable(_) => StatusCode::CONFLICT,
            BookingError::Storage(StorageError::LockTimeout(_)) => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seat_ids: Option<Vec<SeatId>>,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let BookingError::Storage(ref e) = self {
            tracing::error!("storage failure surfaced to caller: {}", e);
        }

        // storage internals stay in the logs
        let message = match &self {
            BookingError::Storage(StorageError::LockTimeout(_)) => {
                "Show is busy, please retry".to_string()
            }
            BookingError::Storage(_) => "Booking state could not be stored, please retry".to_string(),
            other => other.to_string(),
        };
        let seat_ids = match &self {
            BookingError::SeatUnavailable(ids) => Some(ids.clone()),
            _ => None,
        };

        let body = ErrorBody {
            error: self.kind(),
            message,
            seat_ids,
        };
        (status, Json(body)).into_response()
    }
}
