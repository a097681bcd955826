pub mod admin;
pub mod bookings;
pub mod shows;

use axum::{extract::FromRequest, Router};
use std::sync::Arc;

use crate::error::BookingError;

/// `Json` whose rejections come back as a `validation_error` body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(BookingError))]
pub struct ApiJson<T>(pub T);

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(shows::routes())
        .merge(bookings::routes())
        .merge(admin::routes())
}
