use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookingId, SeatId, ShowId};

/// Ledger entry for one committed reservation. Never updated after commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: BookingId,
    pub show_id: ShowId,
    pub seat_ids: Vec<SeatId>,
    pub customer: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookedSeat {
    pub id: SeatId,
    pub row_index: i32,
    pub col_index: i32,
    pub label: String,
}

// Everything a confirmation page needs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingDetails {
    pub booking_id: BookingId,
    pub show_id: ShowId,
    pub movie_title: String,
    pub hall_name: String,
    pub starts_at: NaiveDateTime,
    pub seats: Vec<BookedSeat>,
    pub customer: String,
    pub price_per_seat: i64,
    pub total: i64,
    pub created_at: DateTime<Utc>,
}
