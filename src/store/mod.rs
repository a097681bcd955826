//! Persistence for the catalog and the reservation core.
//!
//! [`BookingStore::commit`] is the only path that ever flips a seat to booked.
//! Each implementation makes the availability re-check, the seat flips and the
//! ledger append a single all-or-nothing unit.

pub mod gate;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;

use crate::error::BookingError;
use crate::models::{
    Booking, BookingId, Hall, HallId, Movie, MovieId, NewHall, NewMovie, NewShow, Seat, SeatId,
    ShowId, ShowListing, Theater, TheaterId,
};

pub use gate::ShowGate;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Largest row or column count a seat grid may have. Hall input is validated
/// against the same bound.
pub const MAX_GRID_DIMENSION: i32 = 100;

/// Checks grid dimensions and returns the seat count.
pub fn grid_size(rows: i32, columns: i32) -> Result<usize, BookingError> {
    let in_range = |n: i32| (1..=MAX_GRID_DIMENSION).contains(&n);
    if !in_range(rows) || !in_range(columns) {
        return Err(BookingError::Validation(format!(
            "seat grid must be between 1x1 and {max}x{max}, got {}x{}",
            rows,
            columns,
            max = MAX_GRID_DIMENSION
        )));
    }
    Ok(rows as usize * columns as usize)
}

/// Result of checking a seat request against the current seat map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub all_free: bool,
    /// Requested seats that are booked, missing, or belong to another show.
    pub unavailable: Vec<SeatId>,
}

impl Availability {
    /// `free` holds the requested seats of the show that are currently unbooked.
    pub fn evaluate(requested: &[SeatId], free: &HashSet<SeatId>) -> Self {
        let unavailable: Vec<SeatId> = requested
            .iter()
            .copied()
            .filter(|id| !free.contains(id))
            .collect();
        Self {
            all_free: unavailable.is_empty(),
            unavailable,
        }
    }

    pub fn into_result(self) -> Result<(), BookingError> {
        if self.all_free {
            Ok(())
        } else {
            Err(BookingError::SeatUnavailable(self.unavailable))
        }
    }
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /* ---------- catalog ---------- */

    async fn create_theater(&self, name: &str) -> Result<TheaterId, BookingError>;
    async fn create_hall(&self, hall: &NewHall) -> Result<HallId, BookingError>;
    async fn create_movie(&self, movie: &NewMovie) -> Result<MovieId, BookingError>;
    /// Creates the show row only; seats come from [`BookingStore::create_show_seat_grid`].
    async fn create_show(&self, show: &NewShow) -> Result<ShowId, BookingError>;
    /// Creates the show and its seat grid, sized from the hall, as one unit.
    /// Either both exist afterwards or neither does.
    async fn create_show_with_grid(&self, show: &NewShow) -> Result<(ShowId, u64), BookingError>;

    async fn list_theaters(&self) -> Result<Vec<Theater>, BookingError>;
    async fn list_halls(&self) -> Result<Vec<Hall>, BookingError>;
    async fn list_movies(&self) -> Result<Vec<Movie>, BookingError>;
    async fn list_shows(&self) -> Result<Vec<ShowListing>, BookingError>;
    async fn find_show(&self, show_id: ShowId) -> Result<Option<ShowListing>, BookingError>;
    async fn find_hall(&self, hall_id: HallId) -> Result<Option<Hall>, BookingError>;

    /* ---------- seats ---------- */

    /// Populates a `rows x columns` grid of free seats. Fails if the show already has seats.
    async fn create_show_seat_grid(
        &self,
        show_id: ShowId,
        rows: i32,
        columns: i32,
    ) -> Result<u64, BookingError>;

    /// Seats of the show ordered by `(row_index, col_index)`.
    async fn list_seats(&self, show_id: ShowId) -> Result<Vec<Seat>, BookingError>;

    /// Read-only. Only trustworthy for display; `commit` re-checks on its own.
    async fn check_available(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
    ) -> Result<Availability, BookingError>;

    /* ---------- reservations ---------- */

    /// Books every seat in `seat_ids` and appends the ledger entry, or changes nothing.
    async fn commit(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
        customer: &str,
    ) -> Result<BookingId, BookingError>;

    async fn find_booking(&self, booking_id: BookingId) -> Result<Option<Booking>, BookingError>;

    /// Committed bookings of the show in ledger order.
    async fn list_show_bookings(&self, show_id: ShowId) -> Result<Vec<Booking>, BookingError>;
}
