//! Booking service: request validation, the per-show concurrency gate and the
//! read paths that confirmation and seat-map pages use.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use crate::cache::SeatMapCache;
use crate::config::BookingConfig;
use crate::error::{BookingError, StorageError};
use crate::models::{
    BookedSeat, Booking, BookingDetails, BookingId, Seat, SeatId, ShowId,
};
use crate::store::{Availability, BookingStore, ShowGate};

pub const DEFAULT_CUSTOMER: &str = "Guest";
pub const MAX_CUSTOMER_LEN: usize = 100;

/// A validated booking request: distinct seats in request order and a clean label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatSelection {
    pub seat_ids: Vec<SeatId>,
    pub customer: String,
}

impl SeatSelection {
    pub fn new(
        seat_ids: &[SeatId],
        customer: Option<&str>,
        limits: &BookingConfig,
    ) -> Result<Self, BookingError> {
        let mut seen = HashSet::with_capacity(seat_ids.len());
        let seat_ids: Vec<SeatId> = seat_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if seat_ids.is_empty() {
            return Err(BookingError::Validation("at least one seat must be selected".to_string()));
        }
        if seat_ids.len() > limits.max_seats_per_booking {
            return Err(BookingError::Validation(format!(
                "at most {} seats can be booked at once, got {}",
                limits.max_seats_per_booking,
                seat_ids.len()
            )));
        }

        let customer = customer.map(str::trim).unwrap_or_default();
        if customer.chars().count() > MAX_CUSTOMER_LEN {
            return Err(BookingError::Validation(format!(
                "customer name is longer than {} characters",
                MAX_CUSTOMER_LEN
            )));
        }
        let customer = if customer.is_empty() {
            DEFAULT_CUSTOMER.to_string()
        } else {
            customer.to_string()
        };

        Ok(Self { seat_ids, customer })
    }
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    gate: Arc<ShowGate>,
    cache: SeatMapCache,
    limits: BookingConfig,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, cache: SeatMapCache, limits: BookingConfig) -> Self {
        let gate = Arc::new(ShowGate::new(limits.lock_wait()));
        Self {
            store,
            gate,
            cache,
            limits,
        }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    pub fn gate(&self) -> &ShowGate {
        &self.gate
    }

    pub fn limits(&self) -> &BookingConfig {
        &self.limits
    }

    /// Seats of the show ordered by row, then column.
    pub async fn list_seats(&self, show_id: ShowId) -> Result<Vec<Seat>, BookingError> {
        if let Some(seats) = self.cache.get_seats(show_id).await {
            return Ok(seats);
        }
        // taken before the store read, so a commit landing in between wins
        let generation = self.cache.generation(show_id).await;
        let seats = self.store.list_seats(show_id).await?;
        if let Some(generation) = generation {
            self.cache.put_seats(show_id, &seats, generation).await;
        }
        Ok(seats)
    }

    pub async fn check_available(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
    ) -> Result<Availability, BookingError> {
        let selection = SeatSelection::new(seat_ids, None, &self.limits)?;
        self.store.check_available(show_id, &selection.seat_ids).await
    }

    /// Reserves every requested seat for `customer` or none of them.
    pub async fn book(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
        customer: Option<&str>,
    ) -> Result<BookingId, BookingError> {
        let selection = SeatSelection::new(seat_ids, customer, &self.limits)?;
        let span = tracing::info_span!("book", show_id, seats = selection.seat_ids.len());

        async move {
            let permit = self.gate.enter(show_id).await?;

            // The commit task owns the permit, so a dropped request neither
            // cancels the commit nor lets the next request in early.
            let store = self.store.clone();
            let cache = self.cache.clone();
            let seats = selection.seat_ids.clone();
            let customer = selection.customer.clone();
            let result = tokio::spawn(
                async move {
                    let result = store.commit(show_id, &seats, &customer).await;
                    drop(permit);
                    if result.is_ok() {
                        cache.invalidate(show_id).await;
                    }
                    result
                }
                .in_current_span(),
            )
            .await
            .unwrap_or_else(|e| Err(StorageError::Interrupted(e.to_string()).into()));

            match result {
                Ok(booking_id) => {
                    info!(
                        "booked {} seats for {} as {}",
                        selection.seat_ids.len(),
                        selection.customer,
                        booking_id
                    );
                    Ok(booking_id)
                }
                Err(BookingError::SeatUnavailable(ids)) => {
                    warn!("seats unavailable: {:?}", ids);
                    Err(BookingError::SeatUnavailable(ids))
                }
                Err(e @ BookingError::Storage(_)) => {
                    error!("booking commit failed: {}", e);
                    Err(e)
                }
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    pub async fn get_booking_details(&self, booking_id: BookingId) -> Result<BookingDetails, BookingError> {
        let booking = self.get_booking(booking_id).await?;
        let show = self
            .store
            .find_show(booking.show_id)
            .await?
            .ok_or(BookingError::ShowNotFound(booking.show_id))?;

        // straight from the store, a cached map may predate this booking
        let seats = self.store.list_seats(booking.show_id).await?;
        let booked: Vec<BookedSeat> = booking
            .seat_ids
            .iter()
            .filter_map(|id| seats.iter().find(|s| s.id == *id))
            .map(|s| BookedSeat {
                id: s.id,
                row_index: s.row_index,
                col_index: s.col_index,
                label: s.label(),
            })
            .collect();

        if booked.len() != booking.seat_ids.len() {
            return Err(StorageError::Inconsistent(format!(
                "booking {} references seats missing from show {}",
                booking.id, booking.show_id
            ))
            .into());
        }

        let total = show.price * booked.len() as i64;
        Ok(BookingDetails {
            booking_id: booking.id,
            show_id: booking.show_id,
            movie_title: show.title,
            hall_name: show.hall_name,
            starts_at: show.starts_at,
            seats: booked,
            customer: booking.customer,
            price_per_seat: show.price,
            total,
            created_at: booking.created_at,
        })
    }

    pub async fn list_show_bookings(&self, show_id: ShowId) -> Result<Vec<Booking>, BookingError> {
        self.store.list_show_bookings(show_id).await
    }

    /// Setup path for a new show. Not part of the booking hot path.
    pub async fn create_show_seat_grid(
        &self,
        show_id: ShowId,
        rows: i32,
        columns: i32,
    ) -> Result<u64, BookingError> {
        let created = self.store.create_show_seat_grid(show_id, rows, columns).await?;
        self.cache.invalidate(show_id).await;
        info!("show {}: seat grid {}x{} ready", show_id, rows, columns);
        Ok(created)
    }
}
