use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{grid_size, Availability, BookingStore};
use crate::error::{BookingError, StorageError};
use crate::models::{
    Booking, BookingId, Hall, HallId, Movie, MovieId, NewHall, NewMovie, NewShow, Seat, SeatId,
    Show, ShowId, ShowListing, Theater, TheaterId,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    theaters: BTreeMap<TheaterId, Theater>,
    halls: BTreeMap<HallId, Hall>,
    movies: BTreeMap<MovieId, Movie>,
    shows: BTreeMap<ShowId, Show>,
    seats: HashMap<SeatId, Seat>,
    // seat ids per show, kept in (row, col) order
    show_seats: HashMap<ShowId, Vec<SeatId>>,
    bookings: HashMap<BookingId, Booking>,
    ledger: Vec<BookingId>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn availability(&self, show_id: ShowId, seat_ids: &[SeatId]) -> Availability {
        let free: HashSet<SeatId> = seat_ids
            .iter()
            .filter_map(|id| self.seats.get(id))
            .filter(|seat| seat.show_id == show_id && !seat.booked)
            .map(|seat| seat.id)
            .collect();
        Availability::evaluate(seat_ids, &free)
    }

    fn insert_show(&mut self, show: &NewShow) -> Result<ShowId, BookingError> {
        if !self.movies.contains_key(&show.movie_id) {
            return Err(BookingError::Validation(format!(
                "movie {} does not exist",
                show.movie_id
            )));
        }
        if !self.halls.contains_key(&show.hall_id) {
            return Err(BookingError::Validation(format!(
                "hall {} does not exist",
                show.hall_id
            )));
        }
        let id = self.next_id();
        self.shows.insert(
            id,
            Show {
                id,
                movie_id: show.movie_id,
                hall_id: show.hall_id,
                starts_at: show.starts_at,
            },
        );
        Ok(id)
    }

    // caller has checked the dimensions with grid_size
    fn insert_grid(&mut self, show_id: ShowId, rows: i32, columns: i32, capacity: usize) -> u64 {
        let mut ids = Vec::with_capacity(capacity);
        for row_index in 1..=rows {
            for col_index in 1..=columns {
                let id = self.next_id();
                self.seats.insert(
                    id,
                    Seat {
                        id,
                        show_id,
                        row_index,
                        col_index,
                        booked: false,
                    },
                );
                ids.push(id);
            }
        }
        let created = ids.len() as u64;
        self.show_seats.insert(show_id, ids);
        created
    }

    fn listing(&self, show: &Show) -> Option<ShowListing> {
        let movie = self.movies.get(&show.movie_id)?;
        let hall = self.halls.get(&show.hall_id)?;
        let theater = self.theaters.get(&hall.theater_id)?;
        Some(ShowListing {
            id: show.id,
            movie_id: movie.id,
            title: movie.title.clone(),
            price: movie.price,
            hall_id: hall.id,
            hall_name: hall.name.clone(),
            theater_name: theater.name.clone(),
            starts_at: show.starts_at,
        })
    }
}

/// Process-local store. Each operation takes the table lock once and never
/// holds it across an await point.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables.write().map_err(|_| StorageError::Poisoned)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn create_theater(&self, name: &str) -> Result<TheaterId, BookingError> {
        let mut t = self.write()?;
        let id = t.next_id();
        t.theaters.insert(
            id,
            Theater {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    async fn create_hall(&self, hall: &NewHall) -> Result<HallId, BookingError> {
        let mut t = self.write()?;
        if !t.theaters.contains_key(&hall.theater_id) {
            return Err(BookingError::Validation(format!(
                "theater {} does not exist",
                hall.theater_id
            )));
        }
        let id = t.next_id();
        t.halls.insert(
            id,
            Hall {
                id,
                theater_id: hall.theater_id,
                name: hall.name.clone(),
                rows: hall.rows,
                seats_per_row: hall.seats_per_row,
            },
        );
        Ok(id)
    }

    async fn create_movie(&self, movie: &NewMovie) -> Result<MovieId, BookingError> {
        let mut t = self.write()?;
        let id = t.next_id();
        t.movies.insert(
            id,
            Movie {
                id,
                title: movie.title.clone(),
                price: movie.price,
            },
        );
        Ok(id)
    }

    async fn create_show(&self, show: &NewShow) -> Result<ShowId, BookingError> {
        self.write()?.insert_show(show)
    }

    async fn create_show_with_grid(&self, show: &NewShow) -> Result<(ShowId, u64), BookingError> {
        let mut t = self.write()?;
        let (rows, columns) = match t.halls.get(&show.hall_id) {
            Some(hall) => (hall.rows, hall.seats_per_row),
            None => {
                return Err(BookingError::Validation(format!(
                    "hall {} does not exist",
                    show.hall_id
                )))
            }
        };
        // everything that can fail runs before the first insert
        let capacity = grid_size(rows, columns)?;
        let show_id = t.insert_show(show)?;
        let created = t.insert_grid(show_id, rows, columns, capacity);
        Ok((show_id, created))
    }

    async fn list_theaters(&self) -> Result<Vec<Theater>, BookingError> {
        Ok(self.read()?.theaters.values().cloned().collect())
    }

    async fn list_halls(&self) -> Result<Vec<Hall>, BookingError> {
        Ok(self.read()?.halls.values().cloned().collect())
    }

    async fn list_movies(&self) -> Result<Vec<Movie>, BookingError> {
        Ok(self.read()?.movies.values().cloned().collect())
    }

    async fn list_shows(&self) -> Result<Vec<ShowListing>, BookingError> {
        let t = self.read()?;
        Ok(t.shows.values().filter_map(|s| t.listing(s)).collect())
    }

    async fn find_show(&self, show_id: ShowId) -> Result<Option<ShowListing>, BookingError> {
        let t = self.read()?;
        Ok(t.shows.get(&show_id).and_then(|s| t.listing(s)))
    }

    async fn find_hall(&self, hall_id: HallId) -> Result<Option<Hall>, BookingError> {
        Ok(self.read()?.halls.get(&hall_id).cloned())
    }

    async fn create_show_seat_grid(
        &self,
        show_id: ShowId,
        rows: i32,
        columns: i32,
    ) -> Result<u64, BookingError> {
        let capacity = grid_size(rows, columns)?;

        let mut t = self.write()?;
        if !t.shows.contains_key(&show_id) {
            return Err(BookingError::ShowNotFound(show_id));
        }
        if t.show_seats.get(&show_id).is_some_and(|ids| !ids.is_empty()) {
            return Err(BookingError::Validation(format!(
                "show {} already has a seat grid",
                show_id
            )));
        }

        Ok(t.insert_grid(show_id, rows, columns, capacity))
    }

    async fn list_seats(&self, show_id: ShowId) -> Result<Vec<Seat>, BookingError> {
        let t = self.read()?;
        if !t.shows.contains_key(&show_id) {
            return Err(BookingError::ShowNotFound(show_id));
        }
        let seats = t
            .show_seats
            .get(&show_id)
            .map(|ids| ids.iter().filter_map(|id| t.seats.get(id)).cloned().collect())
            .unwrap_or_default();
        Ok(seats)
    }

    async fn check_available(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
    ) -> Result<Availability, BookingError> {
        let t = self.read()?;
        if !t.shows.contains_key(&show_id) {
            return Err(BookingError::ShowNotFound(show_id));
        }
        Ok(t.availability(show_id, seat_ids))
    }

    async fn commit(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
        customer: &str,
    ) -> Result<BookingId, BookingError> {
        if seat_ids.is_empty() {
            return Err(BookingError::Validation("no seats requested".to_string()));
        }

        // check, flip and append under one write guard
        let mut t = self.write()?;
        if !t.shows.contains_key(&show_id) {
            return Err(BookingError::ShowNotFound(show_id));
        }
        t.availability(show_id, seat_ids).into_result()?;

        let booking = Booking {
            id: Uuid::new_v4(),
            show_id,
            seat_ids: seat_ids.to_vec(),
            customer: customer.to_string(),
            created_at: Utc::now(),
        };
        for seat_id in seat_ids {
            if let Some(seat) = t.seats.get_mut(seat_id) {
                seat.booked = true;
            }
        }
        let id = booking.id;
        t.ledger.push(id);
        t.bookings.insert(id, booking);
        Ok(id)
    }

    async fn find_booking(&self, booking_id: BookingId) -> Result<Option<Booking>, BookingError> {
        Ok(self.read()?.bookings.get(&booking_id).cloned())
    }

    async fn list_show_bookings(&self, show_id: ShowId) -> Result<Vec<Booking>, BookingError> {
        let t = self.read()?;
        if !t.shows.contains_key(&show_id) {
            return Err(BookingError::ShowNotFound(show_id));
        }
        Ok(t.ledger
            .iter()
            .filter_map(|id| t.bookings.get(id))
            .filter(|b| b.show_id == show_id)
            .cloned()
            .collect())
    }
}
