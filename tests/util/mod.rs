#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use showtime_booking::cache::SeatMapCache;
use showtime_booking::config::BookingConfig;
use showtime_booking::error::BookingError;
use showtime_booking::models::{
    Booking, BookingId, Hall, HallId, Movie, MovieId, NewHall, NewMovie, NewShow, Seat, SeatId,
    ShowId, ShowListing, Theater, TheaterId,
};
use showtime_booking::services::BookingService;
use showtime_booking::store::{Availability, BookingStore, MemoryStore};

pub const TICKET_PRICE: i64 = 1_250;

pub struct Fixture {
    pub service: BookingService,
    pub show_id: ShowId,
    /// Seat ids keyed by label, e.g. "A1".
    pub seats: HashMap<String, SeatId>,
}

impl Fixture {
    pub fn seat(&self, label: &str) -> SeatId {
        self.seats[label]
    }
}

pub fn limits() -> BookingConfig {
    BookingConfig {
        max_seats_per_booking: 10,
        lock_wait_ms: 5_000,
    }
}

pub async fn memory_fixture(rows: i32, cols: i32) -> Fixture {
    fixture_on(Arc::new(MemoryStore::new()), rows, cols).await
}

pub async fn fixture_on(store: Arc<dyn BookingStore>, rows: i32, cols: i32) -> Fixture {
    fixture_with_limits(store, rows, cols, limits()).await
}

/// Builds a theater, hall, movie and one show with a fresh seat grid on `store`.
pub async fn fixture_with_limits(
    store: Arc<dyn BookingStore>,
    rows: i32,
    cols: i32,
    limits: BookingConfig,
) -> Fixture {
    let service = BookingService::new(store.clone(), SeatMapCache::disabled(), limits);

    let theater = store.create_theater("Rialto").await.unwrap();
    let hall = store
        .create_hall(&NewHall {
            theater_id: theater,
            name: "Main".into(),
            rows,
            seats_per_row: cols,
        })
        .await
        .unwrap();
    let movie = store
        .create_movie(&NewMovie {
            title: "Alien".into(),
            price: TICKET_PRICE,
        })
        .await
        .unwrap();
    let show_id = store
        .create_show(&NewShow {
            movie_id: movie,
            hall_id: hall,
            starts_at: NaiveDate::from_ymd_opt(2026, 11, 20)
                .unwrap()
                .and_hms_opt(21, 15, 0)
                .unwrap(),
        })
        .await
        .unwrap();
    service.create_show_seat_grid(show_id, rows, cols).await.unwrap();

    let seats = service
        .list_seats(show_id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.label(), s.id))
        .collect();

    Fixture {
        service,
        show_id,
        seats,
    }
}

pub async fn booked_seats(service: &BookingService, show_id: ShowId) -> HashSet<SeatId> {
    service
        .list_seats(show_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.booked)
        .map(|s| s.id)
        .collect()
}

/// Booked seats equal the union of ledger seat sets, and those sets are pairwise disjoint.
pub async fn assert_ledger_matches_seats(service: &BookingService, show_id: ShowId) {
    let ledger = service.list_show_bookings(show_id).await.unwrap();
    let mut union = HashSet::new();
    for booking in &ledger {
        for seat in &booking.seat_ids {
            assert!(
                union.insert(*seat),
                "seat {} appears in more than one booking",
                seat
            );
        }
    }
    assert_eq!(union, booked_seats(service, show_id).await);
}

/// In-memory store whose commits take `delay` and which records how many
/// commits ran at the same time.
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak_concurrent_commits(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookingStore for SlowStore {
    async fn create_theater(&self, name: &str) -> Result<TheaterId, BookingError> {
        self.inner.create_theater(name).await
    }
    async fn create_hall(&self, hall: &NewHall) -> Result<HallId, BookingError> {
        self.inner.create_hall(hall).await
    }
    async fn create_movie(&self, movie: &NewMovie) -> Result<MovieId, BookingError> {
        self.inner.create_movie(movie).await
    }
    async fn create_show(&self, show: &NewShow) -> Result<ShowId, BookingError> {
        self.inner.create_show(show).await
    }
    async fn create_show_with_grid(&self, show: &NewShow) -> Result<(ShowId, u64), BookingError> {
        self.inner.create_show_with_grid(show).await
    }
    async fn list_theaters(&self) -> Result<Vec<Theater>, BookingError> {
        self.inner.list_theaters().await
    }
    async fn list_halls(&self) -> Result<Vec<Hall>, BookingError> {
        self.inner.list_halls().await
    }
    async fn list_movies(&self) -> Result<Vec<Movie>, BookingError> {
        self.inner.list_movies().await
    }
    async fn list_shows(&self) -> Result<Vec<ShowListing>, BookingError> {
        self.inner.list_shows().await
    }
    async fn find_show(&self, show_id: ShowId) -> Result<Option<ShowListing>, BookingError> {
        self.inner.find_show(show_id).await
    }
    async fn find_hall(&self, hall_id: HallId) -> Result<Option<Hall>, BookingError> {
        self.inner.find_hall(hall_id).await
    }
    async fn create_show_seat_grid(
        &self,
        show_id: ShowId,
        rows: i32,
        columns: i32,
    ) -> Result<u64, BookingError> {
        self.inner.create_show_seat_grid(show_id, rows, columns).await
    }
    async fn list_seats(&self, show_id: ShowId) -> Result<Vec<Seat>, BookingError> {
        self.inner.list_seats(show_id).await
    }
    async fn check_available(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
    ) -> Result<Availability, BookingError> {
        self.inner.check_available(show_id, seat_ids).await
    }
    async fn commit(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
        customer: &str,
    ) -> Result<BookingId, BookingError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.commit(show_id, seat_ids, customer).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
    async fn find_booking(&self, booking_id: BookingId) -> Result<Option<Booking>, BookingError> {
        self.inner.find_booking(booking_id).await
    }
    async fn list_show_bookings(&self, show_id: ShowId) -> Result<Vec<Booking>, BookingError> {
        self.inner.list_show_bookings(show_id).await
    }
}
