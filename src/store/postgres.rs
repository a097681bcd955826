use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{grid_size, Availability, BookingStore};
use crate::error::{BookingError, StorageError};
use crate::models::{
    Booking, BookingId, Hall, HallId, Movie, MovieId, NewHall, NewMovie, NewShow, Seat, SeatId,
    ShowId, ShowListing, Theater, TheaterId,
};

// Postgres SQLSTATE for lock_not_available
const LOCK_NOT_AVAILABLE: &str = "55P03";

const SHOW_LISTING_SELECT: &str = r#"
    SELECT s.id, s.movie_id, m.title, m.price, s.hall_id, h.name AS hall_name,
           t.name AS theater_name, s.starts_at
    FROM shows s
    JOIN movies m ON m.id = s.movie_id
    JOIN halls h ON h.id = s.hall_id
    JOIN theaters t ON t.id = h.theater_id
"#;

const INSERT_SHOW: &str = r#"
    INSERT INTO shows (movie_id, hall_id, starts_at)
    SELECT m.id, h.id, $3
    FROM movies m, halls h
    WHERE m.id = $1 AND h.id = $2
    RETURNING id
"#;

// 0 would disable the timeout, so round up to at least 1ms
fn lock_timeout_setting(wait: Duration) -> String {
    format!("{}ms", wait.as_millis().max(1))
}

fn missing_show_parent(show: &NewShow) -> BookingError {
    BookingError::Validation(format!(
        "movie {} or hall {} does not exist",
        show.movie_id, show.hall_id
    ))
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    show_id: i64,
    seat_ids: Vec<i64>,
    customer: String,
    created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            show_id: row.show_id,
            seat_ids: row.seat_ids,
            customer: row.customer,
            created_at: row.created_at,
        }
    }
}

/// Production store. Commits run in one transaction that holds the show row
/// lock, so the check-and-commit sequence is exclusive across every process
/// sharing the database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    fn map_lock_error(&self, e: sqlx::Error) -> BookingError {
        if let sqlx::Error::Database(ref db) = e {
            if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
                return BookingError::Storage(StorageError::LockTimeout(self.lock_timeout));
            }
        }
        BookingError::from(e)
    }

    /// Bounds every lock wait inside `tx`, then takes the show row lock.
    async fn lock_show(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        show_id: ShowId,
    ) -> Result<(), BookingError> {
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(lock_timeout_setting(self.lock_timeout))
            .execute(&mut **tx)
            .await?;

        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM shows WHERE id = $1 FOR UPDATE")
            .bind(show_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| self.map_lock_error(e))?;

        match locked {
            Some(_) => Ok(()),
            None => Err(BookingError::ShowNotFound(show_id)),
        }
    }

    async fn show_exists(&self, show_id: ShowId) -> Result<bool, BookingError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM shows WHERE id = $1)")
            .bind(show_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn free_seats<'e, E>(
        executor: E,
        show_id: ShowId,
        seat_ids: &[SeatId],
    ) -> Result<HashSet<SeatId>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let free = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM seats WHERE show_id = $1 AND id = ANY($2) AND booked = FALSE",
        )
        .bind(show_id)
        .bind(seat_ids)
        .fetch_all(executor)
        .await?;
        Ok(free.into_iter().collect())
    }

    async fn insert_grid(
        tx: &mut Transaction<'_, Postgres>,
        show_id: ShowId,
        rows: i32,
        columns: i32,
    ) -> Result<u64, sqlx::Error> {
        let created = sqlx::query(
            r#"
            INSERT INTO seats (show_id, row_index, col_index)
            SELECT $1, r, c
            FROM generate_series(1, $2) AS r, generate_series(1, $3) AS c
            ORDER BY r, c
            "#,
        )
        .bind(show_id)
        .bind(rows)
        .bind(columns)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        Ok(created)
    }

    async fn commit_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        show_id: ShowId,
        seat_ids: &[SeatId],
        customer: &str,
    ) -> Result<BookingId, BookingError> {
        self.lock_show(tx, show_id).await?;

        let free = Self::free_seats(&mut **tx, show_id, seat_ids).await?;
        Availability::evaluate(seat_ids, &free).into_result()?;

        let booking_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO bookings (id, show_id, seat_ids, customer)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(booking_id)
        .bind(show_id)
        .bind(seat_ids)
        .bind(customer)
        .execute(&mut **tx)
        .await?;

        // conditional write: only rows still free are flipped
        let flipped = sqlx::query(
            r#"
            UPDATE seats
            SET booked = TRUE, booking_id = $1
            WHERE show_id = $2 AND id = ANY($3) AND booked = FALSE
            "#,
        )
        .bind(booking_id)
        .bind(show_id)
        .bind(seat_ids)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if flipped != seat_ids.len() as u64 {
            warn!(
                "show {}: flipped {} of {} seats after availability check",
                show_id,
                flipped,
                seat_ids.len()
            );
            let free = Self::free_seats(&mut **tx, show_id, seat_ids).await?;
            Availability::evaluate(seat_ids, &free).into_result()?;
            return Err(StorageError::Inconsistent(format!(
                "seat update touched {} rows, expected {}",
                flipped,
                seat_ids.len()
            ))
            .into());
        }

        Ok(booking_id)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn create_theater(&self, name: &str) -> Result<TheaterId, BookingError> {
        let id = sqlx::query_scalar::<_, i64>("INSERT INTO theaters (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn create_hall(&self, hall: &NewHall) -> Result<HallId, BookingError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO halls (theater_id, name, rows, seats_per_row)
            SELECT t.id, $2, $3, $4 FROM theaters t WHERE t.id = $1
            RETURNING id
            "#,
        )
        .bind(hall.theater_id)
        .bind(&hall.name)
        .bind(hall.rows)
        .bind(hall.seats_per_row)
        .fetch_optional(&self.pool)
        .await?;

        id.ok_or_else(|| {
            BookingError::Validation(format!("theater {} does not exist", hall.theater_id))
        })
    }

    async fn create_movie(&self, movie: &NewMovie) -> Result<MovieId, BookingError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO movies (title, price) VALUES ($1, $2) RETURNING id",
        )
        .bind(&movie.title)
        .bind(movie.price)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_show(&self, show: &NewShow) -> Result<ShowId, BookingError> {
        let id = sqlx::query_scalar::<_, i64>(INSERT_SHOW)
            .bind(show.movie_id)
            .bind(show.hall_id)
            .bind(show.starts_at)
            .fetch_optional(&self.pool)
            .await?;

        id.ok_or_else(|| missing_show_parent(show))
    }

    async fn create_show_with_grid(&self, show: &NewShow) -> Result<(ShowId, u64), BookingError> {
        // an early return drops `tx`, which rolls back
        let mut tx = self.pool.begin().await?;

        let (rows, columns) = sqlx::query_as::<_, (i32, i32)>(
            "SELECT rows, seats_per_row FROM halls WHERE id = $1",
        )
        .bind(show.hall_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| BookingError::Validation(format!("hall {} does not exist", show.hall_id)))?;
        grid_size(rows, columns)?;

        let show_id = sqlx::query_scalar::<_, i64>(INSERT_SHOW)
            .bind(show.movie_id)
            .bind(show.hall_id)
            .bind(show.starts_at)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| missing_show_parent(show))?;

        let created = Self::insert_grid(&mut tx, show_id, rows, columns).await?;
        tx.commit().await?;
        debug!("show {}: created with {} seats", show_id, created);
        Ok((show_id, created))
    }

    async fn list_theaters(&self) -> Result<Vec<Theater>, BookingError> {
        let rows = sqlx::query_as::<_, Theater>("SELECT id, name FROM theaters ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_halls(&self) -> Result<Vec<Hall>, BookingError> {
        let rows = sqlx::query_as::<_, Hall>(
            "SELECT id, theater_id, name, rows, seats_per_row FROM halls ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_movies(&self) -> Result<Vec<Movie>, BookingError> {
        let rows = sqlx::query_as::<_, Movie>("SELECT id, title, price FROM movies ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_shows(&self) -> Result<Vec<ShowListing>, BookingError> {
        let q = format!("{} ORDER BY s.starts_at, s.id", SHOW_LISTING_SELECT);
        let rows = sqlx::query_as::<_, ShowListing>(&q)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_show(&self, show_id: ShowId) -> Result<Option<ShowListing>, BookingError> {
        let q = format!("{} WHERE s.id = $1", SHOW_LISTING_SELECT);
        let row = sqlx::query_as::<_, ShowListing>(&q)
            .bind(show_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_hall(&self, hall_id: HallId) -> Result<Option<Hall>, BookingError> {
        let row = sqlx::query_as::<_, Hall>(
            "SELECT id, theater_id, name, rows, seats_per_row FROM halls WHERE id = $1",
        )
        .bind(hall_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_show_seat_grid(
        &self,
        show_id: ShowId,
        rows: i32,
        columns: i32,
    ) -> Result<u64, BookingError> {
        grid_size(rows, columns)?;

        let mut tx = self.pool.begin().await?;
        self.lock_show(&mut tx, show_id).await?;

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM seats WHERE show_id = $1")
            .bind(show_id)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(BookingError::Validation(format!(
                "show {} already has a seat grid",
                show_id
            )));
        }

        let created = Self::insert_grid(&mut tx, show_id, rows, columns).await?;

        tx.commit().await?;
        debug!("show {}: created {} seats", show_id, created);
        Ok(created)
    }

    async fn list_seats(&self, show_id: ShowId) -> Result<Vec<Seat>, BookingError> {
        let seats = sqlx::query_as::<_, Seat>(
            r#"
            SELECT id, show_id, row_index, col_index, booked
            FROM seats
            WHERE show_id = $1
            ORDER BY row_index, col_index
            "#,
        )
        .bind(show_id)
        .fetch_all(&self.pool)
        .await?;

        // an empty grid and an unknown show look the same from the seats table
        if seats.is_empty() && !self.show_exists(show_id).await? {
            return Err(BookingError::ShowNotFound(show_id));
        }
        Ok(seats)
    }

    async fn check_available(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
    ) -> Result<Availability, BookingError> {
        if !self.show_exists(show_id).await? {
            return Err(BookingError::ShowNotFound(show_id));
        }
        let free = Self::free_seats(&self.pool, show_id, seat_ids).await?;
        Ok(Availability::evaluate(seat_ids, &free))
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

        let mut tx = self.pool.begin().await?;
        match self.commit_in_tx(&mut tx, show_id, seat_ids, customer).await {
            Ok(booking_id) => {
                tx.commit().await?;
                Ok(booking_id)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("show {}: rollback failed: {:?}", show_id, rollback);
                }
                Err(e)
            }
        }
    }

    async fn find_booking(&self, booking_id: BookingId) -> Result<Option<Booking>, BookingError> {
        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, show_id, seat_ids, customer, created_at FROM bookings WHERE id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Booking::from))
    }

    async fn list_show_bookings(&self, show_id: ShowId) -> Result<Vec<Booking>, BookingError> {
        if !self.show_exists(show_id).await? {
            return Err(BookingError::ShowNotFound(show_id));
        }
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, show_id, seat_ids, customer, created_at
            FROM bookings
            WHERE show_id = $1
            ORDER BY ledger_seq
            "#,
        )
        .bind(show_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }
}
