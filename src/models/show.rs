use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{HallId, MovieId, ShowId};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Show {
    pub id: ShowId,
    pub movie_id: MovieId,
    pub hall_id: HallId,
    pub starts_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShow {
    pub movie_id: MovieId,
    pub hall_id: HallId,
    pub starts_at: NaiveDateTime,
}

// Show joined with the movie, hall and theater it belongs to
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowListing {
    pub id: ShowId,
    pub movie_id: MovieId,
    pub title: String,
    pub price: i64,
    pub hall_id: HallId,
    pub hall_name: String,
    pub theater_name: String,
    pub starts_at: NaiveDateTime,
}
