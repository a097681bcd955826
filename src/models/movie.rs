use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::MovieId;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Flat ticket price in minor currency units.
    pub price: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMovie {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 0))]
    pub price: i64,
}
