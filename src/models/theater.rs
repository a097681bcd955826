use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{HallId, TheaterId};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Theater {
    pub id: TheaterId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTheater {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

/// A screening room. Every show in the hall gets a `rows x seats_per_row` grid.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hall {
    pub id: HallId,
    pub theater_id: TheaterId,
    pub name: String,
    pub rows: i32,
    pub seats_per_row: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewHall {
    pub theater_id: TheaterId,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    // keep in step with store::MAX_GRID_DIMENSION
    #[validate(range(min = 1, max = 100))]
    pub rows: i32,
    #[validate(range(min = 1, max = 100))]
    pub seats_per_row: i32,
}
