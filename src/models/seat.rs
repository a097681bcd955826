use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{SeatId, ShowId};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: SeatId,
    pub show_id: ShowId,
    pub row_index: i32,
    pub col_index: i32,
    pub booked: bool,
}

impl Seat {
    pub fn label(&self) -> String {
        seat_label(self.row_index, self.col_index)
    }
}

/// Human readable seat name: row 1 is `A`, row 27 is `AA`, column appended as a number.
pub fn seat_label(row_index: i32, col_index: i32) -> String {
    let mut letters = Vec::new();
    let mut n = row_index.max(1);
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("{}{}", letters.into_iter().collect::<String>(), col_index)
}
