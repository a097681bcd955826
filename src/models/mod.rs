pub mod theater;
pub mod movie;
pub mod show;
pub mod seat;
pub mod booking;

pub use theater::{Hall, NewHall, NewTheater, Theater};
pub use movie::{Movie, NewMovie};
pub use show::{NewShow, Show, ShowListing};
pub use seat::Seat;
pub use booking::{Booking, BookingDetails, BookedSeat};

pub type TheaterId = i64;
pub type HallId = i64;
pub type MovieId = i64;
pub type ShowId = i64;
pub type SeatId = i64;
pub type BookingId = uuid::Uuid;
