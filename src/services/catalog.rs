use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use tracing::info;

use super::booking::BookingService;
use crate::error::BookingError;
use crate::models::{BookingId, NewHall, NewMovie, NewShow, ShowId};

/// Creates the show and a seat grid sized from its hall, as one unit.
pub async fn schedule_show(
    service: &BookingService,
    show: &NewShow,
) -> Result<(ShowId, u64), BookingError> {
    let (show_id, seats) = service.store().create_show_with_grid(show).await?;
    info!("show {} scheduled in hall {} with {} seats", show_id, show.hall_id, seats);
    Ok((show_id, seats))
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleSummary {
    pub theaters: usize,
    pub halls: usize,
    pub movies: usize,
    pub shows: Vec<ShowId>,
    pub seats: u64,
    pub box_office_booking: BookingId,
}

fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN))
}

/// Demo catalog: two theaters, three halls, three movies and four shows for
/// today. Two seats of the evening Avengers show are sold at the box office,
/// which goes through the regular booking path.
pub async fn create_sample_data(service: &BookingService) -> Result<SampleSummary, BookingError> {
    let store = service.store();
    let today = Utc::now().date_naive();

    let city_center = store.create_theater("PVR City Center").await?;
    let mall = store.create_theater("INOX Mall").await?;

    let mut halls = Vec::new();
    for (theater_id, name, rows, seats_per_row) in [
        (city_center, "Hall 1", 3, 7),
        (city_center, "Hall 2", 3, 10),
        (mall, "Hall A", 3, 8),
    ] {
        let hall = NewHall {
            theater_id,
            name: name.to_string(),
            rows,
            seats_per_row,
        };
        halls.push(store.create_hall(&hall).await?);
    }

    let mut movies = Vec::new();
    for (title, price) in [("Inception", 25_000), ("Interstellar", 30_000), ("Avengers", 35_000)] {
        let movie = NewMovie {
            title: title.to_string(),
            price,
        };
        movies.push(store.create_movie(&movie).await?);
    }

    let schedule = [
        (movies[0], halls[0], 10),
        (movies[0], halls[0], 18),
        (movies[2], halls[1], 19),
        (movies[1], halls[2], 18),
    ];
    let mut shows = Vec::new();
    let mut seats = 0;
    for (movie_id, hall_id, hour) in schedule {
        let (show_id, created) = schedule_show(
            service,
            &NewShow {
                movie_id,
                hall_id,
                starts_at: at(today, hour),
            },
        )
        .await?;
        shows.push(show_id);
        seats += created;
    }

    // A3 and A4 of the Avengers show
    let evening = shows[2];
    let sold: Vec<_> = service
        .list_seats(evening)
        .await?
        .into_iter()
        .filter(|s| s.row_index == 1 && (s.col_index == 3 || s.col_index == 4))
        .map(|s| s.id)
        .collect();
    let box_office_booking = service.book(evening, &sold, Some("Box Office")).await?;

    info!(
        "Sample data created: {} shows, {} seats",
        shows.len(),
        seats
    );

    Ok(SampleSummary {
        theaters: 2,
        halls: halls.len(),
        movies: movies.len(),
        shows,
        seats,
        box_office_booking,
    })
}
