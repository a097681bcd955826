//! Reservation core behaviour against the in-memory store.
//!
//! Run with: `cargo test --test reservation -- --nocapture`

mod util;

use fake::{faker::name::en::Name, Fake};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use showtime_booking::config::BookingConfig;
use showtime_booking::error::{BookingError, StorageError};
use showtime_booking::services::catalog;
use util::{
    assert_ledger_matches_seats, booked_seats, fixture_with_limits, limits, memory_fixture,
    SlowStore, TICKET_PRICE,
};

#[tokio::test]
async fn two_by_two_grid_scenario() {
    let fx = memory_fixture(2, 2).await;
    let (a1, a2, b1, b2) = (fx.seat("A1"), fx.seat("A2"), fx.seat("B1"), fx.seat("B2"));

    let alice = fx
        .service
        .book(fx.show_id, &[a1, b1], Some("Alice"))
        .await
        .expect("Alice gets A1 and B1");

    let seats = fx.service.list_seats(fx.show_id).await.unwrap();
    let state: Vec<(i64, bool)> = seats.iter().map(|s| (s.id, s.booked)).collect();
    assert_eq!(state, vec![(a1, true), (a2, false), (b1, true), (b2, false)]);

    match fx.service.book(fx.show_id, &[a1], Some("Bob")).await {
        Err(BookingError::SeatUnavailable(ids)) => assert_eq!(ids, vec![a1]),
        other => panic!("Bob should be refused A1, got {:?}", other),
    }

    let booking = fx.service.get_booking(alice).await.unwrap();
    assert_eq!(booking.seat_ids, vec![a1, b1]);
    assert_eq!(booking.customer, "Alice");
    assert_ledger_matches_seats(&fx.service, fx.show_id).await;
}

#[tokio::test]
async fn empty_request_is_rejected_without_changes() {
    let fx = memory_fixture(2, 2).await;
    let before = fx.service.list_seats(fx.show_id).await.unwrap();

    let err = fx.service.book(fx.show_id, &[], Some("Carl")).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    assert_eq!(fx.service.list_seats(fx.show_id).await.unwrap(), before);
    assert!(fx.service.list_show_bookings(fx.show_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_show_is_not_found() {
    let fx = memory_fixture(2, 2).await;
    let unknown = fx.show_id + 10_000;

    let err = fx
        .service
        .book(unknown, &[fx.seat("A1")], Some("Dee"))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ShowNotFound(id) if id == unknown));

    let err = fx.service.list_seats(unknown).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowNotFound(_)));
}

#[tokio::test]
async fn partial_overlap_books_nothing() {
    let fx = memory_fixture(2, 3).await;
    fx.service
        .book(fx.show_id, &[fx.seat("A2")], Some("first"))
        .await
        .unwrap();
    let before = booked_seats(&fx.service, fx.show_id).await;

    let err = fx
        .service
        .book(
            fx.show_id,
            &[fx.seat("A1"), fx.seat("A2"), fx.seat("A3")],
            Some("second"),
        )
        .await
        .unwrap_err();
    match err {
        BookingError::SeatUnavailable(ids) => assert_eq!(ids, vec![fx.seat("A2")]),
        other => panic!("unexpected error {:?}", other),
    }

    assert_eq!(booked_seats(&fx.service, fx.show_id).await, before);
    assert_eq!(fx.service.list_show_bookings(fx.show_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn forged_seat_ids_are_reported_as_unavailable() {
    let fx = memory_fixture(1, 2).await;
    let forged = 987_654;

    let err = fx
        .service
        .book(fx.show_id, &[fx.seat("A1"), forged], None)
        .await
        .unwrap_err();
    match err {
        BookingError::SeatUnavailable(ids) => assert_eq!(ids, vec![forged]),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(booked_seats(&fx.service, fx.show_id).await.is_empty());
}

#[tokio::test]
async fn duplicate_seat_ids_are_booked_once() {
    let fx = memory_fixture(1, 3).await;
    let a1 = fx.seat("A1");

    let id = fx
        .service
        .book(fx.show_id, &[a1, a1, fx.seat("A3"), a1], Some("Erin"))
        .await
        .unwrap();
    let booking = fx.service.get_booking(id).await.unwrap();
    assert_eq!(booking.seat_ids, vec![a1, fx.seat("A3")]);
}

#[tokio::test]
async fn list_seats_is_stable_between_bookings() {
    let fx = memory_fixture(3, 4).await;
    let first = fx.service.list_seats(fx.show_id).await.unwrap();
    let second = fx.service.list_seats(fx.show_id).await.unwrap();
    assert_eq!(first, second);

    let mut coords: Vec<(i32, i32)> = first.iter().map(|s| (s.row_index, s.col_index)).collect();
    let listed = coords.clone();
    coords.sort();
    assert_eq!(coords, listed);
}

#[tokio::test]
async fn availability_check_has_no_side_effects() {
    let fx = memory_fixture(2, 2).await;
    fx.service
        .book(fx.show_id, &[fx.seat("B2")], None)
        .await
        .unwrap();

    let availability = fx
        .service
        .check_available(fx.show_id, &[fx.seat("A1"), fx.seat("B2")])
        .await
        .unwrap();
    assert!(!availability.all_free);
    assert_eq!(availability.unavailable, vec![fx.seat("B2")]);

    let availability = fx
        .service
        .check_available(fx.show_id, &[fx.seat("A1")])
        .await
        .unwrap();
    assert!(availability.all_free);
    assert_eq!(booked_seats(&fx.service, fx.show_id).await.len(), 1);
}

#[tokio::test]
async fn confirmation_details_price_every_seat() {
    let fx = memory_fixture(2, 2).await;
    let id = fx
        .service
        .book(fx.show_id, &[fx.seat("B1"), fx.seat("A2")], Some("Fay"))
        .await
        .unwrap();

    let details = fx.service.get_booking_details(id).await.unwrap();
    let labels: Vec<&str> = details.seats.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["B1", "A2"]);
    assert_eq!(details.customer, "Fay");
    assert_eq!(details.movie_title, "Alien");
    assert_eq!(details.price_per_seat, TICKET_PRICE);
    assert_eq!(details.total, TICKET_PRICE * 2);

    let missing = uuid::Uuid::new_v4();
    let err = fx.service.get_booking_details(missing).await.unwrap_err();
    assert!(matches!(err, BookingError::BookingNotFound(id) if id == missing));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn last_seat_goes_to_exactly_one_of_many() {
    const REQUESTS: usize = 100;
    let fx = memory_fixture(1, 1).await;
    let seat = fx.seat("A1");

    let mut handles = Vec::with_capacity(REQUESTS);
    for _ in 0..REQUESTS {
        let service = fx.service.clone();
        let show_id = fx.show_id;
        let customer: String = Name().fake();
        handles.push(tokio::spawn(async move {
            service.book(show_id, &[seat], Some(&customer)).await
        }));
    }

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(BookingError::SeatUnavailable(ids)) if ids == &vec![seat]))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(refused, REQUESTS - 1);
    assert_ledger_matches_seats(&fx.service, fx.show_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bookings_on_different_shows_proceed_independently() {
    let first = memory_fixture(1, 2).await;
    let second = memory_fixture(1, 2).await;

    let first_seats = [first.seat("A1")];
    let second_seats = [second.seat("A1")];
    let (a, b) = tokio::join!(
        first.service.book(first.show_id, &first_seats, None),
        second.service.book(second.show_id, &second_seats, None),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn unknown_shows_leave_nothing_in_the_gate() {
    let fx = memory_fixture(1, 1).await;
    for offset in 0..500 {
        let err = fx
            .service
            .book(1_000_000 + offset, &[fx.seat("A1")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ShowNotFound(_)));
    }
    fx.service
        .book(fx.show_id, &[fx.seat("A1")], None)
        .await
        .unwrap();

    assert_eq!(fx.service.gate().tracked_shows(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn abandoned_request_holds_the_show_until_its_commit_ends() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(200)));
    let fx = fixture_with_limits(store.clone(), 1, 2, limits()).await;

    // caller gives up while its commit is still running
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        fx.service.book(fx.show_id, &[fx.seat("A1")], Some("Hal")),
    )
    .await;
    assert!(abandoned.is_err());

    fx.service
        .book(fx.show_id, &[fx.seat("A2")], Some("Ivy"))
        .await
        .unwrap();

    assert_eq!(store.peak_concurrent_commits(), 1);
    // the abandoned commit still completed
    let expected: HashSet<i64> = [fx.seat("A1"), fx.seat("A2")].into_iter().collect();
    assert_eq!(booked_seats(&fx.service, fx.show_id).await, expected);
    assert_ledger_matches_seats(&fx.service, fx.show_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn storage_failure_changes_nothing() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(300)));
    let short_wait = BookingConfig {
        max_seats_per_booking: 10,
        lock_wait_ms: 30,
    };
    let fx = fixture_with_limits(store, 2, 2, short_wait).await;
    fx.service
        .book(fx.show_id, &[fx.seat("B2")], Some("Jo"))
        .await
        .unwrap();

    let seats_before = fx.service.list_seats(fx.show_id).await.unwrap();
    let ledger_before = fx.service.list_show_bookings(fx.show_id).await.unwrap();

    // a slow commit occupies the show
    let holder = {
        let service = fx.service.clone();
        let (show_id, seat) = (fx.show_id, fx.seat("A1"));
        tokio::spawn(async move { service.book(show_id, &[seat], Some("Kim")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = fx
        .service
        .book(fx.show_id, &[fx.seat("A2"), fx.seat("B1")], Some("Lou"))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Storage(StorageError::LockTimeout(_))));
    assert_eq!(err.kind(), "storage_failure");

    assert_eq!(fx.service.list_seats(fx.show_id).await.unwrap(), seats_before);
    assert_eq!(
        fx.service.list_show_bookings(fx.show_id).await.unwrap(),
        ledger_before
    );

    holder.await.unwrap().unwrap();
    let expected: HashSet<i64> = [fx.seat("A1"), fx.seat("B2")].into_iter().collect();
    assert_eq!(booked_seats(&fx.service, fx.show_id).await, expected);
    assert_ledger_matches_seats(&fx.service, fx.show_id).await;
}

#[tokio::test]
async fn sample_data_prebooks_through_the_committer() {
    let fx = memory_fixture(1, 1).await;
    let summary = catalog::create_sample_data(&fx.service).await.unwrap();

    assert_eq!(summary.shows.len(), 4);
    assert_eq!(summary.seats, 3 * 7 * 2 + 3 * 10 + 3 * 8);

    let evening = summary.shows[2];
    let booked: Vec<String> = fx
        .service
        .list_seats(evening)
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.booked)
        .map(|s| s.label())
        .collect();
    assert_eq!(booked, vec!["A3", "A4"]);

    let ledger = fx.service.list_show_bookings(evening).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].id, summary.box_office_booking);
    assert_eq!(ledger[0].customer, "Box Office");
    assert_ledger_matches_seats(&fx.service, evening).await;
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn concurrent_requests_never_double_book(
        requests in prop::collection::vec(prop::collection::vec(0usize..9, 1..4), 1..24)
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async move {
            let fx = memory_fixture(3, 3).await;
            let mut labels: Vec<String> = fx.seats.keys().cloned().collect();
            labels.sort();
            let ids: Vec<i64> = labels.iter().map(|l| fx.seat(l)).collect();

            let handles: Vec<_> = requests
                .iter()
                .map(|picks| {
                    let seat_ids: Vec<i64> = picks.iter().map(|i| ids[*i]).collect();
                    let service = fx.service.clone();
                    let show_id = fx.show_id;
                    tokio::spawn(async move {
                        let result = service.book(show_id, &seat_ids, None).await;
                        (seat_ids, result)
                    })
                })
                .collect();

            let mut won: HashSet<i64> = HashSet::new();
            for handle in handles {
                let (seat_ids, result) = handle.await.unwrap();
                match result {
                    Ok(_) => {
                        for id in seat_ids {
                            won.insert(id);
                        }
                    }
                    Err(BookingError::SeatUnavailable(ids)) => assert!(!ids.is_empty()),
                    Err(other) => panic!("unexpected error {:?}", other),
                }
            }

            assert_eq!(won, booked_seats(&fx.service, fx.show_id).await);
            assert_ledger_matches_seats(&fx.service, fx.show_id).await;
        });
    }
}
