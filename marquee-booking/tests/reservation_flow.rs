use chrono::{Duration, Utc};
use marquee_booking::memory::{sample_movie, InMemoryBackend};
use marquee_booking::sweeper::SweepOutcome;
use marquee_booking::{DispatchOutcome, NotificationOutcome};
use marquee_core::booking::BookingStatus;
use marquee_core::jobs::Job;
use marquee_core::payment::{PaymentEventKind, PaymentNotification};
use marquee_core::repository::{BookingLedger, MovieStore, ShowInventory};
use marquee_core::seat::SeatLabel;
use marquee_core::BookingError;
use marquee_shared::models::events::{TOPIC_BOOKING_EXPIRED, TOPIC_BOOKING_PAID, TOPIC_LATE_PAYMENT, TOPIC_SEATS_HELD};
use uuid::Uuid;

fn labels(raw: &[&str]) -> Vec<SeatLabel> {
    raw.iter().map(|s| s.parse().unwrap()).collect()
}

fn paid(booking_id: Uuid) -> PaymentNotification {
    PaymentNotification {
        event_type: "checkout.session.completed".to_string(),
        correlation_id: Some(booking_id.to_string()),
        kind: PaymentEventKind::Succeeded,
        amount_cents: Some(20),
    }
}

#[tokio::test]
async fn test_scenario_a_reserve_holds_seats_and_prices_booking() {
    let backend = InMemoryBackend::new();
    backend.movies.save_movie(&sample_movie("550", "Fight Club")).await.unwrap();
    let show = backend.add_show("550", 10);

    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["A1", "A2"], "user1")
        .await
        .unwrap();

    let booking = backend.ledger.get(reservation.booking_id).await.unwrap().unwrap();
    assert_eq!(booking.amount_cents, 20);
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.seats, labels(&["A1", "A2"]));
    assert_eq!(booking.payment_link.as_deref(), Some(reservation.payment_url.as_str()));
    assert!(booking.payment_reference.is_some());

    for seat in ["A1", "A2"] {
        let holder = backend.shows.holder_of(show.id, seat).unwrap();
        assert_eq!(holder.holder_id, "user1");
        assert_eq!(holder.booking_id, booking.id);
    }

    let requests = backend.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].booking_id, booking.id);
    assert_eq!(requests[0].amount_cents, 20);
    assert_eq!(requests[0].description, "Fight Club");
    assert_eq!(requests[0].expires_at, booking.hold_expires_at);

    let jobs = backend.jobs.scheduled();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job, Job::CheckPayment { booking_id: booking.id });
    assert_eq!(jobs[0].fire_at, booking.hold_expires_at);

    assert_eq!(backend.events.topics(), vec![TOPIC_SEATS_HELD.to_string()]);
}

#[tokio::test]
async fn test_scenario_b_overlapping_reserve_reports_taken_seats() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let service = backend.reservation_service();

    service.reserve(show.id, &["A1", "A2"], "user1").await.unwrap();
    let result = service.reserve(show.id, &["A2", "A3"], "user2").await;

    assert_eq!(result, Err(BookingError::SeatsTaken(labels(&["A2"]))));
    assert!(backend.shows.holder_of(show.id, "A3").is_none());
    assert!(backend.ledger.list_for_holder("user2").await.unwrap().is_empty());
    assert_eq!(backend.gateway.requests().len(), 1);
}

#[tokio::test]
async fn test_scenario_c_payment_is_terminal_and_idempotent() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["A1", "A2"], "user1")
        .await
        .unwrap();
    let orchestrator = backend.orchestrator();

    assert_eq!(
        orchestrator.handle_notification(&paid(reservation.booking_id)).await.unwrap(),
        NotificationOutcome::Paid(reservation.booking_id)
    );
    assert_eq!(
        orchestrator.handle_notification(&paid(reservation.booking_id)).await.unwrap(),
        NotificationOutcome::AlreadyPaid(reservation.booking_id)
    );

    let booking = backend.ledger.get(reservation.booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Paid);
    assert!(booking.payment_link.is_none());

    // The sweep still fires at hold timeout and must leave paid seats alone.
    let after_timeout = booking.hold_expires_at + Duration::seconds(1);
    let results = backend.run_due_jobs(after_timeout).await;
    assert!(results.contains(&Ok(DispatchOutcome::Swept(SweepOutcome::AlreadySettled))));
    assert_eq!(backend.shows.holder_of(show.id, "A1").unwrap().holder_id, "user1");
    assert_eq!(backend.shows.holder_of(show.id, "A2").unwrap().holder_id, "user1");

    let paid_events = backend.events.topics().iter().filter(|t| *t == TOPIC_BOOKING_PAID).count();
    assert_eq!(paid_events, 1);
}

#[tokio::test]
async fn test_scenario_d_unpaid_booking_expires_and_seats_resell() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let service = backend.reservation_service();

    let abandoned = service.reserve(show.id, &["D4", "D5"], "user2").await.unwrap();
    let booking = backend.ledger.get(abandoned.booking_id).await.unwrap().unwrap();

    let before_timeout = backend.run_due_jobs(booking.hold_expires_at - Duration::seconds(1)).await;
    assert!(before_timeout.is_empty());

    let results = backend.run_due_jobs(booking.hold_expires_at).await;
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Ok(DispatchOutcome::Swept(SweepOutcome::Expired(_)))));

    let expired = backend.ledger.get(abandoned.booking_id).await.unwrap().unwrap();
    assert_eq!(expired.status, BookingStatus::Expired);
    assert!(backend.shows.list_occupied(show.id).await.unwrap().is_empty());
    assert!(backend.events.topics().contains(&TOPIC_BOOKING_EXPIRED.to_string()));

    let resold = service.reserve(show.id, &["D4", "D5"], "user3").await.unwrap();
    assert_eq!(backend.shows.holder_of(show.id, "D4").unwrap().booking_id, resold.booking_id);
}

#[tokio::test]
async fn test_expiring_releases_exactly_the_booked_seats() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let service = backend.reservation_service();

    service.reserve(show.id, &["J9"], "neighbour").await.unwrap();
    let reservation = service.reserve(show.id, &["E1", "E2", "E3"], "user1").await.unwrap();

    let outcome = backend.sweeper().sweep(reservation.booking_id).await.unwrap();
    assert!(matches!(outcome, SweepOutcome::Expired(ref r) if r.seats == labels(&["E1", "E2", "E3"])));

    let occupied: Vec<SeatLabel> = backend.shows.list_occupied(show.id).await.unwrap().into_iter().collect();
    assert_eq!(occupied, labels(&["J9"]));
}

#[tokio::test]
async fn test_late_payment_after_expiry_is_reported_not_applied() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["F1"], "user1")
        .await
        .unwrap();

    backend.sweeper().sweep(reservation.booking_id).await.unwrap();
    let outcome = backend.orchestrator().handle_notification(&paid(reservation.booking_id)).await.unwrap();

    assert_eq!(outcome, NotificationOutcome::LatePayment(reservation.booking_id));
    let booking = backend.ledger.get(reservation.booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Expired);
    assert!(backend.events.topics().contains(&TOPIC_LATE_PAYMENT.to_string()));
    assert!(backend.shows.holder_of(show.id, "F1").is_none());
}

#[tokio::test]
async fn test_gateway_failure_releases_hold_and_expires_booking() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    backend.gateway.set_failing(true);

    let result = backend.reservation_service().reserve(show.id, &["G1", "G2"], "user1").await;

    assert!(matches!(result, Err(BookingError::GatewayFailure(_))));
    assert!(backend.shows.list_occupied(show.id).await.unwrap().is_empty());
    let bookings = backend.ledger.list_for_holder("user1").await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].status, BookingStatus::Expired);

    backend.gateway.set_failing(false);
    backend
        .reservation_service()
        .reserve(show.id, &["G1", "G2"], "user2")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_release_during_compensation_is_queued() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    backend.ledger.fail_attach_payment(true);
    backend.shows.fail_next_releases(1);

    let result = backend.reservation_service().reserve(show.id, &["H1"], "user1").await;
    assert!(matches!(result, Err(BookingError::Storage(_))));
    assert!(backend.shows.holder_of(show.id, "H1").is_some());

    let results = backend.run_due_jobs(Utc::now()).await;
    assert!(results.contains(&Ok(DispatchOutcome::SeatsReleased)));
    assert!(backend.shows.holder_of(show.id, "H1").is_none());
}

#[tokio::test]
async fn test_unknown_or_started_show_is_invalid_request() {
    let backend = InMemoryBackend::new();
    let service = backend.reservation_service();

    let unknown = service.reserve(Uuid::new_v4(), &["A1"], "user1").await;
    assert!(matches!(unknown, Err(BookingError::InvalidRequest(_))));

    let show = backend.add_show("550", 10);
    let mut started = show.clone();
    started.id = Uuid::new_v4();
    started.starts_at = Utc::now() - Duration::minutes(5);
    backend.shows.insert_show(started.clone());
    let late = service.reserve(started.id, &["A1"], "user1").await;
    assert!(matches!(late, Err(BookingError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_invalid_selections_have_no_side_effects() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let service = backend.reservation_service();
    let empty: [&str; 0] = [];

    for seats in [&empty[..], &["A1", "A1"][..], &["A1", "A2", "A3", "A4", "A5", "A6"][..], &["Z9"][..]] {
        let result = service.reserve(show.id, seats, "user1").await;
        assert!(matches!(result, Err(BookingError::InvalidRequest(_))), "{:?}", seats);
    }
    assert!(backend.ledger.is_empty());
    assert!(backend.jobs.scheduled().is_empty());
}

#[tokio::test]
async fn test_sweep_failure_leaves_exactly_one_retry() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["B5"], "user1")
        .await
        .unwrap();
    backend.jobs.take_due(Utc::now() + Duration::hours(1));

    backend.shows.fail_next_releases(1);
    let sweeper = backend.sweeper();
    let outcome = sweeper.sweep(reservation.booking_id).await.unwrap();
    assert!(matches!(outcome, SweepOutcome::Rescheduled(_)));

    let retry = backend.jobs.scheduled();
    assert_eq!(retry.len(), 1);
    assert_eq!(retry[0].job, Job::CheckPayment { booking_id: reservation.booking_id });

    // The booking is already expired; the retry re-applies the release.
    assert_eq!(sweeper.sweep(reservation.booking_id).await.unwrap(), SweepOutcome::AlreadyExpired);
    assert!(backend.shows.holder_of(show.id, "B5").is_none());
    assert_eq!(sweeper.sweep(reservation.booking_id).await.unwrap(), SweepOutcome::AlreadyExpired);
}

#[tokio::test]
async fn test_failed_sweep_job_does_not_multiply() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["A1"], "user1")
        .await
        .unwrap();

    backend.ledger.fail_mark_expired(true);
    let results = backend.run_due_jobs(Utc::now() + Duration::minutes(11)).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(matches!(results[..], [Ok(DispatchOutcome::Swept(SweepOutcome::Rescheduled(_)))]));

    let pending: Vec<Job> = backend.jobs.scheduled().into_iter().map(|s| s.job).collect();
    assert_eq!(pending, vec![Job::CheckPayment { booking_id: reservation.booking_id }]);

    backend.ledger.fail_mark_expired(false);
    let results = backend.run_due_jobs(Utc::now() + Duration::minutes(12)).await;
    assert!(matches!(results[..], [Ok(DispatchOutcome::Swept(SweepOutcome::Expired(_)))]));
    assert!(backend.jobs.scheduled().is_empty());
}

#[tokio::test]
async fn test_sweep_error_returned_when_retry_cannot_be_queued() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["A2"], "user1")
        .await
        .unwrap();
    backend.jobs.take_due(Utc::now() + Duration::hours(1));

    backend.ledger.fail_mark_expired(true);
    backend.jobs.set_failing(true);
    assert!(backend.sweeper().sweep(reservation.booking_id).await.is_err());
    backend.jobs.set_failing(false);
    assert!(backend.jobs.scheduled().is_empty());
}

#[tokio::test]
async fn test_session_expired_triggers_immediate_sweep() {
    let backend = InMemoryBackend::new();
    let show = backend.add_show("550", 10);
    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["C1"], "user1")
        .await
        .unwrap();

    let notification = PaymentNotification {
        event_type: "checkout.session.expired".to_string(),
        correlation_id: Some(reservation.booking_id.to_string()),
        kind: PaymentEventKind::SessionExpired,
        amount_cents: None,
    };
    assert_eq!(
        backend.orchestrator().handle_notification(&notification).await.unwrap(),
        NotificationOutcome::SweepRequested(reservation.booking_id)
    );

    let results = backend.run_due_jobs(Utc::now()).await;
    assert!(matches!(results[..], [Ok(DispatchOutcome::Swept(SweepOutcome::Expired(_)))]));
    assert!(backend.shows.holder_of(show.id, "C1").is_none());
}
