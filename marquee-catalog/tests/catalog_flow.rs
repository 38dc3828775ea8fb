use chrono::{Duration, Utc};
use marquee_booking::memory::{sample_movie, InMemoryBackend, StaticCatalog};
use marquee_catalog::{AnnouncementDebouncer, Dashboard, ShowInput, ShowListing, ShowPlanner};
use marquee_core::identity::UserProfile;
use marquee_core::jobs::Job;
use marquee_core::payment::{PaymentEventKind, PaymentNotification};
use marquee_core::repository::{MovieStore, UserDirectory};
use marquee_core::BookingError;
use std::time::Duration as StdDuration;

fn backend() -> InMemoryBackend {
    InMemoryBackend::with_catalog(
        StaticCatalog::new()
            .with_movie(sample_movie("550", "Fight Club"))
            .with_movie(sample_movie("603", "The Matrix")),
    )
}

fn planner(backend: &InMemoryBackend) -> ShowPlanner {
    ShowPlanner::new(
        backend.shows.clone(),
        backend.movies.clone(),
        backend.catalog.clone(),
        backend.jobs.clone(),
    )
}

fn tomorrow_input(times: &[&str]) -> ShowInput {
    ShowInput {
        date: (Utc::now() + Duration::days(1)).format("%Y-%m-%d").to_string(),
        time: times.iter().map(|t| t.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_add_shows_stores_movie_and_announces_once() {
    let backend = backend();
    let planner = planner(&backend).with_debouncer(AnnouncementDebouncer::new(StdDuration::from_secs(60)));

    let created = planner
        .add_shows("550", &[tomorrow_input(&["10:00", "20:00"])], 1200)
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert!(backend.movies.get_movie("550").await.unwrap().is_some());

    planner.add_shows("550", &[tomorrow_input(&["23:00"])], 1200).await.unwrap();

    let announcements: Vec<Job> = backend
        .jobs
        .scheduled()
        .into_iter()
        .map(|j| j.job)
        .filter(|j| matches!(j, Job::AnnounceShow { .. }))
        .collect();
    assert_eq!(
        announcements,
        vec![Job::AnnounceShow {
            movie_title: "Fight Club".to_string()
        }]
    );
}

#[tokio::test]
async fn test_add_shows_for_unknown_movie_fails_without_shows() {
    let backend = backend();
    let result = planner(&backend).add_shows("999", &[tomorrow_input(&["10:00"])], 1200).await;

    assert!(matches!(result, Err(BookingError::NotFound(_))));
    let listing = ShowListing::new(backend.shows.clone(), backend.movies.clone());
    assert!(listing.upcoming_movies(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_returns_distinct_movies_and_grouped_times() {
    let backend = backend();
    let planner = planner(&backend);
    planner.add_shows("603", &[tomorrow_input(&["09:00"])], 1000).await.unwrap();
    planner.add_shows("550", &[tomorrow_input(&["11:00", "21:00"])], 1000).await.unwrap();

    let listing = ShowListing::new(backend.shows.clone(), backend.movies.clone());
    let now = Utc::now();
    let movies = listing.upcoming_movies(now).await.unwrap();
    let ids: Vec<&str> = movies.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["603", "550"]);

    let schedule = listing.movie_schedule("550", now).await.unwrap();
    assert_eq!(schedule.movie.title, "Fight Club");
    assert_eq!(schedule.date_time.len(), 1);
    assert_eq!(schedule.date_time.values().next().unwrap().len(), 2);

    assert!(matches!(
        listing.movie_schedule("nope", now).await,
        Err(BookingError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_dashboard_counts_only_paid_bookings() {
    let backend = backend();
    backend.movies.save_movie(&sample_movie("550", "Fight Club")).await.unwrap();
    backend
        .users
        .upsert(&UserProfile {
            id: "user1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            image: None,
            favorites: vec![],
        })
        .await
        .unwrap();
    let show = backend.add_show("550", 1000);

    let service = backend.reservation_service();
    let paid = service.reserve(show.id, &["A1", "A2"], "user1").await.unwrap();
    service.reserve(show.id, &["B1"], "user1").await.unwrap();
    backend
        .orchestrator()
        .handle_notification(&PaymentNotification {
            event_type: "checkout.session.completed".to_string(),
            correlation_id: Some(paid.booking_id.to_string()),
            kind: PaymentEventKind::Succeeded,
            amount_cents: Some(2000),
        })
        .await
        .unwrap();

    let dashboard = Dashboard::new(
        backend.shows.clone(),
        backend.ledger.clone(),
        backend.movies.clone(),
        backend.users.clone(),
    );
    let summary = dashboard.summary(Utc::now()).await.unwrap();

    assert_eq!(summary.total_bookings, 1);
    assert_eq!(summary.total_revenue_cents, 2000);
    assert_eq!(summary.total_users, 1);
    assert_eq!(summary.active_shows.len(), 1);
    assert_eq!(summary.active_shows[0].booked_seats.len(), 2);
    assert_eq!(summary.active_shows[0].movie.as_ref().unwrap().title, "Fight Club");

    let bookings = dashboard.all_bookings().await.unwrap();
    assert_eq!(bookings.len(), 2);
    assert!(bookings.iter().all(|b| b.user_name.as_deref() == Some("Ada")));
    assert!(bookings.iter().all(|b| b.movie_title.as_deref() == Some("Fight Club")));
}
