use chrono::{Duration, Utc};
use marquee_booking::memory::{sample_movie, InMemoryBackend};
use marquee_booking::notifications::DeliveryReport;
use marquee_booking::user_sync::SyncOutcome;
use marquee_booking::DispatchOutcome;
use marquee_core::identity::{DeletedUser, EmailAddress, IdentityUser, UserEvent, UserProfile};
use marquee_core::jobs::Job;
use marquee_core::payment::{PaymentEventKind, PaymentNotification};
use marquee_core::repository::{MovieStore, UserDirectory};
use marquee_core::show::Show;
use uuid::Uuid;

fn profile(id: &str, name: &str, email: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        image: None,
        favorites: Vec::new(),
    }
}

fn succeeded(booking_id: Uuid) -> PaymentNotification {
    PaymentNotification {
        event_type: "payment_intent.succeeded".to_string(),
        correlation_id: Some(booking_id.to_string()),
        kind: PaymentEventKind::Succeeded,
        amount_cents: None,
    }
}

#[tokio::test]
async fn test_confirmation_email_sent_after_payment() {
    let backend = InMemoryBackend::new();
    backend.movies.save_movie(&sample_movie("550", "Fight Club")).await.unwrap();
    backend.users.upsert(&profile("user1", "Ada", "ada@example.com")).await.unwrap();
    let show = backend.add_show("550", 1500);

    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["A1"], "user1")
        .await
        .unwrap();
    backend.orchestrator().handle_notification(&succeeded(reservation.booking_id)).await.unwrap();

    let results = backend.run_due_jobs(Utc::now()).await;
    assert!(results.contains(&Ok(DispatchOutcome::Confirmation { sent: true })));

    let sent = backend.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].subject, "Payment Confirmation: \"Fight Club\" booked!");
    assert!(sent[0].html.contains("Ada"));
    assert!(sent[0].html.contains("A1"));
}

#[tokio::test]
async fn test_confirmation_skips_unpaid_booking() {
    let backend = InMemoryBackend::new();
    backend.users.upsert(&profile("user1", "Ada", "ada@example.com")).await.unwrap();
    let show = backend.add_show("550", 1500);
    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["A1"], "user1")
        .await
        .unwrap();

    let sent = backend.notifier().send_booking_confirmation(reservation.booking_id).await.unwrap();
    assert!(!sent);
    assert!(backend.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_reminders_go_to_paying_holders_in_window() {
    let backend = InMemoryBackend::new();
    backend.movies.save_movie(&sample_movie("550", "Fight Club")).await.unwrap();
    backend.users.upsert(&profile("payer", "Pat", "pat@example.com")).await.unwrap();
    backend.users.upsert(&profile("lurker", "Lou", "lou@example.com")).await.unwrap();

    let now = Utc::now();
    let soon = Show {
        id: Uuid::new_v4(),
        movie_id: "550".to_string(),
        starts_at: now + Duration::hours(8) - Duration::minutes(5),
        price_cents: 1000,
        created_at: now,
    };
    let later = Show {
        id: Uuid::new_v4(),
        starts_at: now + Duration::hours(20),
        ..soon.clone()
    };
    backend.shows.insert_show(soon.clone());
    backend.shows.insert_show(later.clone());

    let service = backend.reservation_service();
    let orchestrator = backend.orchestrator();
    for (show, seat) in [(&soon, "A1"), (&soon, "A2"), (&later, "A1")] {
        let r = service.reserve(show.id, &[seat], "payer").await.unwrap();
        orchestrator.handle_notification(&succeeded(r.booking_id)).await.unwrap();
    }
    // Pending hold in the window: not a paying customer yet.
    service.reserve(soon.id, &["B1"], "lurker").await.unwrap();

    let report = backend.notifier().send_show_reminders(now).await.unwrap();
    assert_eq!(report, DeliveryReport { sent: 1, failed: 0 });

    let sent = backend.mailer.sent();
    assert_eq!(sent[0].to, "pat@example.com");
    assert_eq!(sent[0].subject, "Reminder: \"Fight Club\" starts soon");
}

#[tokio::test]
async fn test_announcement_counts_failed_deliveries() {
    let backend = InMemoryBackend::new();
    backend.users.upsert(&profile("u1", "One", "one@example.com")).await.unwrap();
    backend.users.upsert(&profile("u2", "Two", "two@example.com")).await.unwrap();
    backend.mailer.reject("two@example.com");

    let report = backend.notifier().announce_show("Dune").await.unwrap();

    assert_eq!(report, DeliveryReport { sent: 1, failed: 1 });
    assert_eq!(backend.mailer.sent()[0].subject, "New Show Added: Dune");
}

#[tokio::test]
async fn test_user_sync_lifecycle_keeps_favorites() {
    let backend = InMemoryBackend::new();
    let dispatcher = backend.dispatcher();
    let user = IdentityUser {
        id: "user_9".to_string(),
        first_name: Some("Grace".to_string()),
        last_name: Some("Hopper".to_string()),
        email_addresses: vec![EmailAddress {
            email_address: "grace@example.com".to_string(),
        }],
        image_url: None,
    };

    let created = dispatcher.dispatch(&Job::SyncUser(UserEvent::Created(user.clone()))).await.unwrap();
    assert_eq!(created, DispatchOutcome::UserSynced(SyncOutcome::Upserted("user_9".to_string())));
    backend.users.toggle_favorite("user_9", "550").await.unwrap();

    let renamed = IdentityUser {
        last_name: Some("Murray Hopper".to_string()),
        ..user
    };
    dispatcher.dispatch(&Job::SyncUser(UserEvent::Updated(renamed))).await.unwrap();
    let stored = backend.users.get("user_9").await.unwrap().unwrap();
    assert_eq!(stored.name, "Grace Murray Hopper");
    assert_eq!(stored.favorites, vec!["550".to_string()]);

    dispatcher
        .dispatch(&Job::SyncUser(UserEvent::Deleted(DeletedUser {
            id: "user_9".to_string(),
        })))
        .await
        .unwrap();
    assert!(backend.users.get("user_9").await.unwrap().is_none());
}

#[tokio::test]
async fn test_user_without_email_is_skipped() {
    let backend = InMemoryBackend::new();
    let user = IdentityUser {
        id: "user_x".to_string(),
        first_name: None,
        last_name: None,
        email_addresses: vec![],
        image_url: None,
    };

    let outcome = backend
        .dispatcher()
        .dispatch(&Job::SyncUser(UserEvent::Created(user)))
        .await
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::UserSynced(SyncOutcome::Skipped("user_x".to_string())));
    assert_eq!(backend.users.count().await.unwrap(), 0);
}
