use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use marquee_api::middleware::{issue_token, Claims};
use marquee_api::state::{AuthConfig, WebhookSecrets};
use marquee_api::{app, AppState};
use marquee_booking::memory::{sample_movie, InMemoryBackend, StaticCatalog};
use marquee_core::booking::BookingStatus;
use marquee_core::identity::UserProfile;
use marquee_core::jobs::Job;
use marquee_core::repository::{BookingLedger, MovieStore, UserDirectory};
use marquee_store::webhook::{compute_identity_signature, compute_stripe_signature};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "test-jwt-secret";
const STRIPE_SECRET: &str = "whsec_stripe_test";
// base64 of "identity-test-key"
const IDENTITY_SECRET: &str = "whsec_aWRlbnRpdHktdGVzdC1rZXk=";

fn setup() -> (InMemoryBackend, Router) {
    let backend = InMemoryBackend::with_catalog(StaticCatalog::new().with_movie(sample_movie("550", "Fight Club")));
    let state = AppState::in_memory(
        &backend,
        AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
        },
        WebhookSecrets {
            stripe: STRIPE_SECRET.to_string(),
            identity: IDENTITY_SECRET.to_string(),
            tolerance_seconds: 300,
        },
    )
    .unwrap();
    (backend, app(state))
}

fn token(user_id: &str, role: Option<&str>) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: None,
        role: role.map(str::to_string),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    issue_token(JWT_SECRET, &claims).unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn stripe_event(event_type: &str, booking_id: Uuid) -> String {
    json!({
        "id": "evt_test",
        "type": event_type,
        "data": {
            "object": {
                "id": "cs_test",
                "payment_status": "paid",
                "amount_total": 2000,
                "metadata": { "booking_id": booking_id.to_string() }
            }
        }
    })
    .to_string()
}

fn signed_stripe_request(payload: &str) -> Request<Body> {
    let timestamp = Utc::now().timestamp();
    let signature = compute_stripe_signature(STRIPE_SECRET, timestamp, payload.as_bytes()).unwrap();
    Request::builder()
        .method("POST")
        .uri("/api/stripe")
        .header("stripe-signature", format!("t={},v1={}", timestamp, signature))
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_, app) = setup();
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (_, app) = setup();
    let (status, body) = send(
        &app,
        post_json("/api/booking/create", None, json!({ "show_id": Uuid::new_v4(), "selected_seats": ["A1"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, get("/api/user/favorites", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_refuse_customers() {
    let (_, app) = setup();
    let customer = token("user1", None);
    let (status, _) = send(&app, get("/api/admin/is-admin", Some(&customer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token("boss", Some("ADMIN"));
    let (status, body) = send(&app, get("/api/admin/is-admin", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAdmin"], true);
}

#[tokio::test]
async fn test_reserve_then_conflict_then_occupied() {
    let (backend, app) = setup();
    let show = backend.add_show("550", 1000);
    let user1 = token("user1", None);
    let user2 = token("user2", None);

    let (status, body) = send(
        &app,
        post_json(
            "/api/booking/create",
            Some(&user1),
            json!({ "show_id": show.id, "selected_seats": ["A1", "A2"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(!body["url"].as_str().unwrap().is_empty());
    assert!(body["booking_id"].as_str().unwrap().parse::<Uuid>().is_ok());

    let (status, body) = send(
        &app,
        post_json(
            "/api/booking/create",
            Some(&user2),
            json!({ "show_id": show.id, "selected_seats": ["A2", "A3"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["seats"], json!(["A2"]));

    let (status, body) = send(&app, get(&format!("/api/booking/seats/{}", show.id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["occupied_seats"], json!(["A1", "A2"]));
}

#[tokio::test]
async fn test_reserve_rejects_bad_seat_label() {
    let (backend, app) = setup();
    let show = backend.add_show("550", 1000);
    let user = token("user1", None);

    let (status, _) = send(
        &app,
        post_json(
            "/api/booking/create",
            Some(&user),
            json!({ "show_id": show.id, "selected_seats": ["not a seat"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(backend.ledger.is_empty());
}

#[tokio::test]
async fn test_signed_stripe_webhook_marks_booking_paid() {
    let (backend, app) = setup();
    let show = backend.add_show("550", 1000);
    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["B1", "B2"], "user1")
        .await
        .unwrap();

    let payload = stripe_event("checkout.session.completed", reservation.booking_id);
    let (status, body) = send(&app, signed_stripe_request(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let booking = backend.ledger.get(reservation.booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Paid);
    assert!(booking.payment_link.is_none());
    assert!(backend
        .jobs
        .scheduled()
        .iter()
        .any(|s| s.job == Job::SendBookingConfirmation {
            booking_id: reservation.booking_id
        }));
}

#[tokio::test]
async fn test_stripe_webhook_with_bad_signature_is_rejected() {
    let (backend, app) = setup();
    let show = backend.add_show("550", 1000);
    let reservation = backend
        .reservation_service()
        .reserve(show.id, &["C1"], "user1")
        .await
        .unwrap();

    let payload = stripe_event("checkout.session.completed", reservation.booking_id);
    let req = Request::builder()
        .method("POST")
        .uri("/api/stripe")
        .header("stripe-signature", format!("t={},v1=deadbeef", Utc::now().timestamp()))
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let booking = backend.ledger.get(reservation.booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_stripe_webhook_for_unknown_booking_is_acknowledged() {
    let (_, app) = setup();
    let payload = stripe_event("checkout.session.completed", Uuid::new_v4());
    let (status, _) = send(&app, signed_stripe_request(&payload)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_identity_webhook_queues_user_sync() {
    let (backend, app) = setup();
    let payload = json!({
        "type": "user.created",
        "data": {
            "id": "user_42",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email_addresses": [{ "email_address": "ada@example.com" }],
            "image_url": null
        }
    })
    .to_string();
    let timestamp = Utc::now().timestamp();
    let signature = compute_identity_signature(IDENTITY_SECRET, "msg_1", timestamp, payload.as_bytes()).unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/api/webhooks/identity")
        .header("svix-id", "msg_1")
        .header("svix-timestamp", timestamp.to_string())
        .header("svix-signature", format!("v1,{}", signature))
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let queued: Vec<Job> = backend.jobs.scheduled().into_iter().map(|s| s.job).collect();
    assert_eq!(queued.len(), 1);
    assert!(matches!(&queued[0], Job::SyncUser(_)));
}

#[tokio::test]
async fn test_admin_adds_shows_and_they_are_listed() {
    let (backend, app) = setup();
    let admin = token("boss", Some("ADMIN"));
    let date = (Utc::now() + Duration::days(2)).format("%Y-%m-%d").to_string();

    let (status, body) = send(
        &app,
        post_json(
            "/api/show/add",
            Some(&admin),
            json!({
                "movie_id": "550",
                "shows_input": [{ "date": date, "time": ["18:00", "21:00"] }],
                "show_price": 1200
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(backend.movies.get_movie("550").await.unwrap().is_some());

    let (status, body) = send(&app, get("/api/show/all", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shows"].as_array().unwrap().len(), 1);
    assert_eq!(body["shows"][0]["title"], "Fight Club");

    let (status, body) = send(&app, get("/api/show/550", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movie"]["id"], "550");
    assert_eq!(body["date_time"][date.as_str()].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_favorites_toggle() {
    let (backend, app) = setup();
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
    let user = token("user1", None);

    let (status, body) = send(
        &app,
        post_json("/api/user/update-favorite", Some(&user), json!({ "movie_id": "550" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["favorites"], json!(["550"]));

    let (_, body) = send(&app, get("/api/user/favorites", Some(&user))).await;
    assert_eq!(body["movies"][0]["title"], "Fight Club");

    let (_, body) = send(
        &app,
        post_json("/api/user/update-favorite", Some(&user), json!({ "movie_id": "550" })),
    )
    .await;
    assert_eq!(body["favorites"], json!([]));
}
