use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceExt;

use testdrive::config::AppConfig;
use testdrive::db::{self, queries};
use testdrive::handlers;
use testdrive::models::{BookingPolicy, Vehicle};
use testdrive::services::notifier::{self, MailProvider};
use testdrive::services::scheduling::ClaimLocks;
use testdrive::state::AppState;

// ── Mock Providers ──

struct MockMailer {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl MailProvider for MockMailer {
    async fn send_email(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        staff_token: "test-token".to_string(),
        business_start: "09:00".to_string(),
        business_end: "17:00".to_string(),
        days_open: "mon,tue,wed,thu,fri,sat".to_string(),
        slot_minutes: 60,
        claim_wait_ms: 200,
        notify_poll_secs: 5,
        notify_backoff_secs: 60,
        notify_max_attempts: 3,
        staff_email: "staff@example.com".to_string(),
        from_email: "noreply@example.com".to_string(),
        mailgun_domain: "".to_string(),
        mailgun_api_key: "".to_string(),
    }
}

fn test_state() -> Arc<AppState> {
    test_state_with_sent().0
}

fn test_state_with_sent() -> (Arc<AppState>, Arc<Mutex<Vec<(String, String)>>>) {
    let config = test_config();
    let policy = BookingPolicy::from_config(&config).unwrap();
    let conn = db::init_db(":memory:").unwrap();

    queries::insert_vehicle(
        &conn,
        &Vehicle {
            id: "v1".to_string(),
            make: "Mazda".to_string(),
            model: "MX-5".to_string(),
            year: 2024,
            is_active: true,
            created_at: chrono::Utc::now().naive_utc(),
        },
    )
    .unwrap();

    let sent = Arc::new(Mutex::new(vec![]));
    let mailer = MockMailer {
        sent: Arc::clone(&sent),
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
        policy,
        mailer: Box::new(mailer),
        claims: ClaimLocks::new(),
    });
    (state, sent)
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/vehicles", get(handlers::vehicles::list_vehicles))
        .route(
            "/api/vehicles/:id/availability",
            get(handlers::vehicles::list_availability),
        )
        .route("/api/staff/bookings", get(handlers::staff::list_bookings))
        .route(
            "/api/staff/bookings/:id/confirm",
            post(handlers::staff::confirm_booking),
        )
        .route(
            "/api/staff/bookings/:id/cancel",
            post(handlers::staff::cancel_booking),
        )
        .route(
            "/api/staff/bookings/:id/complete",
            post(handlers::staff::complete_booking),
        )
        .route(
            "/api/staff/bookings/:id/reschedule",
            post(handlers::staff::reschedule_booking),
        )
        .route("/api/staff/vehicles", post(handlers::staff::create_vehicle))
        .route(
            "/calendar/:booking_id",
            get(handlers::calendar::download_ics),
        )
        .with_state(state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn staff_post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", "Bearer test-token")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Book v1 at the given start time via the public API, returning the
/// response body. Dates are in the future because the handlers use the
/// real clock for their policy checks.
async fn book(state: Arc<AppState>, start: &str) -> (StatusCode, serde_json::Value) {
    let app = test_app(state);
    let res = app
        .oneshot(post_json(
            "/api/bookings",
            serde_json::json!({
                "vehicle_id": "v1",
                "start": start,
                "name": "Alice",
                "email": "alice@example.com",
            }),
        ))
        .await
        .unwrap();
    let status = res.status();
    (status, json_body(res).await)
}

// 2030-03-11 is a Monday.
const MONDAY_10AM: &str = "2030-03-11 10:00:00";
const SUNDAY_10AM: &str = "2030-03-10 10:00:00";

// ── Health ──

#[tokio::test]
async fn test_health() {
    let app = test_app(test_state());
    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// ── Public booking API ──

#[tokio::test]
async fn test_create_booking() {
    let state = test_state();
    let (status, json) = book(state.clone(), MONDAY_10AM).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["vehicle_id"], "v1");
    assert_eq!(json["status"], "requested");
    assert_eq!(json["slot_start"], "2030-03-11 10:00:00");
    assert_eq!(json["slot_end"], "2030-03-11 11:00:00");
    assert_eq!(json["version"], 0);
    assert_eq!(json["rescheduled_from"], serde_json::Value::Null);

    // the request queued a notification intent in the same commit
    let db = state.db.lock().unwrap();
    let intents =
        queries::notifications_for_booking(&db, json["id"].as_str().unwrap()).unwrap();
    assert_eq!(intents.len(), 1);
    assert_eq!(
        intents[0].recipients,
        vec!["alice@example.com".to_string(), "staff@example.com".to_string()]
    );
}

#[tokio::test]
async fn test_create_booking_conflict() {
    let state = test_state();
    let (status, _) = book(state.clone(), MONDAY_10AM).await;
    assert_eq!(status, StatusCode::CREATED);

    // overlapping slot on the same vehicle
    let (status, json) = book(state, MONDAY_10AM).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("already booked"));
}

#[tokio::test]
async fn test_create_booking_unknown_vehicle() {
    let app = test_app(test_state());
    let res = app
        .oneshot(post_json(
            "/api/bookings",
            serde_json::json!({
                "vehicle_id": "no-such-car",
                "start": MONDAY_10AM,
                "name": "Alice",
                "email": "alice@example.com",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_booking_rejects_closed_day() {
    let (status, json) = book(test_state(), SUNDAY_10AM).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("we're open"));
}

#[tokio::test]
async fn test_create_booking_rejects_past() {
    let (status, _) = book(test_state(), "2020-03-09 10:00:00").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_create_booking_rejects_misaligned_start() {
    let (status, _) = book(test_state(), "2030-03-11 10:17:00").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ── Staff auth ──

#[tokio::test]
async fn test_staff_requires_auth() {
    let app = test_app(test_state());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/staff/bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_staff_wrong_token() {
    let app = test_app(test_state());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/staff/bookings")
                .header("Authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

// ── Lifecycle over HTTP ──

#[tokio::test]
async fn test_confirm_booking() {
    let state = test_state();
    let (_, json) = book(state.clone(), MONDAY_10AM).await;
    let id = json["id"].as_str().unwrap().to_string();

    let app = test_app(state);
    let res = app
        .oneshot(staff_post_json(
            &format!("/api/staff/bookings/{id}/confirm"),
            serde_json::json!({"version": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let json = json_body(res).await;
    assert_eq!(json["status"], "confirmed");
    assert_eq!(json["version"], 1);
}

#[tokio::test]
async fn test_stale_version_rejected() {
    let state = test_state();
    let (_, json) = book(state.clone(), MONDAY_10AM).await;
    let id = json["id"].as_str().unwrap().to_string();

    let app = test_app(state.clone());
    let res = app
        .oneshot(staff_post_json(
            &format!("/api/staff/bookings/{id}/confirm"),
            serde_json::json!({"version": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // replay with the pre-confirm version token
    let app = test_app(state);
    let res = app
        .oneshot(staff_post_json(
            &format!("/api/staff/bookings/{id}/cancel"),
            serde_json::json!({"version": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_complete_before_slot_rejected() {
    let state = test_state();
    let (_, json) = book(state.clone(), MONDAY_10AM).await;
    let id = json["id"].as_str().unwrap().to_string();

    let app = test_app(state.clone());
    let res = app
        .oneshot(staff_post_json(
            &format!("/api/staff/bookings/{id}/confirm"),
            serde_json::json!({"version": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // the slot is years away, completion must wait for it
    let app = test_app(state);
    let res = app
        .oneshot(staff_post_json(
            &format!("/api/staff/bookings/{id}/complete"),
            serde_json::json!({"version": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_releases_slot() {
    let state = test_state();
    let (_, json) = book(state.clone(), MONDAY_10AM).await;
    let id = json["id"].as_str().unwrap().to_string();

    let app = test_app(state.clone());
    let res = app
        .oneshot(staff_post_json(
            &format!("/api/staff/bookings/{id}/cancel"),
            serde_json::json!({"version": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["status"], "canceled");

    // the slot is bookable again
    let (status, _) = book(state, MONDAY_10AM).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_reschedule_booking() {
    let state = test_state();
    let (_, json) = book(state.clone(), MONDAY_10AM).await;
    let id = json["id"].as_str().unwrap().to_string();

    let app = test_app(state.clone());
    let res = app
        .oneshot(staff_post_json(
            &format!("/api/staff/bookings/{id}/reschedule"),
            serde_json::json!({"version": 0, "new_start": "2030-03-12 14:00:00"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let json = json_body(res).await;
    assert_eq!(json["original"]["status"], "rescheduled");
    assert_eq!(json["replacement"]["status"], "requested");
    assert_eq!(json["replacement"]["slot_start"], "2030-03-12 14:00:00");
    assert_eq!(json["replacement"]["rescheduled_from"], id);

    // the rescheduled row keeps its claim on the old slot
    let (status, _) = book(state, MONDAY_10AM).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_staff_list_bookings_filters_by_status() {
    let state = test_state();
    let (_, a) = book(state.clone(), MONDAY_10AM).await;
    let (_, _b) = book(state.clone(), "2030-03-11 11:00:00").await;

    let app = test_app(state.clone());
    app.oneshot(staff_post_json(
        &format!("/api/staff/bookings/{}/confirm", a["id"].as_str().unwrap()),
        serde_json::json!({"version": 0}),
    ))
    .await
    .unwrap();

    let app = test_app(state);
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/staff/bookings?status=confirmed")
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let json = json_body(res).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], a["id"]);
}

// ── Vehicles & availability ──

#[tokio::test]
async fn test_list_vehicles() {
    let app = test_app(test_state());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/vehicles")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let json = json_body(res).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["make"], "Mazda");
}

#[tokio::test]
async fn test_create_vehicle_then_book_it() {
    let state = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(staff_post_json(
            "/api/staff/vehicles",
            serde_json::json!({"id": "v2", "make": "Volvo", "model": "EX30", "year": 2025}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(json_body(res).await["id"], "v2");

    let app = test_app(state);
    let res = app
        .oneshot(post_json(
            "/api/bookings",
            serde_json::json!({
                "vehicle_id": "v2",
                "start": MONDAY_10AM,
                "name": "Bob",
                "email": "bob@example.com",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_vehicle_duplicate_id_conflicts() {
    let state = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(staff_post_json(
            "/api/staff/vehicles",
            serde_json::json!({"id": "v1", "make": "Mazda", "model": "MX-5", "year": 2024}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let json = json_body(res).await;
    assert!(json["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_availability_lists_occupied_slots() {
    let state = test_state();
    let (_, json) = book(state.clone(), MONDAY_10AM).await;
    let id = json["id"].as_str().unwrap().to_string();
    let (_, _) = book(state.clone(), "2030-03-11 13:00:00").await;

    // cancel the first one; it should drop out of the occupied set
    let app = test_app(state.clone());
    app.oneshot(staff_post_json(
        &format!("/api/staff/bookings/{id}/cancel"),
        serde_json::json!({"version": 0}),
    ))
    .await
    .unwrap();

    let app = test_app(state);
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/vehicles/v1/availability?from=2030-03-11%2000:00:00&to=2030-03-12%2000:00:00")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let json = json_body(res).await;
    let slots = json.as_array().unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0]["start"], "2030-03-11 13:00:00");
    assert_eq!(slots[0]["end"], "2030-03-11 14:00:00");
}

#[tokio::test]
async fn test_availability_unknown_vehicle() {
    let app = test_app(test_state());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/vehicles/ghost/availability")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── Calendar ──

#[tokio::test]
async fn test_calendar_download() {
    let state = test_state();
    let (_, json) = book(state.clone(), MONDAY_10AM).await;
    let id = json["id"].as_str().unwrap().to_string();

    let app = test_app(state);
    let res = app
        .oneshot(
            Request::builder()
                .uri(format!("/calendar/{id}.ics"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/calendar; charset=utf-8"
    );

    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let ics = String::from_utf8(body.to_vec()).unwrap();
    assert!(ics.contains("BEGIN:VCALENDAR"));
    assert!(ics.contains("SUMMARY:Test drive: 2024 Mazda MX-5"));
    assert!(ics.contains("DTSTART:20300311T100000"));
}

#[tokio::test]
async fn test_calendar_unknown_booking() {
    let app = test_app(test_state());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/calendar/nope.ics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── Notification delivery ──

#[tokio::test]
async fn test_intents_delivered_after_transitions() {
    let (state, sent) = test_state_with_sent();
    let (_, json) = book(state.clone(), MONDAY_10AM).await;
    let id = json["id"].as_str().unwrap().to_string();

    let app = test_app(state.clone());
    app.oneshot(staff_post_json(
        &format!("/api/staff/bookings/{id}/confirm"),
        serde_json::json!({"version": 0}),
    ))
    .await
    .unwrap();

    let now = chrono::Utc::now().naive_utc() + chrono::Duration::seconds(1);
    let delivered = notifier::deliver_due(&state, now).await.unwrap();
    assert_eq!(delivered, 2);

    let sent = sent.lock().unwrap();
    // requested + confirmed, each to customer and staff
    assert_eq!(sent.len(), 4);
    assert!(sent.iter().any(|(to, _)| to == "alice@example.com"));
    assert!(sent.iter().any(|(to, _)| to == "staff@example.com"));
    assert!(sent
        .iter()
        .any(|(_, subject)| subject.contains("Test Drive Confirmed")));
}
