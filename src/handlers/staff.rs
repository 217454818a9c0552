use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::handlers::bookings::{parse_instant, BookingResponse};
use crate::models::Vehicle;
use crate::services::scheduling;
use crate::state::AppState;

#[allow(clippy::result_large_err)]
fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response());
    }
    Ok(())
}

// GET /api/staff/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, Response> {
    check_auth(&headers, &state.config.staff_token)?;

    let limit = query.limit.unwrap_or(50);
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, query.status.as_deref(), limit)
            .map_err(|e| crate::errors::BookingError::from(e).into_response())?
    };

    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

/// Body for the plain lifecycle transitions. The version is the
/// optimistic-concurrency token from the staff member's last read.
#[derive(Deserialize)]
pub struct TransitionRequest {
    pub version: i64,
}

// POST /api/staff/bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<BookingResponse>, Response> {
    check_auth(&headers, &state.config.staff_token)?;

    let now = Utc::now().naive_utc();
    let booking = scheduling::confirm(&state, &id, body.version, now)
        .map_err(IntoResponse::into_response)?;
    Ok(Json(booking.into()))
}

// POST /api/staff/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<BookingResponse>, Response> {
    check_auth(&headers, &state.config.staff_token)?;

    let now = Utc::now().naive_utc();
    let booking = scheduling::cancel(&state, &id, body.version, now)
        .map_err(IntoResponse::into_response)?;
    Ok(Json(booking.into()))
}

// POST /api/staff/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<BookingResponse>, Response> {
    check_auth(&headers, &state.config.staff_token)?;

    let now = Utc::now().naive_utc();
    let booking = scheduling::complete(&state, &id, body.version, now)
        .map_err(IntoResponse::into_response)?;
    Ok(Json(booking.into()))
}

// POST /api/staff/bookings/:id/reschedule
#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub version: i64,
    pub new_start: String,
}

#[derive(serde::Serialize)]
pub struct RescheduleResponse {
    pub original: BookingResponse,
    pub replacement: BookingResponse,
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RescheduleRequest>,
) -> Result<Json<RescheduleResponse>, Response> {
    check_auth(&headers, &state.config.staff_token)?;

    let new_start = parse_instant(&body.new_start).map_err(IntoResponse::into_response)?;
    let now = Utc::now().naive_utc();
    let (original, replacement) = scheduling::reschedule(&state, &id, body.version, new_start, now)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(RescheduleResponse {
        original: original.into(),
        replacement: replacement.into(),
    }))
}

// POST /api/staff/vehicles
#[derive(Deserialize)]
pub struct CreateVehicleRequest {
    pub id: Option<String>,
    pub make: String,
    pub model: String,
    pub year: i32,
}

pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), Response> {
    check_auth(&headers, &state.config.staff_token)?;

    let vehicle = Vehicle {
        id: body.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        make: body.make,
        model: body.model,
        year: body.year,
        is_active: true,
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db.lock().unwrap();
        let taken = queries::get_vehicle(&db, &vehicle.id)
            .map_err(|e| crate::errors::BookingError::from(e).into_response())?;
        if taken.is_some() {
            return Err((
                StatusCode::CONFLICT,
                Json(serde_json::json!({
                    "error": format!("vehicle {} already exists", vehicle.id)
                })),
            )
                .into_response());
        }
        queries::insert_vehicle(&db, &vehicle)
            .map_err(|e| crate::errors::BookingError::from(e).into_response())?;
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": vehicle.id})),
    ))
}
