use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::BookingError;
use crate::models::{Booking, RequesterContact};
use crate::services::scheduling;
use crate::state::AppState;

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub vehicle_id: String,
    pub start: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub vehicle_id: String,
    pub slot_start: String,
    pub slot_end: String,
    pub slot_minutes: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub status: String,
    pub rescheduled_from: Option<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        BookingResponse {
            slot_end: b.slot().end().format("%Y-%m-%d %H:%M:%S").to_string(),
            id: b.id,
            vehicle_id: b.vehicle_id,
            slot_start: b.slot_start.format("%Y-%m-%d %H:%M:%S").to_string(),
            slot_minutes: b.slot_minutes,
            customer_name: b.customer_name,
            customer_email: b.customer_email,
            customer_phone: b.customer_phone,
            status: b.status.as_str().to_string(),
            rescheduled_from: b.rescheduled_from,
            version: b.version,
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            updated_at: b.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub fn parse_instant(s: &str) -> Result<NaiveDateTime, BookingError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .map_err(|_| BookingError::OutOfPolicy(format!("unrecognized start time: {s}")))
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), BookingError> {
    let start = parse_instant(&body.start)?;
    let contact = RequesterContact {
        name: body.name,
        email: body.email,
        phone: body.phone,
    };

    let now = chrono::Utc::now().naive_utc();
    let booking = scheduling::request_booking(&state, &body.vehicle_id, start, contact, now).await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}
