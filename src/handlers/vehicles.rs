use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::BookingError;
use crate::handlers::bookings::parse_instant;
use crate::services::availability;
use crate::state::AppState;

// GET /api/vehicles
#[derive(Serialize)]
pub struct VehicleResponse {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
}

pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<VehicleResponse>>, BookingError> {
    let vehicles = {
        let db = state.db.lock().unwrap();
        queries::list_vehicles(&db)?
    };

    Ok(Json(
        vehicles
            .into_iter()
            .map(|v| VehicleResponse {
                id: v.id,
                make: v.make,
                model: v.model,
                year: v.year,
            })
            .collect(),
    ))
}

// GET /api/vehicles/:id/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Serialize)]
pub struct OccupiedSlotResponse {
    pub start: String,
    pub end: String,
}

/// Occupied slots for calendar display. Advisory only: the claim
/// transaction is the source of truth for conflicts.
pub async fn list_availability(
    State(state): State<Arc<AppState>>,
    Path(vehicle_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<OccupiedSlotResponse>>, BookingError> {
    let now = chrono::Utc::now().naive_utc();
    let from = match &query.from {
        Some(s) => parse_instant(s)?,
        None => now,
    };
    let to = match &query.to {
        Some(s) => parse_instant(s)?,
        None => from + Duration::days(14),
    };

    let slots = {
        let db = state.db.lock().unwrap();
        if !queries::vehicle_exists(&db, &vehicle_id)? {
            return Err(BookingError::NotFound(format!("vehicle {vehicle_id}")));
        }
        availability::occupied(&db, &vehicle_id, &from, &to)?
    };

    Ok(Json(
        slots
            .into_iter()
            .map(|s| OccupiedSlotResponse {
                start: s.start.format("%Y-%m-%d %H:%M:%S").to_string(),
                end: s.end().format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .collect(),
    ))
}
