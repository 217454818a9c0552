use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::BookingError;
use crate::models::{Booking, BookingStatus, RequesterContact, Slot, TransitionKind};
use crate::services::{availability, lifecycle, slot_clock};
use crate::state::AppState;

/// Per-vehicle claim locks. A claim serializes check-then-insert for
/// one vehicle; claims on different vehicles take different locks and
/// proceed in parallel.
pub struct ClaimLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ClaimLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn for_vehicle(&self, vehicle_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().unwrap();
        Arc::clone(
            locks
                .entry(vehicle_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

impl Default for ClaimLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Request a test drive: policy check, then the atomic slot claim.
pub async fn request_booking(
    state: &AppState,
    vehicle_id: &str,
    instant: NaiveDateTime,
    contact: RequesterContact,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    let slot = slot_clock::ensure_bookable(&state.policy, &now, &instant)?;

    // Reject unknown vehicles before touching the lock registry, so
    // bogus ids never leave an entry behind. The claim transaction
    // re-checks under the lock.
    {
        let db = state.db.lock().unwrap();
        if !queries::vehicle_exists(&db, vehicle_id)? {
            return Err(BookingError::NotFound(format!("vehicle {vehicle_id}")));
        }
    }

    let lock = state.claims.for_vehicle(vehicle_id);
    let _guard = acquire(state, &lock).await?;

    let mut db = state.db.lock().unwrap();
    let booking = claim_tx(&mut db, &state.config, vehicle_id, slot, contact, now)?;
    tracing::info!(
        booking = %booking.id,
        vehicle = %vehicle_id,
        slot = %booking.slot_start,
        "booking requested"
    );
    Ok(booking)
}

pub fn confirm(
    state: &AppState,
    id: &str,
    expected_version: i64,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    transition(state, id, expected_version, lifecycle::LifecycleEvent::Confirm, now)
}

pub fn cancel(
    state: &AppState,
    id: &str,
    expected_version: i64,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    transition(state, id, expected_version, lifecycle::LifecycleEvent::Cancel, now)
}

pub fn complete(
    state: &AppState,
    id: &str,
    expected_version: i64,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    transition(state, id, expected_version, lifecycle::LifecycleEvent::Complete, now)
}

/// Move a booking to a new slot. The original row becomes
/// `rescheduled` and a fresh `requested` row is claimed for the new
/// slot, linked back to the original; both changes commit together or
/// not at all. The rescheduled row stays in the conflict set, so its
/// old slot remains blocked and the new slot must not overlap it.
pub async fn reschedule(
    state: &AppState,
    id: &str,
    expected_version: i64,
    new_instant: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(Booking, Booking), BookingError> {
    let slot = slot_clock::ensure_bookable(&state.policy, &now, &new_instant)?;

    let vehicle_id = {
        let db = state.db.lock().unwrap();
        queries::get_booking_by_id(&db, id)?
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))?
            .vehicle_id
    };

    let lock = state.claims.for_vehicle(&vehicle_id);
    let _guard = acquire(state, &lock).await?;

    let mut db = state.db.lock().unwrap();
    let (old, new) = reschedule_tx(&mut db, &state.config, id, expected_version, slot, now)?;
    tracing::info!(
        from = %old.id,
        to = %new.id,
        vehicle = %vehicle_id,
        slot = %new.slot_start,
        "booking rescheduled"
    );
    Ok((old, new))
}

async fn acquire<'a>(
    state: &AppState,
    lock: &'a tokio::sync::Mutex<()>,
) -> Result<tokio::sync::MutexGuard<'a, ()>, BookingError> {
    tokio::time::timeout(Duration::from_millis(state.config.claim_wait_ms), lock.lock())
        .await
        .map_err(|_| BookingError::Busy)
}

fn claim_tx(
    db: &mut Connection,
    config: &AppConfig,
    vehicle_id: &str,
    slot: Slot,
    contact: RequesterContact,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if !queries::vehicle_exists(&tx, vehicle_id)? {
        return Err(BookingError::NotFound(format!("vehicle {vehicle_id}")));
    }

    let booking = insert_requested(&tx, config, vehicle_id, slot, contact, None, now)?;
    tx.commit()?;
    Ok(booking)
}

fn reschedule_tx(
    db: &mut Connection,
    config: &AppConfig,
    id: &str,
    expected_version: i64,
    slot: Slot,
    now: NaiveDateTime,
) -> Result<(Booking, Booking), BookingError> {
    let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let old = queries::get_booking_by_id(&tx, id)?
        .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))?;
    lifecycle::next_status(old.status, lifecycle::LifecycleEvent::Reschedule)?;

    // Mark the original first; a version miss aborts before any new
    // row is written.
    if !queries::transition_booking(&tx, id, expected_version, BookingStatus::Rescheduled, &now)? {
        return Err(BookingError::StaleState);
    }

    let contact = RequesterContact {
        name: old.customer_name.clone(),
        email: old.customer_email.clone(),
        phone: old.customer_phone.clone(),
    };
    let new = insert_requested(
        &tx,
        config,
        &old.vehicle_id,
        slot,
        contact,
        Some(old.id.clone()),
        now,
    )?;

    queries::enqueue_notification(
        &tx,
        &old.id,
        TransitionKind::Rescheduled,
        &recipients(config, &old.customer_email),
        &now,
    )?;

    let old = queries::get_booking_by_id(&tx, id)?
        .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))?;
    tx.commit()?;
    Ok((old, new))
}

/// Check-then-insert for a `requested` booking plus its notification
/// intent. Runs inside the caller's transaction, under the vehicle's
/// claim lock.
fn insert_requested(
    conn: &Connection,
    config: &AppConfig,
    vehicle_id: &str,
    slot: Slot,
    contact: RequesterContact,
    rescheduled_from: Option<String>,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    if !availability::overlaps(conn, vehicle_id, &slot)?.is_empty() {
        return Err(BookingError::Conflict);
    }

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        vehicle_id: vehicle_id.to_string(),
        slot_start: slot.start,
        slot_minutes: slot.minutes,
        customer_name: contact.name,
        customer_email: contact.email,
        customer_phone: contact.phone,
        status: BookingStatus::Requested,
        rescheduled_from,
        version: 0,
        created_at: now,
        updated_at: now,
    };
    queries::create_booking(conn, &booking)?;
    queries::enqueue_notification(
        conn,
        &booking.id,
        TransitionKind::Requested,
        &recipients(config, &booking.customer_email),
        &now,
    )?;
    Ok(booking)
}

fn transition(
    state: &AppState,
    id: &str,
    expected_version: i64,
    event: lifecycle::LifecycleEvent,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    let mut db = state.db.lock().unwrap();
    let tx = db.transaction()?;

    let booking = queries::get_booking_by_id(&tx, id)?
        .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))?;
    let next = lifecycle::next_status(booking.status, event)?;

    if event == lifecycle::LifecycleEvent::Complete && booking.slot_start > now {
        return Err(BookingError::InvalidTransition(
            "cannot complete a test drive before its slot starts".to_string(),
        ));
    }

    if !queries::transition_booking(&tx, id, expected_version, next, &now)? {
        return Err(BookingError::StaleState);
    }

    queries::enqueue_notification(
        &tx,
        id,
        lifecycle::transition_kind(next),
        &recipients(&state.config, &booking.customer_email),
        &now,
    )?;

    let updated = queries::get_booking_by_id(&tx, id)?
        .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))?;
    tx.commit()?;

    tracing::info!(booking = %id, status = updated.status.as_str(), "booking transitioned");
    Ok(updated)
}

fn recipients(config: &AppConfig, customer_email: &str) -> Vec<String> {
    vec![customer_email.to_string(), config.staff_email.clone()]
}
