use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingStatus, NotificationIntent, NotificationStatus, Slot, TransitionKind, Vehicle,
};

const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}

fn parse_dt(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DT_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid datetime in database: {s}: {e}"))
}

// ── Vehicles ──

pub fn insert_vehicle(conn: &Connection, vehicle: &Vehicle) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO vehicles (id, make, model, year, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            vehicle.id,
            vehicle.make,
            vehicle.model,
            vehicle.year,
            vehicle.is_active as i32,
            fmt_dt(&vehicle.created_at),
        ],
    )?;
    Ok(())
}

pub fn vehicle_exists(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM vehicles WHERE id = ?1 AND is_active = 1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_vehicle(conn: &Connection, id: &str) -> anyhow::Result<Option<Vehicle>> {
    let result = conn.query_row(
        "SELECT id, make, model, year, is_active, created_at FROM vehicles WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    );

    match result {
        Ok((id, make, model, year, is_active, created_at)) => Ok(Some(Vehicle {
            id,
            make,
            model,
            year,
            is_active: is_active != 0,
            created_at: parse_dt(&created_at)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_vehicles(conn: &Connection) -> anyhow::Result<Vec<Vehicle>> {
    let mut stmt = conn.prepare(
        "SELECT id, make, model, year, is_active, created_at
         FROM vehicles WHERE is_active = 1 ORDER BY year DESC, make ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i32>(3)?,
            row.get::<_, i32>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut vehicles = vec![];
    for row in rows {
        let (id, make, model, year, is_active, created_at) = row?;
        vehicles.push(Vehicle {
            id,
            make,
            model,
            year,
            is_active: is_active != 0,
            created_at: parse_dt(&created_at)?,
        });
    }
    Ok(vehicles)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, vehicle_id, slot_start, slot_minutes, customer_name, \
     customer_email, customer_phone, status, rescheduled_from, version, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, vehicle_id, slot_start, slot_end, slot_minutes,
             customer_name, customer_email, customer_phone, status, rescheduled_from,
             version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            booking.id,
            booking.vehicle_id,
            fmt_dt(&booking.slot_start),
            fmt_dt(&booking.slot().end()),
            booking.slot_minutes,
            booking.customer_name,
            booking.customer_email,
            booking.customer_phone,
            booking.status.as_str(),
            booking.rescheduled_from,
            booking.version,
            fmt_dt(&booking.created_at),
            fmt_dt(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(read_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings holding a live claim whose interval intersects `slot`.
/// Must run inside the same transaction as the insert it guards.
pub fn overlapping_active(
    conn: &Connection,
    vehicle_id: &str,
    slot: &Slot,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE vehicle_id = ?1
           AND status IN ('requested', 'confirmed', 'rescheduled')
           AND slot_start < ?2 AND slot_end > ?3
         ORDER BY slot_start ASC"
    ))?;

    let rows = stmt.query_map(
        params![vehicle_id, fmt_dt(&slot.end()), fmt_dt(&slot.start)],
        |row| Ok(read_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Advisory listing of occupied slots for calendar display; not part
/// of the claim transaction.
pub fn occupied_slots(
    conn: &Connection,
    vehicle_id: &str,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> anyhow::Result<Vec<Slot>> {
    let mut stmt = conn.prepare(
        "SELECT slot_start, slot_minutes FROM bookings
         WHERE vehicle_id = ?1
           AND status IN ('requested', 'confirmed', 'rescheduled')
           AND slot_start < ?2 AND slot_end > ?3
         ORDER BY slot_start ASC",
    )?;

    let rows = stmt.query_map(params![vehicle_id, fmt_dt(to), fmt_dt(from)], |row| {
        let start: String = row.get(0)?;
        let minutes: i64 = row.get(1)?;
        Ok((start, minutes))
    })?;

    let mut slots = vec![];
    for row in rows {
        let (start, minutes) = row?;
        slots.push(Slot {
            start: parse_dt(&start)?,
            minutes,
        });
    }
    Ok(slots)
}

pub fn list_bookings(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE status = ?1 ORDER BY slot_start DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY slot_start DESC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(read_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Optimistic-concurrency status update: succeeds only when the row
/// still carries `expected_version`. Returns false on a version miss.
pub fn transition_booking(
    conn: &Connection,
    id: &str,
    expected_version: i64,
    new_status: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings
         SET status = ?1, version = version + 1, updated_at = ?2
         WHERE id = ?3 AND version = ?4",
        params![new_status.as_str(), fmt_dt(now), id, expected_version],
    )?;
    Ok(count > 0)
}

fn read_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let vehicle_id: String = row.get(1)?;
    let slot_start: String = row.get(2)?;
    let slot_minutes: i64 = row.get(3)?;
    let customer_name: String = row.get(4)?;
    let customer_email: String = row.get(5)?;
    let customer_phone: Option<String> = row.get(6)?;
    let status: String = row.get(7)?;
    let rescheduled_from: Option<String> = row.get(8)?;
    let version: i64 = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Booking {
        id,
        vehicle_id,
        slot_start: parse_dt(&slot_start)?,
        slot_minutes,
        customer_name,
        customer_email,
        customer_phone,
        status: BookingStatus::parse(&status),
        rescheduled_from,
        version,
        created_at: parse_dt(&created_at)?,
        updated_at: parse_dt(&updated_at)?,
    })
}

// ── Notifications ──

/// Durably queue a notification intent. The `(booking_id, kind)`
/// uniqueness makes re-enqueueing the same transition a no-op.
pub fn enqueue_notification(
    conn: &Connection,
    booking_id: &str,
    kind: TransitionKind,
    recipients: &[String],
    now: &NaiveDateTime,
) -> anyhow::Result<()> {
    let recipients_json = serde_json::to_string(recipients)?;
    conn.execute(
        "INSERT INTO notifications (booking_id, kind, recipients, next_attempt_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT (booking_id, kind) DO NOTHING",
        params![booking_id, kind.as_str(), recipients_json, fmt_dt(now)],
    )?;
    Ok(())
}

pub fn due_notifications(
    conn: &Connection,
    now: &NaiveDateTime,
    limit: i64,
) -> anyhow::Result<Vec<NotificationIntent>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, kind, recipients, status, attempts, next_attempt_at,
                last_error, created_at, sent_at
         FROM notifications
         WHERE status = 'pending' AND next_attempt_at <= ?1
         ORDER BY next_attempt_at ASC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![fmt_dt(now), limit], |row| {
        Ok(read_notification_row(row))
    })?;

    let mut intents = vec![];
    for row in rows {
        intents.push(row??);
    }
    Ok(intents)
}

pub fn notifications_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<NotificationIntent>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, kind, recipients, status, attempts, next_attempt_at,
                last_error, created_at, sent_at
         FROM notifications WHERE booking_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![booking_id], |row| Ok(read_notification_row(row)))?;

    let mut intents = vec![];
    for row in rows {
        intents.push(row??);
    }
    Ok(intents)
}

pub fn mark_notification_sent(
    conn: &Connection,
    id: i64,
    now: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE notifications
         SET status = 'sent', attempts = attempts + 1, sent_at = ?1, last_error = NULL
         WHERE id = ?2",
        params![fmt_dt(now), id],
    )?;
    Ok(())
}

pub fn record_notification_failure(
    conn: &Connection,
    id: i64,
    error: &str,
    next_attempt_at: &NaiveDateTime,
    give_up: bool,
) -> anyhow::Result<()> {
    let status = if give_up { "failed" } else { "pending" };
    conn.execute(
        "UPDATE notifications
         SET status = ?1, attempts = attempts + 1, last_error = ?2, next_attempt_at = ?3
         WHERE id = ?4",
        params![status, error, fmt_dt(next_attempt_at), id],
    )?;
    Ok(())
}

fn read_notification_row(row: &rusqlite::Row) -> anyhow::Result<NotificationIntent> {
    let id: i64 = row.get(0)?;
    let booking_id: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let recipients_json: String = row.get(3)?;
    let status: String = row.get(4)?;
    let attempts: i64 = row.get(5)?;
    let next_attempt_at: String = row.get(6)?;
    let last_error: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    let sent_at: Option<String> = row.get(9)?;

    let recipients: Vec<String> = serde_json::from_str(&recipients_json).unwrap_or_default();

    Ok(NotificationIntent {
        id,
        booking_id,
        kind: TransitionKind::parse(&kind),
        recipients,
        status: NotificationStatus::parse(&status),
        attempts,
        next_attempt_at: parse_dt(&next_attempt_at)?,
        last_error,
        created_at: parse_dt(&created_at)?,
        sent_at: sent_at.as_deref().map(parse_dt).transpose()?,
    })
}
