use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Booking, Slot};

/// Conflict query used by the claim: active bookings on `vehicle_id`
/// whose slot intersects `slot`. The caller is responsible for running
/// this inside the same transaction as the insert it protects.
pub fn overlaps(conn: &Connection, vehicle_id: &str, slot: &Slot) -> anyhow::Result<Vec<Booking>> {
    queries::overlapping_active(conn, vehicle_id, slot)
}

/// Advisory listing of occupied slots for calendar display. Read
/// outside the claim path; may be momentarily stale.
pub fn occupied(
    conn: &Connection,
    vehicle_id: &str,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> anyhow::Result<Vec<Slot>> {
    queries::occupied_slots(conn, vehicle_id, from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Booking, BookingStatus, Vehicle};

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::insert_vehicle(
            &conn,
            &Vehicle {
                id: "v1".to_string(),
                make: "Porsche".to_string(),
                model: "911".to_string(),
                year: 1984,
                is_active: true,
                created_at: dt("2025-01-01 00:00"),
            },
        )
        .unwrap();
        conn
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn seed_booking(conn: &Connection, id: &str, start: &str, status: BookingStatus) {
        queries::create_booking(
            conn,
            &Booking {
                id: id.to_string(),
                vehicle_id: "v1".to_string(),
                slot_start: dt(start),
                slot_minutes: 60,
                customer_name: "Alice".to_string(),
                customer_email: "alice@example.com".to_string(),
                customer_phone: None,
                status,
                rescheduled_from: None,
                version: 0,
                created_at: dt("2025-03-01 09:00"),
                updated_at: dt("2025-03-01 09:00"),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_overlaps_reports_active_only() {
        let conn = setup_db();
        seed_booking(&conn, "b1", "2025-03-10 10:00", BookingStatus::Confirmed);
        seed_booking(&conn, "b2", "2025-03-10 11:00", BookingStatus::Canceled);
        seed_booking(&conn, "b3", "2025-03-10 12:00", BookingStatus::Rescheduled);
        seed_booking(&conn, "b4", "2025-03-10 13:00", BookingStatus::Completed);

        // rescheduled rows keep their claim; canceled and completed
        // rows release it
        let hit = Slot {
            start: dt("2025-03-10 10:30"),
            minutes: 240,
        };
        let found = overlaps(&conn, "v1", &hit).unwrap();
        let ids: Vec<_> = found.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b3"]);
    }

    #[test]
    fn test_occupied_ordered_by_start() {
        let conn = setup_db();
        seed_booking(&conn, "b1", "2025-03-10 14:00", BookingStatus::Requested);
        seed_booking(&conn, "b2", "2025-03-10 10:00", BookingStatus::Confirmed);
        seed_booking(&conn, "b3", "2025-03-11 09:00", BookingStatus::Confirmed);

        let slots = occupied(&conn, "v1", &dt("2025-03-10 00:00"), &dt("2025-03-11 00:00")).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start, dt("2025-03-10 10:00"));
        assert_eq!(slots[1].start, dt("2025-03-10 14:00"));
    }
}
