use chrono::Duration;

use crate::models::Booking;

pub fn generate_ics(booking: &Booking, vehicle_name: &str) -> String {
    let dtstart = booking.slot_start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = (booking.slot_start + Duration::minutes(booking.slot_minutes))
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtstamp = booking.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@testdrive", booking.id);

    let summary = format!("Test drive: {vehicle_name}");
    let description = format!("Test drive booking for {}", booking.customer_name);

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Testdrive//Booking Engine//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}
