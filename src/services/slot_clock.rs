use chrono::NaiveDateTime;

use crate::errors::BookingError;
use crate::models::{BookingPolicy, Slot};

/// Validate a requested instant against the booking policy and return
/// the slot it would occupy. Pure function of (policy, now, instant);
/// "now" is always injected so tests never touch the process clock.
pub fn ensure_bookable(
    policy: &BookingPolicy,
    now: &NaiveDateTime,
    instant: &NaiveDateTime,
) -> Result<Slot, BookingError> {
    if instant <= now {
        return Err(BookingError::OutOfPolicy(
            "test drives must be booked in advance".to_string(),
        ));
    }

    if !policy.is_aligned(instant) {
        return Err(BookingError::OutOfPolicy(format!(
            "start times must align to {}-minute slots",
            policy.slot_minutes
        )));
    }

    if !policy.is_open_day(instant) || !policy.within_hours(instant) {
        return Err(BookingError::OutOfPolicy(format!(
            "we're open {}",
            policy.to_human_readable()
        )));
    }

    Ok(policy.slot_for(*instant))
}
