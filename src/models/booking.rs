use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::Slot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub vehicle_id: String,
    pub slot_start: NaiveDateTime,
    pub slot_minutes: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub status: BookingStatus,
    /// Set on the replacement row created by a reschedule, pointing at
    /// the booking it supersedes.
    pub rescheduled_from: Option<String>,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn slot(&self) -> Slot {
        Slot {
            start: self.slot_start,
            minutes: self.slot_minutes,
        }
    }
}

/// Contact details captured at creation time, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequesterContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Requested,
    Confirmed,
    Rescheduled,
    Canceled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rescheduled => "rescheduled",
            BookingStatus::Canceled => "canceled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "rescheduled" => BookingStatus::Rescheduled,
            "canceled" => BookingStatus::Canceled,
            "completed" => BookingStatus::Completed,
            _ => BookingStatus::Requested,
        }
    }

    /// Statuses that count toward conflict checks. Only canceled and
    /// completed rows release their slot; a rescheduled row keeps its
    /// claim even though the booking moved on.
    pub fn is_active(&self) -> bool {
        !matches!(self, BookingStatus::Canceled | BookingStatus::Completed)
    }
}
