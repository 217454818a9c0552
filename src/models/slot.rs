use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A half-open interval `[start, start + minutes)` during which one
/// vehicle is engaged for a test drive. Derived from a requested
/// instant and the configured slot duration, never stored on its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub minutes: i64,
}

impl Slot {
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(self.minutes)
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}
