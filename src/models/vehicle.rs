use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A bookable vehicle from the catalog. The engine only reads these
/// rows; inactive vehicles cannot be booked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl Vehicle {
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}
