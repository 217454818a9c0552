use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A durably queued notification intent. Written in the same
/// transaction as the lifecycle transition that caused it and worked
/// off asynchronously by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub id: i64,
    pub booking_id: String,
    pub kind: TransitionKind,
    pub recipients: Vec<String>,
    pub status: NotificationStatus,
    pub attempts: i64,
    pub next_attempt_at: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
}

/// Which lifecycle transition produced the intent. One intent per
/// `(booking, kind)` pair; re-enqueueing the same transition is a no-op.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Requested,
    Confirmed,
    Rescheduled,
    Canceled,
    Completed,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Requested => "requested",
            TransitionKind::Confirmed => "confirmed",
            TransitionKind::Rescheduled => "rescheduled",
            TransitionKind::Canceled => "canceled",
            TransitionKind::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => TransitionKind::Confirmed,
            "rescheduled" => TransitionKind::Rescheduled,
            "canceled" => TransitionKind::Canceled,
            "completed" => TransitionKind::Completed,
            _ => TransitionKind::Requested,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => NotificationStatus::Sent,
            "failed" => NotificationStatus::Failed,
            _ => NotificationStatus::Pending,
        }
    }
}
