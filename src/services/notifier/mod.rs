pub mod mailgun;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::db::queries;
use crate::models::{Booking, NotificationIntent, TransitionKind, Vehicle};
use crate::state::AppState;

#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Stand-in used when no mail transport is configured: logs the
/// message and reports success so intents don't pile up in dev.
pub struct LogMailer;

#[async_trait]
impl MailProvider for LogMailer {
    async fn send_email(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        tracing::info!(to, subject, "mail transport not configured, logging instead");
        Ok(())
    }
}

/// Dispatcher loop. Runs on its own task so delivery latency and
/// failures never touch the booking operations that enqueued the
/// intents.
pub async fn run_worker(state: Arc<AppState>) {
    let mut tick = tokio::time::interval(Duration::from_secs(state.config.notify_poll_secs.max(1)));
    loop {
        tick.tick().await;
        let now = chrono::Utc::now().naive_utc();
        if let Err(e) = deliver_due(&state, now).await {
            tracing::error!(error = %e, "notification worker pass failed");
        }
    }
}

/// One dispatcher pass: deliver every intent that is due at `now`.
/// Failed intents are rescheduled with exponential backoff and marked
/// `failed` after the configured attempt budget.
pub async fn deliver_due(state: &AppState, now: NaiveDateTime) -> anyhow::Result<usize> {
    let due = {
        let db = state.db.lock().unwrap();
        queries::due_notifications(&db, &now, 20)?
    };

    let mut delivered = 0;
    for intent in due {
        let (booking, vehicle) = {
            let db = state.db.lock().unwrap();
            match queries::get_booking_by_id(&db, &intent.booking_id)? {
                Some(booking) => {
                    let vehicle = queries::get_vehicle(&db, &booking.vehicle_id)?;
                    (booking, vehicle)
                }
                None => {
                    // orphaned intent, nothing sensible to send
                    queries::record_notification_failure(
                        &db,
                        intent.id,
                        "booking row missing",
                        &now,
                        true,
                    )?;
                    continue;
                }
            }
        };

        let (subject, body) = compose(&intent, &booking, vehicle.as_ref());

        // A failed recipient retries the whole intent later; recipients
        // already reached may see a duplicate, which the contract
        // tolerates.
        let mut result = Ok(());
        for to in &intent.recipients {
            if let Err(e) = state.mailer.send_email(to, &subject, &body).await {
                result = Err(e);
                break;
            }
        }

        let db = state.db.lock().unwrap();
        match result {
            Ok(()) => {
                queries::mark_notification_sent(&db, intent.id, &now)?;
                tracing::info!(
                    booking = %intent.booking_id,
                    kind = intent.kind.as_str(),
                    "notification delivered"
                );
                delivered += 1;
            }
            Err(e) => {
                let attempts = intent.attempts + 1;
                let give_up = attempts >= state.config.notify_max_attempts;
                let backoff = state.config.notify_backoff_secs << intent.attempts.min(6) as u32;
                let next = now + chrono::Duration::seconds(backoff);
                tracing::warn!(
                    booking = %intent.booking_id,
                    kind = intent.kind.as_str(),
                    attempts,
                    give_up,
                    error = %e,
                    "notification delivery failed"
                );
                queries::record_notification_failure(&db, intent.id, &e.to_string(), &next, give_up)?;
            }
        }
    }
    Ok(delivered)
}

fn compose(
    intent: &NotificationIntent,
    booking: &Booking,
    vehicle: Option<&Vehicle>,
) -> (String, String) {
    let vehicle_name = vehicle
        .map(Vehicle::display_name)
        .unwrap_or_else(|| booking.vehicle_id.clone());
    let when = booking.slot_start.format("%A %-d %B %Y at %H:%M");

    let (headline, detail) = match intent.kind {
        TransitionKind::Requested => (
            "Test Drive Booking Received",
            "We've received your test drive request and will confirm it shortly.",
        ),
        TransitionKind::Confirmed => (
            "Test Drive Confirmed",
            "Your test drive is confirmed. We look forward to seeing you.",
        ),
        TransitionKind::Rescheduled => (
            "Test Drive Rescheduled",
            "This booking has been rescheduled; a new request has been created for the new time.",
        ),
        TransitionKind::Canceled => (
            "Test Drive Canceled",
            "This booking has been canceled. Feel free to book another time.",
        ),
        TransitionKind::Completed => (
            "Thanks for Test Driving With Us",
            "We hope you enjoyed the drive. Get in touch if you'd like to talk next steps.",
        ),
    };

    let subject = format!("{headline} - {vehicle_name}");
    let body = format!(
        "Hi {},\n\n{detail}\n\nVehicle: {vehicle_name}\nWhen: {when}\nBooking reference: {}\n",
        booking.customer_name, booking.id
    );
    (subject, body)
}
