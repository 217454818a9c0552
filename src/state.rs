use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::models::BookingPolicy;
use crate::services::notifier::MailProvider;
use crate::services::scheduling::ClaimLocks;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub policy: BookingPolicy,
    pub mailer: Box<dyn MailProvider>,
    pub claims: ClaimLocks,
}
