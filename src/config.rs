use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub staff_token: String,
    pub business_start: String,
    pub business_end: String,
    pub days_open: String,
    pub slot_minutes: i64,
    pub claim_wait_ms: u64,
    pub notify_poll_secs: u64,
    pub notify_backoff_secs: i64,
    pub notify_max_attempts: i64,
    pub staff_email: String,
    pub from_email: String,
    pub mailgun_domain: String,
    pub mailgun_api_key: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "testdrive.db".to_string()),
            staff_token: env::var("STAFF_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            business_start: env::var("BUSINESS_START").unwrap_or_else(|_| "09:00".to_string()),
            business_end: env::var("BUSINESS_END").unwrap_or_else(|_| "17:00".to_string()),
            days_open: env::var("DAYS_OPEN")
                .unwrap_or_else(|_| "mon,tue,wed,thu,fri,sat".to_string()),
            slot_minutes: env::var("SLOT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            claim_wait_ms: env::var("CLAIM_WAIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
            notify_poll_secs: env::var("NOTIFY_POLL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            notify_backoff_secs: env::var("NOTIFY_BACKOFF_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            notify_max_attempts: env::var("NOTIFY_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            staff_email: env::var("STAFF_EMAIL")
                .unwrap_or_else(|_| "bookings@example.com".to_string()),
            from_email: env::var("FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@example.com".to_string()),
            mailgun_domain: env::var("MAILGUN_DOMAIN").unwrap_or_default(),
            mailgun_api_key: env::var("MAILGUN_API_KEY").unwrap_or_default(),
        }
    }
}
