use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use testdrive::config::AppConfig;
use testdrive::db;
use testdrive::handlers;
use testdrive::models::BookingPolicy;
use testdrive::services::notifier::mailgun::MailgunProvider;
use testdrive::services::notifier::{self, LogMailer, MailProvider};
use testdrive::services::scheduling::ClaimLocks;
use testdrive::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let policy = BookingPolicy::from_config(&config)?;
    tracing::info!("booking policy: {}", policy.to_human_readable());

    let conn = db::init_db(&config.database_url)?;

    let mailer: Box<dyn MailProvider> = if config.mailgun_api_key.is_empty() {
        tracing::warn!("MAILGUN_API_KEY not set, notifications will only be logged");
        Box::new(LogMailer)
    } else {
        tracing::info!("using Mailgun mail provider (domain: {})", config.mailgun_domain);
        Box::new(MailgunProvider::new(
            config.mailgun_domain.clone(),
            config.mailgun_api_key.clone(),
            config.from_email.clone(),
        ))
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        policy,
        mailer,
        claims: ClaimLocks::new(),
    });

    tokio::spawn(notifier::run_worker(Arc::clone(&state)));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/vehicles", get(handlers::vehicles::list_vehicles))
        .route(
            "/api/vehicles/:id/availability",
            get(handlers::vehicles::list_availability),
        )
        .route("/api/staff/bookings", get(handlers::staff::list_bookings))
        .route(
            "/api/staff/bookings/:id/confirm",
            post(handlers::staff::confirm_booking),
        )
        .route(
            "/api/staff/bookings/:id/cancel",
            post(handlers::staff::cancel_booking),
        )
        .route(
            "/api/staff/bookings/:id/complete",
            post(handlers::staff::complete_booking),
        )
        .route(
            "/api/staff/bookings/:id/reschedule",
            post(handlers::staff::reschedule_booking),
        )
        .route("/api/staff/vehicles", post(handlers::staff::create_vehicle))
        .route(
            "/calendar/:booking_id",
            get(handlers::calendar::download_ics),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
