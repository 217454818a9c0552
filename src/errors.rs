use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("that time is outside our booking policy: {0}")]
    OutOfPolicy(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("that slot is already booked")]
    Conflict,

    #[error("the slot could not be claimed right now, please retry")]
    Busy,

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("booking was modified by someone else, re-read and retry")]
    StaleState,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = match &self {
            BookingError::OutOfPolicy(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Conflict => StatusCode::CONFLICT,
            BookingError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::InvalidTransition(_) => StatusCode::CONFLICT,
            BookingError::StaleState => StatusCode::PRECONDITION_FAILED,
            BookingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
