use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application error taxonomy.
///
/// The license-denial variants (`Banned`, `Expired`, `DeviceLimitExceeded`,
/// `NotActivated`) are expected business outcomes carried as values, not
/// faults; handlers map them onto 4xx responses.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("License key not found")]
    InvalidLicense,

    #[error("License has been banned")]
    Banned,

    #[error("License expired at {expires_at}")]
    Expired { expires_at: DateTime<Utc> },

    #[error("Device limit reached ({max_devices})")]
    DeviceLimitExceeded { max_devices: u32 },

    #[error("Device is not activated for this license")]
    NotActivated,

    /// Another writer holds this license record; safe to retry.
    #[error("License record is busy, retry shortly")]
    Contention,

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code included in every error response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidLicense => "INVALID_LICENSE",
            Self::Banned => "LICENSE_BANNED",
            Self::Expired { .. } => "LICENSE_EXPIRED",
            Self::DeviceLimitExceeded { .. } => "DEVICE_LIMIT_EXCEEDED",
            Self::NotActivated => "NOT_ACTIVATED",
            Self::Contention => "STORE_CONTENTION",
            Self::Database(_) | Self::Pool(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::InvalidLicense | Self::NotActivated => StatusCode::NOT_FOUND,
            Self::Banned | Self::Expired { .. } | Self::DeviceLimitExceeded { .. } => {
                StatusCode::FORBIDDEN
            }
            Self::Contention => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Pool(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match &err {
            // A bounded busy wait already happened at the connection level;
            // surface what remains as retryable contention.
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                Self::Contention
            }
            _ => Self::Database(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details go to the log, not the response body.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({ "error": message, "code": self.code() });
        match &self {
            Self::Expired { expires_at } => {
                body["expires_at"] = json!(expires_at);
            }
            Self::DeviceLimitExceeded { max_devices } => {
                body["max_devices"] = json!(max_devices);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
