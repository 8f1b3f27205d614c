use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// The current principal may not perform the requested action.
    /// `requires_auth` is true when nobody is authenticated at all, so the
    /// boundary can answer 401 instead of 403.
    #[error("not authorized")]
    NotAuthorized { requires_auth: bool },
    #[error("data source unavailable")]
    DataSource(#[from] sqlx::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("audit write failed: {0}")]
    AuditWrite(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn forbidden() -> Self {
        Self::NotAuthorized {
            requires_auth: false,
        }
    }

    pub fn authentication_required() -> Self {
        Self::NotAuthorized {
            requires_auth: true,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn audit_write(message: impl Into<String>) -> Self {
        Self::AuditWrite(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotAuthorized {
                requires_auth: true,
            } => StatusCode::UNAUTHORIZED,
            AppError::NotAuthorized {
                requires_auth: false,
            } => StatusCode::FORBIDDEN,
            AppError::DataSource(_)
            | AppError::Configuration(_)
            | AppError::AuditWrite(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::NotAuthorized {
                requires_auth: true,
            } => "You must be logged in to access this section.".to_string(),
            AppError::NotAuthorized {
                requires_auth: false,
            } => "You are not authorized to access this section.".to_string(),
            other => other.to_string(),
        };

        let error = match &self {
            AppError::NotAuthorized {
                requires_auth: true,
            } => "unauthenticated",
            AppError::NotAuthorized {
                requires_auth: false,
            } => "forbidden",
            AppError::DataSource(_) => "data_source",
            AppError::Configuration(_) => "configuration",
            AppError::AuditWrite(_) => "audit_write",
            AppError::Internal(_) => "internal",
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
