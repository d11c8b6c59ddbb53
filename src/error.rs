use std::sync::OnceLock;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Whether internal error details are hidden from response bodies. Resolved
/// once at startup from the loaded configuration; defaults to the permissive
/// development behavior when never set.
static PRODUCTION: OnceLock<bool> = OnceLock::new();

pub fn set_production(production: bool) {
    let _ = PRODUCTION.set(production);
}

fn production() -> bool {
    PRODUCTION.get().copied().unwrap_or(false)
}

/// Field-level validation failure, reported back to the client.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Service-level error taxonomy, mapped onto HTTP status codes at the
/// response boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Postgres unique_violation. The unique email constraint is the
/// authoritative duplicate guard; the service-level existence check is only
/// a fast path.
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return ApiError::Conflict("Resource already exists".into());
            }
        }
        ApiError::Internal(e.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "statusCode")]
    status_code: u16,
    message: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        let (message, details) = match &self {
            ApiError::Validation(fields) => (
                "Validation failed".to_string(),
                serde_json::to_value(fields).ok(),
            ),
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                let details = if production() {
                    None
                } else {
                    Some(serde_json::json!({ "error": format!("{:#}", e) }))
                };
                ("Internal Server Error".to_string(), details)
            }
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            status_code: status.as_u16(),
            message,
            success: false,
            details,
        };

        (status, Json(body)).into_response()
    }
}
