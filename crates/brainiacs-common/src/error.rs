//! Centralized error types for Brainiacs.
//!
//! Uses `thiserror` for ergonomic error definitions and provides HTTP-friendly
//! error variants that can be directly converted to API responses.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Core application error type used across all Brainiacs services.
#[derive(Debug, thiserror::Error)]
pub enum BrainiacsError {
    // === Input errors ===
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // === Resource errors ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    // === Permission errors ===
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // === State errors ===
    /// Duplicate vote, duplicate membership, re-resolving a closed join request.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Poll-creation throttle.
    #[error("Rate limited. Retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Optimistic write lost the race more times than the retry budget allows.
    #[error("{resource} is being modified concurrently, retry the request")]
    Contention { resource: String },

    // === Infrastructure errors ===
    #[error("Store operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

impl BrainiacsError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Conflict { .. } | Self::RateLimited { .. } => StatusCode::BAD_REQUEST,
            Self::Contention { .. } => StatusCode::CONFLICT,
            Self::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Conflict { .. } => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Contention { .. } => "CONTENTION",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show a client. Infrastructure failures are logged here
    /// and replaced with a generic message.
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(e) => {
                tracing::error!("Database error: {e}");
                "An internal error occurred".to_string()
            }
            Self::Internal(e) => {
                tracing::error!("Internal error: {e}");
                "An internal error occurred".to_string()
            }
            Self::Timeout { operation } => {
                tracing::warn!(operation = %operation, "Store operation timed out");
                self.to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether the caller may retry the identical request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::Timeout { .. })
    }
}

impl IntoResponse for BrainiacsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.client_message();
        let retry_after_ms = if let BrainiacsError::RateLimited { retry_after_ms } = &self {
            Some(*retry_after_ms)
        } else {
            None
        };

        // Whole seconds, rounded up; store pressure gets a one-second hint.
        let retry_after_secs = match retry_after_ms {
            Some(ms) => Some(ms.div_ceil(1000).max(1)),
            None if self.is_retryable() => Some(1),
            None => None,
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.error_code().to_string(),
            message,
            retry_after_ms,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Malformed or mistyped request bodies are client errors, reported in the
/// same envelope as every other validation failure.
impl From<axum::extract::rejection::JsonRejection> for BrainiacsError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        BrainiacsError::validation(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for BrainiacsError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        BrainiacsError::validation(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for BrainiacsError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        BrainiacsError::validation(rejection.body_text())
    }
}

/// Convenience type alias for Results using BrainiacsError.
pub type BrainiacsResult<T> = Result<T, BrainiacsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_vote_conflict_is_a_bad_request() {
        let err = BrainiacsError::conflict("already voted");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "CONFLICT");
        assert!(!err.is_retryable());
    }

    #[test]
    fn store_pressure_errors_are_retryable() {
        let timeout = BrainiacsError::Timeout {
            operation: "load board".into(),
        };
        let contention = BrainiacsError::Contention {
            resource: "Board".into(),
        };
        assert_eq!(timeout.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(contention.status_code(), StatusCode::CONFLICT);
        assert!(timeout.is_retryable() && contention.is_retryable());
    }

    #[test]
    fn retry_after_header() {
        let response = BrainiacsError::RateLimited { retry_after_ms: 1_500 }.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");

        let response = BrainiacsError::Contention {
            resource: "Board".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");

        let response = BrainiacsError::conflict("already voted").into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
