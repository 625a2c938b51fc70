//! Error types for SocialSync
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Platform failures keep their kind all the way to the HTTP boundary so
/// that a rate-limit signal can be answered with `429` and a retry hint
/// instead of a generic failure.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Access denied (403)
    #[error("Access denied")]
    Forbidden,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique constraint hit on a manual write (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An operation needs credentials that are not configured (503)
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Startup configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The platform asked us to back off (429)
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    /// Non-success answer from the platform (500)
    #[error("Upstream API error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    /// Connection-level failure talking to the platform (500)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The platform did not answer within the request timeout (500)
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// OAuth state token unknown, replayed or expired (400)
    #[error("OAuth state error: {0}")]
    OAuthState(String),

    /// No platform client registered for the account's platform (400)
    #[error("auto-sync not supported for platform: {0}")]
    UnsupportedPlatform(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The caller went away before the operation finished
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Retry hint carried by a rate-limit error
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::NotConfigured(_) => "not_configured",
            AppError::Config(_) => "config",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Upstream { .. } => "upstream",
            AppError::Transport(_) => "transport",
            AppError::Timeout(_) => "timeout",
            AppError::OAuthState(_) => "oauth_state",
            AppError::UnsupportedPlatform(_) => "unsupported_platform",
            AppError::Database(_) => "database",
            AppError::Cancelled => "cancelled",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else {
            AppError::Transport(err.to_string())
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let error_type = self.kind();
        let (status, error_message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::OAuthState(_) | AppError::UnsupportedPlatform(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::RateLimited { retry_after } => {
                crate::metrics::ERRORS_TOTAL
                    .with_label_values(&[error_type])
                    .inc();

                let body = Json(serde_json::json!({
                    "error": "Rate limit exceeded. Too many requests to X/Twitter API.",
                    "retry_after": retry_after,
                }));
                return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            }
            AppError::Upstream { .. }
            | AppError::Transport(_)
            | AppError::Timeout(_)
            | AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Cancelled => (
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
                self.to_string(),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limited_response_carries_retry_after() {
        let response = AppError::RateLimited { retry_after: 120 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["retry_after"], 120);
    }

    #[test]
    fn upstream_failures_map_to_internal_error() {
        let response = AppError::Upstream {
            status: 503,
            body: "over capacity".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_oauth_credentials_map_to_service_unavailable() {
        let response = AppError::NotConfigured("oauth".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn only_rate_limited_exposes_retry_after() {
        assert_eq!(
            AppError::RateLimited { retry_after: 900 }.retry_after(),
            Some(900)
        );
        assert_eq!(AppError::Transport("reset".into()).retry_after(), None);
    }
}
