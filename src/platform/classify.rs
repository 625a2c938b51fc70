//! Response classification
//!
//! Turns raw platform answers into success payloads, rate-limit signals or
//! opaque API errors before any JSON decoding happens.

use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use serde::Deserialize;

use crate::error::AppError;

/// Unix timestamp at which the current rate-limit window resets
pub const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Relative back-off in seconds
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Used when the platform sends no hint at all (its usual 15 minute window)
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 900;

/// Used when the advertised reset time has already passed
pub const MIN_RETRY_AFTER_SECS: u64 = 60;

/// What a platform response means to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// 200 with its raw body
    Success(String),
    /// 429 with the resolved back-off
    RateLimited { retry_after: u64 },
    /// Any other status, kept verbatim for diagnostics
    ApiError { status: u16, body: String },
}

impl Classified {
    /// Collapse into the crate's error taxonomy
    pub fn into_result(self) -> Result<String, AppError> {
        match self {
            Classified::Success(body) => Ok(body),
            Classified::RateLimited { retry_after } => Err(AppError::RateLimited { retry_after }),
            Classified::ApiError { status, body } => Err(AppError::Upstream { status, body }),
        }
    }
}

/// Classify a response from its parts
pub fn classify(
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
    now: DateTime<Utc>,
) -> Classified {
    match status {
        StatusCode::OK => Classified::Success(body),
        StatusCode::TOO_MANY_REQUESTS => Classified::RateLimited {
            retry_after: retry_after_from_headers(headers, now),
        },
        other => Classified::ApiError {
            status: other.as_u16(),
            body,
        },
    }
}

/// Read the body of a live response and classify it
pub async fn classify_response(response: reqwest::Response) -> Result<Classified, AppError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await?;

    Ok(classify(status, &headers, body, Utc::now()))
}

/// Resolve the back-off for a 429
///
/// Order: reset timestamp header, then relative seconds header, then
/// [`DEFAULT_RETRY_AFTER_SECS`]. A reset time that is not in the future
/// yields [`MIN_RETRY_AFTER_SECS`].
pub fn retry_after_from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> u64 {
    let header_i64 = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
    };

    if let Some(reset_at) = header_i64(RATE_LIMIT_RESET_HEADER) {
        let remaining = reset_at - now.timestamp();
        return if remaining > 0 {
            remaining as u64
        } else {
            MIN_RETRY_AFTER_SECS
        };
    }

    match header_i64(RETRY_AFTER_HEADER) {
        Some(seconds) if seconds > 0 => seconds as u64,
        _ => DEFAULT_RETRY_AFTER_SECS,
    }
}

/// One entry of the platform's `errors` array
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiProblem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Surface a partial-error array embedded in a 200 response
///
/// The first reported problem becomes the error.
pub fn check_partial_errors(errors: &[ApiProblem]) -> Result<(), AppError> {
    match errors.first() {
        None => Ok(()),
        Some(problem) => Err(AppError::Upstream {
            status: StatusCode::OK.as_u16(),
            body: format!("{} - {}", problem.title, problem.detail),
        }),
    }
}
