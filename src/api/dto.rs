//! Request and response bodies that have no model counterpart

use serde::{Deserialize, Serialize};

use crate::data::{NewContent, NewSocialAccount};
use crate::error::AppError;

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Plain acknowledgement, e.g. after a delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `GET /api/twitter/oauth/url`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationUrlResponse {
    pub url: String,
}

/// `GET /api/twitter/oauth/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthStatusResponse {
    pub configured: bool,
}

/// Query string the provider redirects back with
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl NewSocialAccount {
    pub fn validate(&self) -> Result<(), AppError> {
        require_non_empty("platform", &self.platform)?;
        require_non_empty("account_name", self.account_name.trim_start_matches('@'))
    }
}

impl NewContent {
    pub fn validate(&self) -> Result<(), AppError> {
        require_non_empty("platform", &self.platform)?;
        require_non_empty("link", &self.link)
    }
}
