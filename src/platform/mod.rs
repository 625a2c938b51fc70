//! Social platform clients
//!
//! Each supported platform implements [`PlatformClient`]. The sync engine
//! looks clients up in a [`PlatformRegistry`] by the platform recorded on
//! the account, so an unknown platform fails at lookup time before any
//! network call is made.

pub mod classify;
mod twitter;

pub use twitter::TwitterClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::AppError;

/// Platforms with a client implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            _ => Err(AppError::UnsupportedPlatform(value.to_string())),
        }
    }
}

/// Bearer credential attached to a platform request
///
/// A request carries exactly one of these.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Application-level token shared by every account
    App(String),
    /// Per-user OAuth access token
    User(String),
}

impl Credential {
    pub fn bearer(&self) -> &str {
        match self {
            Credential::App(token) | Credential::User(token) => token,
        }
    }

    /// Label used in logs and metrics
    pub fn strategy(&self) -> &'static str {
        match self {
            Credential::App(_) => "app_token",
            Credential::User(_) => "oauth",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential::{}(..)", self.strategy())
    }
}

/// A post as returned by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub external_id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Profile of the account that owns an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformIdentity {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
}

/// What the sync engine needs from a platform
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Application-level credential, if one is configured
    fn app_credential(&self) -> Option<Credential>;

    /// Look up the platform user id behind a public handle
    async fn resolve_identity(&self, handle: &str, credential: &Credential)
    -> Result<String, AppError>;

    /// Posts newer than `since_id`, in the order the platform returns them
    ///
    /// `max_results` outside `1..=100` falls back to 10.
    async fn list_recent_posts(
        &self,
        platform_user_id: &str,
        max_results: u32,
        since_id: Option<&str>,
        credential: &Credential,
    ) -> Result<Vec<Post>, AppError>;

    /// Profile of the user an OAuth access token belongs to
    async fn authenticated_identity(&self, access_token: &str)
    -> Result<PlatformIdentity, AppError>;

    /// Public URL of a post
    fn post_link(&self, handle: &str, external_id: &str) -> String;
}

/// Clients keyed by platform
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    clients: HashMap<Platform, Arc<dyn PlatformClient>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client, replacing any previous one for the same platform
    pub fn register(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.clients.insert(client.platform(), client);
        self
    }

    /// Client for an account's platform string
    pub fn get(&self, platform: &str) -> Result<Arc<dyn PlatformClient>, AppError> {
        let key = platform.parse::<Platform>()?;
        self.clients
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::UnsupportedPlatform(platform.to_string()))
    }

    pub fn supports(&self, platform: &str) -> bool {
        self.get(platform).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwitterConfig;
    use std::time::Duration;

    fn registry() -> PlatformRegistry {
        let config = TwitterConfig {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            bearer_token: Some("app".to_string()),
            api_base_url: "http://127.0.0.1:1/2".to_string(),
            authorize_url: "http://127.0.0.1:1/authorize".to_string(),
            token_url: "http://127.0.0.1:1/token".to_string(),
            scopes: Vec::new(),
        };
        let client = TwitterClient::new(&config, Duration::from_secs(1)).unwrap();
        PlatformRegistry::new().register(Arc::new(client))
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("Twitter".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!("x".parse::<Platform>().unwrap(), Platform::Twitter);
        assert!(matches!(
            "mastodon".parse::<Platform>(),
            Err(AppError::UnsupportedPlatform(p)) if p == "mastodon"
        ));
    }

    #[test]
    fn registry_rejects_unknown_platforms() {
        let registry = registry();
        assert!(registry.supports("twitter"));
        assert!(!registry.supports("instagram"));
        assert!(matches!(
            registry.get("instagram"),
            Err(AppError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn empty_registry_rejects_known_platform() {
        assert!(matches!(
            PlatformRegistry::new().get("twitter"),
            Err(AppError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn credential_debug_hides_token() {
        let rendered = format!("{:?}", Credential::User("secret".to_string()));
        assert!(!rendered.contains("secret"));
        assert_eq!(Credential::App("a".to_string()).strategy(), "app_token");
    }
}
