//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub twitter: TwitterConfig,
    pub sync: SyncConfig,
    pub oauth: OAuthStateConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// X/Twitter credentials and endpoints
///
/// Every credential is optional. Without `bearer_token` the app-level
/// fallback is disabled; without the three OAuth values the OAuth flow
/// is disabled.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    /// App-level bearer token
    pub bearer_token: Option<String>,
    /// REST API base (e.g., "https://api.x.com/2")
    pub api_base_url: String,
    /// Browser-facing authorization endpoint
    pub authorize_url: String,
    /// Token endpoint for code exchange and refresh
    pub token_url: String,
    pub scopes: Vec<String>,
}

impl TwitterConfig {
    /// Drop blank credentials so that "set but empty" means "absent"
    fn normalize(&mut self) {
        for value in [
            &mut self.client_id,
            &mut self.client_secret,
            &mut self.redirect_uri,
            &mut self.bearer_token,
        ] {
            if value.as_deref().map(str::trim).is_some_and(str::is_empty) {
                *value = None;
            }
        }
    }
}

/// Sync behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Page size requested from the platform (clamped by the client)
    pub max_results: u32,
    /// Upper bound for every outbound platform request
    pub request_timeout_seconds: u64,
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Upper bound for either OAuth state window (one day)
pub const MAX_OAUTH_STATE_SECONDS: u64 = 24 * 60 * 60;

/// Lifetime of pending OAuth authorization attempts
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthStateConfig {
    /// A callback older than this is rejected (default: 600)
    pub state_max_age_seconds: u64,
    /// Entries older than this are pruned (default: 900)
    pub state_retention_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SOCIALSYNC__*)
    /// 5. TWITTER_CLIENT_ID / TWITTER_CLIENT_SECRET / TWITTER_REDIRECT_URI /
    ///    TWITTER_BEARER_TOKEN
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/socialsync.db")?
            .set_default("twitter.api_base_url", "https://api.x.com/2")?
            .set_default("twitter.authorize_url", "https://twitter.com/i/oauth2/authorize")?
            .set_default("twitter.token_url", "https://api.x.com/2/oauth2/token")?
            .set_default(
                "twitter.scopes",
                vec!["tweet.read", "users.read", "offline.access"],
            )?
            .set_default("sync.max_results", 50)?
            .set_default("sync.request_timeout_seconds", 30)?
            .set_default("oauth.state_max_age_seconds", 600)?
            .set_default("oauth.state_retention_seconds", 900)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (SOCIALSYNC__*)
            .add_source(
                Environment::with_prefix("SOCIALSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            // Conventional platform variable names win over everything else
            .set_override_option("twitter.client_id", std::env::var("TWITTER_CLIENT_ID").ok())?
            .set_override_option(
                "twitter.client_secret",
                std::env::var("TWITTER_CLIENT_SECRET").ok(),
            )?
            .set_override_option(
                "twitter.redirect_uri",
                std::env::var("TWITTER_REDIRECT_URI").ok(),
            )?
            .set_override_option(
                "twitter.bearer_token",
                std::env::var("TWITTER_BEARER_TOKEN").ok(),
            )?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let mut app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.twitter.normalize();
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.sync.request_timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "sync.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.oauth.state_max_age_seconds > MAX_OAUTH_STATE_SECONDS
            || self.oauth.state_retention_seconds > MAX_OAUTH_STATE_SECONDS
        {
            return Err(crate::error::AppError::Config(format!(
                "oauth state windows must not exceed {MAX_OAUTH_STATE_SECONDS} seconds"
            )));
        }

        if self.oauth.state_retention_seconds < self.oauth.state_max_age_seconds {
            return Err(crate::error::AppError::Config(
                "oauth.state_retention_seconds must not be shorter than oauth.state_max_age_seconds"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
