//! SocialSync - a social content tracker
//!
//! Users (identified by an authenticating reverse proxy) register their
//! X/Twitter accounts and pull recent posts into a personal content
//! library, authenticating with either the account's own OAuth token or
//! the application bearer token.
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `auth`: Proxy identity extraction and the OAuth2 + PKCE flow
//! - `platform`: Platform API clients and response classification
//! - `service`: Sync orchestration and token lifecycle
//! - `data`: SQLite persistence behind the store traits
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod platform;
pub mod service;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// X/Twitter OAuth flow (authorization URL, callback, refresh)
    pub oauth: Arc<auth::OAuthHandler>,

    /// Sync engine
    pub sync: Arc<service::SyncService>,

    /// Cancelled on server shutdown; in-flight syncs hold child tokens
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build the platform clients
    /// 3. Build the OAuth handler and sync engine
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or an HTTP client
    /// cannot be built
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!(path = %config.database.path.display(), "Database connected");

        Self::from_database(config, db)
    }

    /// Wire the services around an already opened database
    pub fn from_database(
        config: config::AppConfig,
        db: data::Database,
    ) -> Result<Self, error::AppError> {
        let db = Arc::new(db);
        let timeout = config.sync.request_timeout();

        let twitter: Arc<dyn platform::PlatformClient> =
            Arc::new(platform::TwitterClient::new(&config.twitter, timeout)?);
        let platforms = platform::PlatformRegistry::new().register(twitter.clone());

        let states = auth::OAuthStateStore::new(&config.oauth);
        let oauth = Arc::new(auth::OAuthHandler::new(
            &config.twitter,
            states,
            twitter,
            timeout,
        )?);

        if !oauth.is_configured() {
            tracing::warn!("X/Twitter OAuth credentials incomplete; OAuth flow disabled");
        }
        if config.twitter.bearer_token.is_none() {
            tracing::warn!("TWITTER_BEARER_TOKEN not set; app-level fallback disabled");
        }

        let sync = Arc::new(service::SyncService::new(
            platforms,
            oauth.clone(),
            db.clone(),
            db.clone(),
            config.sync.max_results,
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            oauth,
            sync,
            shutdown: CancellationToken::new(),
        })
    }
}

/// Maximum accepted request body
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower::ServiceBuilder;
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    let api = Router::new()
        .merge(api::accounts_router())
        .merge(api::content_router())
        .nest("/twitter/oauth", api::oauth_router());

    Router::new()
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
        .merge(api::ops_router())
}
