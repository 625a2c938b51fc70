//! Common test utilities for E2E tests

#![allow(dead_code)]

use reqwest::RequestBuilder;
use socialsync::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::MockServer;

/// Proxy identity used by `as_user` requests
pub const TEST_USER: &str = "alice-id";
pub const TEST_EMAIL: &str = "alice@example.com";

/// Test server instance
///
/// The X/Twitter API and token endpoint both point at `platform`.
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub platform: MockServer,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Server with every X/Twitter credential configured
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Server whose configuration is adjusted before startup
    pub async fn with_config(adjust: impl FnOnce(&mut config::AppConfig)) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let platform = MockServer::start().await;

        let mut config = test_config(temp_dir.path().join("test.db"), &platform.uri());
        adjust(&mut config);

        let state = AppState::new(config).await.unwrap();

        // Redirects are asserted on, not followed
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = socialsync::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            platform,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Attach the proxy identity headers of the default test user
    pub fn as_user(&self, request: RequestBuilder) -> RequestBuilder {
        self.as_identity(request, TEST_USER, TEST_EMAIL)
    }

    /// Attach arbitrary proxy identity headers
    pub fn as_identity(&self, request: RequestBuilder, user: &str, email: &str) -> RequestBuilder {
        request
            .header("x-forwarded-user", user)
            .header("x-forwarded-email", email)
    }

    /// Register an account for the default test user through the API
    pub async fn create_account(&self, handle: &str) -> serde_json::Value {
        let response = self
            .as_user(self.client.post(self.url("/api/social-accounts")))
            .json(&serde_json::json!({
                "platform": "twitter",
                "account_name": handle,
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }
}

/// Configuration pointing every X/Twitter endpoint at `platform_uri`
pub fn test_config(db_path: std::path::PathBuf, platform_uri: &str) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: config::DatabaseConfig { path: db_path },
        twitter: config::TwitterConfig {
            client_id: Some("test-client-id".to_string()),
            client_secret: Some("test-client-secret".to_string()),
            redirect_uri: Some("https://tracker.test/api/twitter/oauth/callback".to_string()),
            bearer_token: Some("test-app-bearer".to_string()),
            api_base_url: format!("{}/2", platform_uri),
            authorize_url: "https://twitter.test/i/oauth2/authorize".to_string(),
            token_url: format!("{}/2/oauth2/token", platform_uri),
            scopes: vec![
                "tweet.read".to_string(),
                "users.read".to_string(),
                "offline.access".to_string(),
            ],
        },
        sync: config::SyncConfig {
            max_results: 50,
            request_timeout_seconds: 5,
        },
        oauth: config::OAuthStateConfig {
            state_max_age_seconds: 600,
            state_retention_seconds: 900,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}
