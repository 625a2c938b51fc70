//! OAuth 2.0 authorization code flow with PKCE against X/Twitter
//!
//! # Flow
//! 1. `get_authorization_url` stores a state entry and returns the
//!    provider URL the browser is sent to
//! 2. The provider redirects back with `code` and `state`
//! 3. `exchange_code` consumes the state entry and trades the code for
//!    tokens
//! 4. `refresh_access_token` renews an expired access token later on

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use super::pkce::{self, PkcePair};
use super::state::OAuthStateStore;
use crate::config::TwitterConfig;
use crate::error::AppError;
use crate::metrics;
use crate::platform::classify;
use crate::platform::{PlatformClient, PlatformIdentity};

/// Token endpoint answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Lifetime of `access_token` in seconds
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

impl TokenResponse {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.expires_in)
    }
}

/// Client id, secret and redirect URI, all present
struct ClientCredentials<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
}

/// OAuth handler shared by every request
#[derive(Clone)]
pub struct OAuthHandler {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    authorize_url: String,
    token_url: String,
    scopes: Vec<String>,
    states: OAuthStateStore,
    http: reqwest::Client,
    /// Resolves who an access token belongs to
    identity: Arc<dyn PlatformClient>,
}

impl OAuthHandler {
    pub fn new(
        config: &TwitterConfig,
        states: OAuthStateStore,
        identity: Arc<dyn PlatformClient>,
        timeout: std::time::Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("socialsync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            authorize_url: config.authorize_url.clone(),
            token_url: config.token_url.clone(),
            scopes: config.scopes.clone(),
            states,
            http,
            identity,
        })
    }

    /// True only when client id, client secret and redirect URI are all set
    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    pub fn states(&self) -> &OAuthStateStore {
        &self.states
    }

    fn credentials(&self) -> Result<ClientCredentials<'_>, AppError> {
        match (
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
            self.redirect_uri.as_deref(),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Ok(ClientCredentials {
                client_id,
                client_secret,
                redirect_uri,
            }),
            _ => Err(AppError::NotConfigured(
                "Twitter OAuth is not configured. Please set TWITTER_CLIENT_ID, TWITTER_CLIENT_SECRET, and TWITTER_REDIRECT_URI".to_string(),
            )),
        }
    }

    /// Start an authorization attempt for `user_id`
    ///
    /// Also kicks off a background prune of stale attempts.
    pub async fn get_authorization_url(&self, user_id: i64) -> Result<String, AppError> {
        let credentials = self.credentials()?;

        let state = pkce::generate_state();
        let pkce = PkcePair::generate();

        let mut url = Url::parse(&self.authorize_url)
            .map_err(|e| AppError::Config(format!("invalid twitter.authorize_url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", credentials.client_id)
            .append_pair("redirect_uri", credentials.redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);

        self.states.insert(state, user_id, pkce.verifier).await;
        self.states.spawn_prune();

        metrics::OAUTH_FLOWS_TOTAL
            .with_label_values(&["authorize", "success"])
            .inc();
        tracing::info!(user_id, "Generated OAuth authorization URL");

        Ok(url.into())
    }

    /// Trade an authorization code for tokens
    ///
    /// Returns the tokens and the user that started the attempt. The state
    /// entry is consumed even when the exchange itself fails.
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
    ) -> Result<(TokenResponse, i64), AppError> {
        let credentials = self.credentials()?;

        let pending = match self.states.take(state).await {
            Ok(pending) => pending,
            Err(e) => {
                metrics::OAUTH_FLOWS_TOTAL
                    .with_label_values(&["exchange", "invalid_state"])
                    .inc();
                return Err(e);
            }
        };

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", credentials.redirect_uri),
            ("code_verifier", pending.code_verifier.as_str()),
        ];

        let result = self.post_token_form(&credentials, &form).await;
        let status = if result.is_ok() { "success" } else { "failure" };
        metrics::OAUTH_FLOWS_TOTAL
            .with_label_values(&["exchange", status])
            .inc();

        let tokens = result?;
        tracing::info!(user_id = pending.user_id, "Exchanged OAuth code for tokens");
        Ok((tokens, pending.user_id))
    }

    /// Renew an access token; any non-200 answer fails the call
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let credentials = self.credentials()?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id),
        ];
        self.post_token_form(&credentials, &form).await
    }

    /// Profile of the user the access token belongs to
    pub async fn get_authenticated_identity(
        &self,
        access_token: &str,
    ) -> Result<PlatformIdentity, AppError> {
        self.identity.authenticated_identity(access_token).await
    }

    async fn post_token_form(
        &self,
        credentials: &ClientCredentials<'_>,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(credentials.client_id, Some(credentials.client_secret))
            .form(form)
            .send()
            .await?;

        let body = classify::classify_response(response).await?.into_result()?;
        serde_json::from_str(&body).map_err(|e| AppError::Upstream {
            status: 200,
            body: format!("failed to parse token response: {e}"),
        })
    }
}
