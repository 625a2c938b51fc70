//! X/Twitter API v2 client
//!
//! Stateless: every call takes the credential to attach. Both credential
//! kinds hit the same endpoints with the same response shapes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use url::Url;

use super::classify::{self, ApiProblem};
use super::{Credential, Platform, PlatformClient, PlatformIdentity, Post};
use crate::config::TwitterConfig;
use crate::error::AppError;
use crate::metrics;

const DEFAULT_MAX_RESULTS: u32 = 10;
const MAX_RESULTS_LIMIT: u32 = 100;
const TWEET_FIELDS: &str = "created_at,author_id,text";

#[derive(Debug, Deserialize)]
struct TweetsEnvelope {
    #[serde(default)]
    data: Vec<TweetPayload>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
struct TweetPayload {
    id: String,
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<TweetPayload> for Post {
    fn from(tweet: TweetPayload) -> Self {
        Post {
            external_id: tweet.id,
            text: tweet.text,
            author_id: tweet.author_id,
            created_at: tweet.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    data: Option<PlatformIdentity>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

impl UserEnvelope {
    fn into_identity(self) -> Result<PlatformIdentity, AppError> {
        classify::check_partial_errors(&self.errors)?;
        self.data.ok_or_else(|| AppError::Upstream {
            status: 200,
            body: "response contained no user data".to_string(),
        })
    }
}

/// Client for `https://api.x.com/2`
#[derive(Clone)]
pub struct TwitterClient {
    http: reqwest::Client,
    api_base_url: String,
    bearer_token: Option<String>,
}

impl TwitterClient {
    /// Build a client whose every request is bounded by `timeout`
    pub fn new(config: &TwitterConfig, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("socialsync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| AppError::Config(format!("invalid twitter.api_base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config("twitter.api_base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Perform one GET and decode a 200 body
    ///
    /// `endpoint` is the metric label, not the path.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: Url,
        bearer: &str,
    ) -> Result<T, AppError> {
        if bearer.is_empty() {
            return Err(AppError::NotConfigured(
                "twitter client not configured: missing bearer token".to_string(),
            ));
        }

        let started = Instant::now();
        let result = self.execute(url, bearer).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(AppError::RateLimited { .. }) => "rate_limited",
            Err(AppError::Timeout(_)) => "timeout",
            Err(AppError::Transport(_)) => "transport",
            Err(_) => "api_error",
        };
        metrics::observe_platform_request(endpoint, outcome, started.elapsed());

        if let Err(AppError::RateLimited { retry_after }) = result {
            metrics::RATE_LIMITED_TOTAL
                .with_label_values(&[endpoint])
                .inc();
            tracing::warn!(endpoint, retry_after, "Platform rate limit hit");
        }

        let body = result?;
        serde_json::from_str(&body).map_err(|e| AppError::Upstream {
            status: 200,
            body: format!("failed to parse response: {e}"),
        })
    }

    async fn execute(&self, url: Url, bearer: &str) -> Result<String, AppError> {
        tracing::debug!(url = %url, "Calling platform API");

        let response = self.http.get(url).bearer_auth(bearer).send().await?;
        classify::classify_response(response).await?.into_result()
    }
}

/// Out-of-range page sizes fall back to the default rather than failing
fn clamp_max_results(max_results: u32) -> u32 {
    if (1..=MAX_RESULTS_LIMIT).contains(&max_results) {
        max_results
    } else {
        DEFAULT_MAX_RESULTS
    }
}

#[async_trait]
impl PlatformClient for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn app_credential(&self) -> Option<Credential> {
        self.bearer_token.clone().map(Credential::App)
    }

    async fn resolve_identity(
        &self,
        handle: &str,
        credential: &Credential,
    ) -> Result<String, AppError> {
        let handle = handle.trim_start_matches('@');
        let url = self.endpoint(&["users", "by", "username", handle])?;

        let envelope: UserEnvelope = self
            .get_json("user_lookup", url, credential.bearer())
            .await?;
        Ok(envelope.into_identity()?.id)
    }

    async fn list_recent_posts(
        &self,
        platform_user_id: &str,
        max_results: u32,
        since_id: Option<&str>,
        credential: &Credential,
    ) -> Result<Vec<Post>, AppError> {
        let mut url = self.endpoint(&["users", platform_user_id, "tweets"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("max_results", &clamp_max_results(max_results).to_string());
            query.append_pair("tweet.fields", TWEET_FIELDS);
            if let Some(since_id) = since_id.filter(|id| !id.is_empty()) {
                query.append_pair("since_id", since_id);
            }
        }

        let envelope: TweetsEnvelope = self
            .get_json("user_tweets", url, credential.bearer())
            .await?;
        classify::check_partial_errors(&envelope.errors)?;

        Ok(envelope.data.into_iter().map(Post::from).collect())
    }

    async fn authenticated_identity(
        &self,
        access_token: &str,
    ) -> Result<PlatformIdentity, AppError> {
        let url = self.endpoint(&["users", "me"])?;
        let envelope: UserEnvelope = self.get_json("users_me", url, access_token).await?;
        envelope.into_identity()
    }

    fn post_link(&self, handle: &str, external_id: &str) -> String {
        format!(
            "https://x.com/{}/status/{}",
            handle.trim_start_matches('@'),
            external_id
        )
    }
}
