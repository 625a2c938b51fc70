//! Account sync
//!
//! Pulls new posts for one social account and hands them to the content
//! store.
//!
//! # Credential chain
//! Strategies are tried in order and the first successful fetch wins:
//! 1. The account's OAuth access token (refreshed first if expired)
//! 2. The platform's application-level token
//!
//! When every strategy fails, the error of the last one is returned. A
//! rate-limit signal therefore reaches the caller unchanged.

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::tokens::TokenLifecycle;
use crate::auth::OAuthHandler;
use crate::data::{AccountStore, ContentStore, IngestOutcome, NewSyncedContent, SocialAccount};
use crate::error::AppError;
use crate::metrics;
use crate::platform::{Credential, PlatformClient, PlatformRegistry, Post};

const MESSAGE_NOTHING_NEW: &str = "No new tweets found";
const MESSAGE_COMPLETED: &str = "Sync completed successfully";

/// Outcome of one sync call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub account_id: i64,
    pub platform: String,
    pub account_name: String,
    pub synced_count: u32,
    pub skipped_count: u32,
    /// One entry per post that could not be stored
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub message: String,
}

impl SyncResult {
    fn new(account: &SocialAccount) -> Self {
        Self {
            account_id: account.id,
            platform: account.platform.clone(),
            account_name: account.account_name.clone(),
            synced_count: 0,
            skipped_count: 0,
            errors: Vec::new(),
            message: String::new(),
        }
    }
}

/// Posts fetched with one credential
struct FetchedPosts {
    posts: Vec<Post>,
    /// Handle used to build post links
    handle: String,
    /// Platform user id looked up during the fetch, not yet stored
    resolved_user_id: Option<String>,
}

/// Sync orchestrator
pub struct SyncService {
    platforms: PlatformRegistry,
    tokens: TokenLifecycle,
    accounts: Arc<dyn AccountStore>,
    content: Arc<dyn ContentStore>,
    max_results: u32,
}

impl SyncService {
    pub fn new(
        platforms: PlatformRegistry,
        oauth: Arc<OAuthHandler>,
        accounts: Arc<dyn AccountStore>,
        content: Arc<dyn ContentStore>,
        max_results: u32,
    ) -> Self {
        Self {
            platforms,
            tokens: TokenLifecycle::new(oauth, accounts.clone()),
            accounts,
            content,
            max_results,
        }
    }

    /// Sync one account owned by `user_id`
    ///
    /// # Errors
    /// - `UnsupportedPlatform` before any network call
    /// - `NotConfigured` when the account has no usable credential
    /// - the last strategy's error when every fetch failed
    pub async fn sync(&self, account: &SocialAccount, user_id: i64) -> Result<SyncResult, AppError> {
        let client = self.platforms.get(&account.platform)?;

        let since_id = match self.accounts.get_latest_external_post_id(account.id).await {
            Ok(since_id) => since_id,
            Err(e) => {
                tracing::warn!(account_id = account.id, error = %e, "Failed to read latest synced post id; fetching without cursor");
                None
            }
        };

        let plan = self.credential_plan(client.as_ref(), account).await;
        if plan.is_empty() {
            return Err(AppError::NotConfigured(format!(
                "no credentials available to sync {} account @{}",
                account.platform, account.account_name
            )));
        }

        let mut last_error = None;
        let mut fetched = None;
        for credential in &plan {
            let strategy = credential.strategy();
            match self
                .fetch_with(client.as_ref(), account, since_id.as_deref(), credential)
                .await
            {
                Ok(posts) => {
                    record_attempt(account, strategy, "success");
                    fetched = Some(posts);
                    break;
                }
                Err(e) => {
                    record_attempt(account, strategy, "failure");
                    tracing::warn!(
                        account_id = account.id,
                        strategy,
                        error = %e,
                        "Fetch failed with this credential"
                    );
                    last_error = Some(e);
                }
            }
        }

        let fetched = match (fetched, last_error) {
            (Some(fetched), _) => fetched,
            (None, Some(e)) => return Err(e),
            (None, None) => return Err(AppError::Internal(anyhow::anyhow!("empty credential plan"))),
        };

        if let Some(platform_user_id) = &fetched.resolved_user_id {
            if let Err(e) = self
                .accounts
                .update_platform_user_id(account.id, platform_user_id)
                .await
            {
                tracing::warn!(account_id = account.id, error = %e, "Failed to store platform user id");
            }
        }

        let result = self.ingest(client.as_ref(), account, user_id, fetched).await;

        tracing::info!(
            account_id = account.id,
            platform = %account.platform,
            synced = result.synced_count,
            skipped = result.skipped_count,
            errors = result.errors.len(),
            "Sync finished"
        );
        Ok(result)
    }

    /// Like [`Self::sync`], but gives up as soon as `cancel` fires
    ///
    /// In-flight requests are dropped and no partial result is returned.
    pub async fn sync_with_cancellation(
        &self,
        account: &SocialAccount,
        user_id: i64,
        cancel: CancellationToken,
    ) -> Result<SyncResult, AppError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(account_id = account.id, "Sync cancelled");
                Err(AppError::Cancelled)
            }
            result = self.sync(account, user_id) => result,
        }
    }

    async fn credential_plan(
        &self,
        client: &dyn PlatformClient,
        account: &SocialAccount,
    ) -> Vec<Credential> {
        let mut plan = Vec::with_capacity(2);
        if let Some(access_token) = self.tokens.access_token_for(account).await {
            plan.push(Credential::User(access_token));
        }
        if let Some(app) = client.app_credential() {
            plan.push(app);
        }
        plan
    }

    async fn fetch_with(
        &self,
        client: &dyn PlatformClient,
        account: &SocialAccount,
        since_id: Option<&str>,
        credential: &Credential,
    ) -> Result<FetchedPosts, AppError> {
        let (platform_user_id, handle, resolved) = match account.resolved_platform_user_id() {
            Some(id) => (id.to_string(), account.account_name.clone(), false),
            None => match credential {
                // The token owner is the account being synced
                Credential::User(access_token) => {
                    let me = client.authenticated_identity(access_token).await?;
                    (me.id, me.username, true)
                }
                Credential::App(_) => {
                    let id = client
                        .resolve_identity(&account.account_name, credential)
                        .await?;
                    (id, account.account_name.clone(), true)
                }
            },
        };

        let posts = client
            .list_recent_posts(&platform_user_id, self.max_results, since_id, credential)
            .await?;

        tracing::debug!(
            account_id = account.id,
            strategy = credential.strategy(),
            fetched = posts.len(),
            "Fetched posts"
        );

        Ok(FetchedPosts {
            posts,
            handle,
            resolved_user_id: resolved.then_some(platform_user_id),
        })
    }

    async fn ingest(
        &self,
        client: &dyn PlatformClient,
        account: &SocialAccount,
        user_id: i64,
        fetched: FetchedPosts,
    ) -> SyncResult {
        let platform = client.platform().as_str();
        let mut result = SyncResult::new(account);

        for post in fetched.posts {
            let record = NewSyncedContent {
                user_id,
                social_account_id: account.id,
                platform: platform.to_string(),
                link: client.post_link(&fetched.handle, &post.external_id),
                text: post.text,
                external_id: post.external_id,
                posted_at: post.created_at,
            };

            let outcome = match self.content.create_synced_content(&record).await {
                Ok(IngestOutcome::Created(_)) => {
                    result.synced_count += 1;
                    "synced"
                }
                Ok(IngestOutcome::Duplicate) => {
                    result.skipped_count += 1;
                    "skipped"
                }
                Err(e) => {
                    tracing::warn!(
                        account_id = account.id,
                        external_id = %record.external_id,
                        error = %e,
                        "Failed to store synced post"
                    );
                    result.errors.push(e.to_string());
                    "error"
                }
            };
            metrics::POSTS_INGESTED_TOTAL
                .with_label_values(&[platform, outcome])
                .inc();
        }

        result.message = if result.synced_count == 0 && result.skipped_count == 0 {
            MESSAGE_NOTHING_NEW
        } else {
            MESSAGE_COMPLETED
        }
        .to_string();

        result
    }
}

fn record_attempt(account: &SocialAccount, strategy: &str, status: &str) {
    metrics::SYNC_RUNS_TOTAL
        .with_label_values(&[account.platform.as_str(), strategy, status])
        .inc();
}
