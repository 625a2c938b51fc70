//! Store seams used by the sync engine
//!
//! The engine never talks to SQL directly; it sees accounts and content
//! only through these traits. `Database` is the production
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{IngestOutcome, NewSyncedContent};
use crate::error::AppError;

/// Account-side operations the engine needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Newest external post id already ingested for the account
    async fn get_latest_external_post_id(&self, account_id: i64)
    -> Result<Option<String>, AppError>;

    /// Persist tokens obtained from a refresh or an OAuth callback
    async fn update_tokens(
        &self,
        account_id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Backfill the platform-assigned identity
    async fn update_platform_user_id(
        &self,
        account_id: i64,
        platform_user_id: &str,
    ) -> Result<(), AppError>;

    /// Record that the account was just pulled
    async fn update_last_pull(&self, account_id: i64) -> Result<(), AppError>;
}

/// Content-side operations the engine needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a synced post once per `(account, external_id)`
    ///
    /// A repeat is reported as [`IngestOutcome::Duplicate`], not as an error.
    async fn create_synced_content(
        &self,
        content: &NewSyncedContent,
    ) -> Result<IngestOutcome, AppError>;
}
