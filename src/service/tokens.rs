//! OAuth token lifecycle
//!
//! Decides whether an account's stored access token can be used for a
//! sync, refreshing and persisting it first when it has expired.

use chrono::Utc;
use std::sync::Arc;

use crate::auth::OAuthHandler;
use crate::data::{AccountStore, SocialAccount};
use crate::metrics;

pub struct TokenLifecycle {
    oauth: Arc<OAuthHandler>,
    accounts: Arc<dyn AccountStore>,
}

impl TokenLifecycle {
    pub fn new(oauth: Arc<OAuthHandler>, accounts: Arc<dyn AccountStore>) -> Self {
        Self { oauth, accounts }
    }

    /// Access token to try for this account, if any
    ///
    /// - No stored token: `None`, the app-level path is used alone.
    /// - Valid token, or expired with no refresh token: the stored token.
    /// - Expired with a refresh token: exactly one refresh. The new token
    ///   on success, `None` on failure so the stale token is never tried.
    pub async fn access_token_for(&self, account: &SocialAccount) -> Option<String> {
        let access_token = account.oauth_access_token()?;

        if !account.token_expired_at(Utc::now()) {
            return Some(access_token.to_string());
        }

        let Some(refresh_token) = account.oauth_refresh_token() else {
            tracing::debug!(
                account_id = account.id,
                "Access token expired and no refresh token stored; trying it as is"
            );
            return Some(access_token.to_string());
        };

        match self.oauth.refresh_access_token(refresh_token).await {
            Ok(tokens) => {
                metrics::TOKEN_REFRESH_TOTAL
                    .with_label_values(&["success"])
                    .inc();

                // Keep the old refresh token if the provider did not rotate it
                let refresh_token = if tokens.refresh_token.is_empty() {
                    refresh_token
                } else {
                    tokens.refresh_token.as_str()
                };
                let expires_at = tokens.expires_at(Utc::now());

                if let Err(e) = self
                    .accounts
                    .update_tokens(account.id, &tokens.access_token, refresh_token, expires_at)
                    .await
                {
                    tracing::warn!(account_id = account.id, error = %e, "Failed to persist refreshed tokens");
                }

                tracing::info!(account_id = account.id, %expires_at, "Refreshed OAuth access token");
                Some(tokens.access_token)
            }
            Err(e) => {
                metrics::TOKEN_REFRESH_TOTAL
                    .with_label_values(&["failure"])
                    .inc();
                tracing::warn!(
                    account_id = account.id,
                    error = %e,
                    "Token refresh failed; falling back to app-level token"
                );
                None
            }
        }
    }
}
