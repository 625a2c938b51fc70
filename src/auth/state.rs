//! Pending OAuth authorization attempts
//!
//! Process-wide map from state token to the PKCE verifier and requesting
//! user. Entries are single-use and evicted by age.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{MAX_OAUTH_STATE_SECONDS, OAuthStateConfig};
use crate::error::AppError;
use crate::metrics;

/// One authorization attempt waiting for its callback
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub user_id: i64,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

/// Configured window, capped so the conversion cannot overflow
fn window(seconds: u64) -> Duration {
    Duration::seconds(seconds.min(MAX_OAUTH_STATE_SECONDS) as i64)
}

/// Concurrency-safe state table with TTL eviction
#[derive(Clone)]
pub struct OAuthStateStore {
    entries: Arc<RwLock<HashMap<String, PendingAuthorization>>>,
    /// Older entries are rejected at exchange time
    max_age: Duration,
    /// Older entries are dropped by [`Self::prune`]
    retention: Duration,
}

impl OAuthStateStore {
    pub fn new(config: &OAuthStateConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_age: window(config.state_max_age_seconds),
            retention: window(config.state_retention_seconds),
        }
    }

    /// Record a new attempt
    pub async fn insert(&self, state: String, user_id: i64, code_verifier: String) {
        self.insert_at(state, user_id, code_verifier, Utc::now())
            .await;
    }

    pub(crate) async fn insert_at(
        &self,
        state: String,
        user_id: i64,
        code_verifier: String,
        created_at: DateTime<Utc>,
    ) {
        let mut entries = self.entries.write().await;
        entries.insert(
            state,
            PendingAuthorization {
                user_id,
                code_verifier,
                created_at,
            },
        );
        metrics::OAUTH_PENDING_STATES.set(entries.len() as i64);
    }

    /// Remove and return the attempt for `state`
    ///
    /// The entry is gone after this call whatever the outcome, so a
    /// replayed state token always fails.
    pub async fn take(&self, state: &str) -> Result<PendingAuthorization, AppError> {
        let removed = {
            let mut entries = self.entries.write().await;
            let removed = entries.remove(state);
            metrics::OAUTH_PENDING_STATES.set(entries.len() as i64);
            removed
        };

        let pending =
            removed.ok_or_else(|| AppError::OAuthState("invalid or expired state".to_string()))?;

        if Utc::now() - pending.created_at > self.max_age {
            return Err(AppError::OAuthState("state expired".to_string()));
        }

        Ok(pending)
    }

    /// Drop entries older than the retention window
    ///
    /// Returns how many entries were removed.
    pub async fn prune(&self) -> usize {
        let cutoff = Utc::now() - self.retention;

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, pending| pending.created_at >= cutoff);
        metrics::OAUTH_PENDING_STATES.set(entries.len() as i64);

        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Pruned stale OAuth states");
        }
        removed
    }

    /// Prune on a background task without waiting for it
    pub fn spawn_prune(&self) {
        let store = self.clone();
        tokio::spawn(async move {
            store.prune().await;
        });
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
