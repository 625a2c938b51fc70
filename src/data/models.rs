//! Data models
//!
//! Rust structs representing database entities and the values the
//! sync engine hands to the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// User
// =============================================================================

/// A person known through the reverse-proxy identity header
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    /// Identity asserted by the proxy (stable across logins)
    pub user_id: String,
    pub email: String,
    pub username: String,
    /// Values: admin, creator
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Creator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Creator => "creator",
        }
    }
}

// =============================================================================
// Social Account
// =============================================================================

/// A user-owned account on an external platform
///
/// Token columns are never serialized; they only flow between the store
/// and the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SocialAccount {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    /// Handle on the platform (without '@')
    pub account_name: String,
    /// Platform-assigned identity, unknown until first resolved
    #[serde(rename = "account_id", skip_serializing_if = "Option::is_none")]
    pub platform_user_id: Option<String>,
    #[serde(skip_serializing, default)]
    pub access_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pull_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialAccount {
    /// OAuth access token, if one is stored and non-empty
    pub fn oauth_access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|token| !token.is_empty())
    }

    /// OAuth refresh token, if one is stored and non-empty
    pub fn oauth_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Stored platform identity, if already resolved
    pub fn resolved_platform_user_id(&self) -> Option<&str> {
        self.platform_user_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether the stored access token is past its expiry
    ///
    /// Tokens without an expiry are treated as still valid.
    pub fn token_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

/// Fields for a new social account
#[derive(Debug, Clone, Deserialize)]
pub struct NewSocialAccount {
    pub platform: String,
    pub account_name: String,
    #[serde(rename = "account_id")]
    pub platform_user_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

// =============================================================================
// Content
// =============================================================================

/// A tracked piece of content (manual entry or synced post)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_account_id: Option<i64>,
    pub platform: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "external_post_id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw content row; tags are stored as a JSON array string
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ContentRow {
    pub id: i64,
    pub user_id: i64,
    pub social_account_id: Option<i64>,
    pub platform: String,
    pub link: String,
    pub original_text: Option<String>,
    pub description: Option<String>,
    pub tags: String,
    pub external_id: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContentRow> for Content {
    fn from(row: ContentRow) -> Self {
        let tags = serde_json::from_str::<Vec<String>>(&row.tags).unwrap_or_else(|error| {
            tracing::warn!(content_id = row.id, %error, "Ignoring malformed tags column");
            Vec::new()
        });

        Self {
            id: row.id,
            user_id: row.user_id,
            social_account_id: row.social_account_id,
            platform: row.platform,
            link: row.link,
            original_text: row.original_text,
            description: row.description,
            tags,
            external_id: row.external_id,
            posted_at: row.posted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Content joined with its owner, for the admin listing
#[derive(Debug, Clone, Serialize)]
pub struct ContentWithUser {
    #[serde(flatten)]
    pub content: Content,
    pub username: String,
    pub email: String,
}

/// Fields for manually entered content
#[derive(Debug, Clone, Deserialize)]
pub struct NewContent {
    pub social_account_id: Option<i64>,
    pub platform: String,
    pub link: String,
    pub original_text: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A platform post mapped onto the store's content shape
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncedContent {
    pub user_id: i64,
    pub social_account_id: i64,
    pub platform: String,
    pub link: String,
    pub text: String,
    pub external_id: String,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Result of handing a synced post to the content store
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// A new record was stored
    Created(Content),
    /// The `(account, external_id)` pair was already present; nothing written
    Duplicate,
}

/// Filters for the admin content listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentFilters {
    pub platform: Option<String>,
    /// Case-insensitive substring match on the owner's username
    pub username: Option<String>,
}
