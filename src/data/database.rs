//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with runtime-checked queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use super::store::{AccountStore, ContentStore};
use crate::error::AppError;

const CONTENT_COLUMNS: &str = "id, user_id, social_account_id, platform, link, original_text, \
     description, tags, external_id, posted_at, created_at, updated_at";

fn encode_tags(tags: &[String]) -> Result<String, AppError> {
    serde_json::to_string(tags).map_err(|e| AppError::Internal(e.into()))
}

/// Database connection pool wrapper.
///
/// `INSERT ... RETURNING` statements are read with `fetch_all` so the write
/// has finished before the connection goes back to the pool.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        Self::migrate(pool).await
    }

    /// Connect to a private in-memory database
    ///
    /// A single connection keeps the schema alive for the pool's lifetime.
    pub async fn connect_in_memory() -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, AppError> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get or create the user behind a proxy identity
    ///
    /// Email and username are refreshed on every call; the role is only
    /// set on first insert.
    pub async fn get_or_create_user(
        &self,
        external_id: &str,
        email: &str,
        username: &str,
    ) -> Result<User, AppError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, email, username, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                email = excluded.email,
                username = excluded.username,
                updated_at = excluded.updated_at
            RETURNING id, user_id, email, username, role, created_at, updated_at
            "#,
        )
        .bind(external_id)
        .bind(email)
        .bind(username)
        .bind(UserRole::Creator.as_str())
        .bind(now)
        .bind(now)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::Database(sqlx::Error::RowNotFound))?;

        Ok(user)
    }

    /// Change a user's role
    pub async fn set_user_role(&self, user_id: i64, role: UserRole) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Social Accounts
    // =========================================================================

    /// Create a social account without an expiry for its tokens
    pub async fn create_social_account(
        &self,
        user_id: i64,
        account: &NewSocialAccount,
    ) -> Result<SocialAccount, AppError> {
        self.insert_social_account(user_id, account, None).await
    }

    /// Create a social account from a completed OAuth flow
    pub async fn create_social_account_with_tokens(
        &self,
        user_id: i64,
        account: &NewSocialAccount,
        expires_at: DateTime<Utc>,
    ) -> Result<SocialAccount, AppError> {
        self.insert_social_account(user_id, account, Some(expires_at))
            .await
    }

    async fn insert_social_account(
        &self,
        user_id: i64,
        account: &NewSocialAccount,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<SocialAccount, AppError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, SocialAccount>(
            r#"
            INSERT INTO social_accounts (
                user_id, platform, account_name, platform_user_id,
                access_token, refresh_token, token_expires_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&account.platform)
        .bind(account.account_name.trim_start_matches('@'))
        .bind(&account.platform_user_id)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(expires_at)
        .bind(now)
        .bind(now)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::Database(sqlx::Error::RowNotFound))?;

        Ok(created)
    }

    /// List a user's social accounts, newest first
    pub async fn list_social_accounts(&self, user_id: i64) -> Result<Vec<SocialAccount>, AppError> {
        let accounts = sqlx::query_as::<_, SocialAccount>(
            "SELECT * FROM social_accounts WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// Get a social account owned by `user_id`
    pub async fn get_social_account(
        &self,
        account_id: i64,
        user_id: i64,
    ) -> Result<Option<SocialAccount>, AppError> {
        let account = sqlx::query_as::<_, SocialAccount>(
            "SELECT * FROM social_accounts WHERE id = ? AND user_id = ?",
        )
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Find the account a user already linked for a platform identity
    pub async fn get_social_account_by_platform_user_id(
        &self,
        user_id: i64,
        platform: &str,
        platform_user_id: &str,
    ) -> Result<Option<SocialAccount>, AppError> {
        let account = sqlx::query_as::<_, SocialAccount>(
            r#"
            SELECT * FROM social_accounts
            WHERE user_id = ? AND platform = ? AND platform_user_id = ?
            ORDER BY id LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(platform)
        .bind(platform_user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Delete a social account owned by `user_id`
    ///
    /// # Errors
    /// `NotFound` if no such account belongs to the user
    pub async fn delete_social_account(&self, account_id: i64, user_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM social_accounts WHERE id = ? AND user_id = ?")
            .bind(account_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Create manually entered content
    ///
    /// # Returns
    /// `None` if the user already tracks this link
    pub async fn create_content(
        &self,
        user_id: i64,
        content: &NewContent,
    ) -> Result<Option<Content>, AppError> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO content (
                user_id, social_account_id, platform, link, original_text,
                description, tags, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            RETURNING {CONTENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(user_id)
            .bind(content.social_account_id)
            .bind(&content.platform)
            .bind(&content.link)
            .bind(&content.original_text)
            .bind(&content.description)
            .bind(encode_tags(&content.tags)?)
            .bind(now)
            .bind(now)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .next();

        Ok(row.map(Content::from))
    }

    /// List a user's content, newest first
    pub async fn list_content(&self, user_id: i64) -> Result<Vec<Content>, AppError> {
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Content::from).collect())
    }

    /// List content across all users with optional filters
    pub async fn list_all_content(
        &self,
        filters: &ContentFilters,
    ) -> Result<Vec<ContentWithUser>, AppError> {
        #[derive(sqlx::FromRow)]
        struct Joined {
            #[sqlx(flatten)]
            content: ContentRow,
            username: String,
            email: String,
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT c.id, c.user_id, c.social_account_id, c.platform, c.link,
                   c.original_text, c.description, c.tags, c.external_id,
                   c.posted_at, c.created_at, c.updated_at,
                   u.username, u.email
            FROM content c
            JOIN users u ON c.user_id = u.id
            WHERE 1 = 1
            "#,
        );

        if let Some(platform) = filters.platform.as_deref().filter(|p| !p.is_empty()) {
            query.push(" AND c.platform = ").push_bind(platform.to_string());
        }
        if let Some(username) = filters.username.as_deref().filter(|u| !u.is_empty()) {
            // LIKE is case-insensitive for ASCII in SQLite
            query
                .push(" AND u.username LIKE ")
                .push_bind(format!("%{}%", username));
        }
        query.push(" ORDER BY c.created_at DESC, c.id DESC");

        let rows = query
            .build_query_as::<Joined>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ContentWithUser {
                content: row.content.into(),
                username: row.username,
                email: row.email,
            })
            .collect())
    }

    /// Delete content owned by `user_id`
    pub async fn delete_content(&self, content_id: i64, user_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM content WHERE id = ? AND user_id = ?")
            .bind(content_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Store seams
// =============================================================================

#[async_trait]
impl AccountStore for Database {
    async fn get_latest_external_post_id(
        &self,
        account_id: i64,
    ) -> Result<Option<String>, AppError> {
        // Decimal ids compare numerically by (length, text)
        let latest = sqlx::query_scalar::<_, String>(
            r#"
            SELECT external_id FROM content
            WHERE social_account_id = ? AND external_id IS NOT NULL AND external_id != ''
            ORDER BY length(external_id) DESC, external_id DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(latest)
    }

    async fn update_tokens(
        &self,
        account_id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE social_accounts
            SET access_token = ?, refresh_token = ?, token_expires_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn update_platform_user_id(
        &self,
        account_id: i64,
        platform_user_id: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE social_accounts SET platform_user_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(platform_user_id)
        .bind(Utc::now())
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn update_last_pull(&self, account_id: i64) -> Result<(), AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE social_accounts SET last_pull_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for Database {
    async fn create_synced_content(
        &self,
        content: &NewSyncedContent,
    ) -> Result<IngestOutcome, AppError> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO content (
                user_id, social_account_id, platform, link, original_text,
                tags, external_id, posted_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, '[]', ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            RETURNING {CONTENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(content.user_id)
            .bind(content.social_account_id)
            .bind(&content.platform)
            .bind(&content.link)
            .bind(&content.text)
            .bind(&content.external_id)
            .bind(content.posted_at)
            .bind(now)
            .bind(now)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .next();

        Ok(match row {
            Some(row) => IngestOutcome::Created(row.into()),
            None => IngestOutcome::Duplicate,
        })
    }
}
