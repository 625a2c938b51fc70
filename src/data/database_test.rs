//! Database tests

use super::*;
use crate::error::AppError;
use chrono::{Duration, Utc};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

async fn create_user_and_account(db: &Database) -> (User, SocialAccount) {
    let user = db
        .get_or_create_user("proxy-user-1", "alice@example.com", "alice")
        .await
        .unwrap();
    let account = db
        .create_social_account(
            user.id,
            &NewSocialAccount {
                platform: "twitter".to_string(),
                account_name: "@alice".to_string(),
                platform_user_id: None,
                access_token: None,
                refresh_token: None,
            },
        )
        .await
        .unwrap();
    (user, account)
}

fn synced(user: &User, account: &SocialAccount, external_id: &str) -> NewSyncedContent {
    NewSyncedContent {
        user_id: user.id,
        social_account_id: account.id,
        platform: "twitter".to_string(),
        link: format!("https://x.com/alice/status/{external_id}"),
        text: format!("post {external_id}"),
        external_id: external_id.to_string(),
        posted_at: Some(Utc::now()),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_get_or_create_user_refreshes_profile_but_keeps_role() {
    let (db, _temp_dir) = create_test_db().await;

    let first = db
        .get_or_create_user("proxy-user-1", "alice@example.com", "alice")
        .await
        .unwrap();
    assert_eq!(first.role, "creator");

    db.set_user_role(first.id, UserRole::Admin).await.unwrap();

    let second = db
        .get_or_create_user("proxy-user-1", "alice@new.example.com", "alice2")
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.email, "alice@new.example.com");
    assert_eq!(second.username, "alice2");
    assert!(second.is_admin());
}

#[tokio::test]
async fn test_social_account_crud() {
    let (db, _temp_dir) = create_test_db().await;
    let (user, account) = create_user_and_account(&db).await;

    // Leading '@' is stripped from handles
    assert_eq!(account.account_name, "alice");
    assert!(account.platform_user_id.is_none());

    let listed = db.list_social_accounts(user.id).await.unwrap();
    assert_eq!(listed.len(), 1);

    let other = db
        .get_or_create_user("proxy-user-2", "bob@example.com", "bob")
        .await
        .unwrap();
    assert!(db.get_social_account(account.id, other.id).await.unwrap().is_none());
    assert!(matches!(
        db.delete_social_account(account.id, other.id).await,
        Err(AppError::NotFound)
    ));

    db.delete_social_account(account.id, user.id).await.unwrap();
    assert!(db.list_social_accounts(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_token_and_identity_updates() {
    let (db, _temp_dir) = create_test_db().await;
    let (user, account) = create_user_and_account(&db).await;

    let expires_at = Utc::now() + Duration::hours(2);
    db.update_tokens(account.id, "access-2", "refresh-2", expires_at)
        .await
        .unwrap();
    db.update_platform_user_id(account.id, "2244994945")
        .await
        .unwrap();
    db.update_last_pull(account.id).await.unwrap();

    let stored = db
        .get_social_account(account.id, user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token.as_deref(), Some("access-2"));
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-2"));
    assert_eq!(
        stored.token_expires_at.map(|t| t.timestamp()),
        Some(expires_at.timestamp())
    );
    assert_eq!(stored.platform_user_id.as_deref(), Some("2244994945"));
    assert!(stored.last_pull_at.is_some());

    let found = db
        .get_social_account_by_platform_user_id(user.id, "twitter", "2244994945")
        .await
        .unwrap();
    assert_eq!(found.map(|a| a.id), Some(account.id));
}

#[tokio::test]
async fn test_updates_on_missing_account_report_not_found() {
    let (db, _temp_dir) = create_test_db().await;

    assert!(matches!(
        db.update_last_pull(9999).await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        db.update_platform_user_id(9999, "1").await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn test_synced_content_is_created_once_per_external_id() {
    let (db, _temp_dir) = create_test_db().await;
    let (user, account) = create_user_and_account(&db).await;

    let post = synced(&user, &account, "1001");

    let first = db.create_synced_content(&post).await.unwrap();
    let IngestOutcome::Created(content) = first else {
        panic!("first ingestion must create a record");
    };
    assert_eq!(content.external_id.as_deref(), Some("1001"));
    assert_eq!(content.original_text.as_deref(), Some("post 1001"));
    assert!(content.tags.is_empty());

    let second = db.create_synced_content(&post).await.unwrap();
    assert!(matches!(second, IngestOutcome::Duplicate));

    assert_eq!(db.list_content(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_inserts_are_visible_to_the_next_read() {
    let (db, _temp_dir) = create_test_db().await;

    for round in 0..20 {
        let user = db
            .get_or_create_user(&format!("proxy-user-{round}"), "bob@example.com", "bob")
            .await
            .unwrap();
        let account = db
            .create_social_account(
                user.id,
                &NewSocialAccount {
                    platform: "twitter".to_string(),
                    account_name: format!("bob{round}"),
                    platform_user_id: None,
                    access_token: None,
                    refresh_token: None,
                },
            )
            .await
            .unwrap();
        for _ in 0..3 {
            assert_eq!(db.list_social_accounts(user.id).await.unwrap().len(), 1);
        }

        let ingested = db
            .create_synced_content(&synced(&user, &account, "5001"))
            .await
            .unwrap();
        assert!(matches!(ingested, IngestOutcome::Created(_)));
        let manual = NewContent {
            social_account_id: None,
            platform: "blog".to_string(),
            link: format!("https://blog.test/{round}"),
            original_text: None,
            description: None,
            tags: Vec::new(),
        };
        assert!(db.create_content(user.id, &manual).await.unwrap().is_some());
        for _ in 0..3 {
            assert_eq!(db.list_content(user.id).await.unwrap().len(), 2);
        }
    }
}

#[tokio::test]
async fn test_latest_external_post_id_orders_numerically() {
    let (db, _temp_dir) = create_test_db().await;
    let (user, account) = create_user_and_account(&db).await;

    assert!(
        db.get_latest_external_post_id(account.id)
            .await
            .unwrap()
            .is_none()
    );

    for id in ["999", "1000", "998"] {
        db.create_synced_content(&synced(&user, &account, id))
            .await
            .unwrap();
    }

    let latest = db.get_latest_external_post_id(account.id).await.unwrap();
    assert_eq!(latest.as_deref(), Some("1000"));
}

#[tokio::test]
async fn test_manual_content_rejects_duplicate_link() {
    let (db, _temp_dir) = create_test_db().await;
    let (user, _account) = create_user_and_account(&db).await;

    let entry = NewContent {
        social_account_id: None,
        platform: "youtube".to_string(),
        link: "https://youtube.com/watch?v=abc".to_string(),
        original_text: None,
        description: Some("launch video".to_string()),
        tags: vec!["launch".to_string(), "video".to_string()],
    };

    let created = db.create_content(user.id, &entry).await.unwrap().unwrap();
    assert_eq!(created.tags, vec!["launch", "video"]);

    assert!(db.create_content(user.id, &entry).await.unwrap().is_none());

    db.delete_content(created.id, user.id).await.unwrap();
    assert!(matches!(
        db.delete_content(created.id, user.id).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn test_list_all_content_filters() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, account) = create_user_and_account(&db).await;
    let bob = db
        .get_or_create_user("proxy-user-2", "bob@example.com", "Bobby")
        .await
        .unwrap();

    db.create_synced_content(&synced(&alice, &account, "1"))
        .await
        .unwrap();
    db.create_content(
        bob.id,
        &NewContent {
            social_account_id: None,
            platform: "instagram".to_string(),
            link: "https://instagram.com/p/xyz".to_string(),
            original_text: None,
            description: None,
            tags: Vec::new(),
        },
    )
    .await
    .unwrap();

    let all = db.list_all_content(&ContentFilters::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let twitter_only = db
        .list_all_content(&ContentFilters {
            platform: Some("twitter".to_string()),
            username: None,
        })
        .await
        .unwrap();
    assert_eq!(twitter_only.len(), 1);
    assert_eq!(twitter_only[0].username, "alice");

    let by_username = db
        .list_all_content(&ContentFilters {
            platform: None,
            username: Some("bob".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(by_username.len(), 1);
    assert_eq!(by_username[0].email, "bob@example.com");
}

#[tokio::test]
async fn test_in_memory_database_is_usable() {
    let db = Database::connect_in_memory().await.unwrap();
    let (user, account) = create_user_and_account(&db).await;
    assert_eq!(account.user_id, user.id);
}
