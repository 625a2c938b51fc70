//! E2E tests for pulling posts from X/Twitter

mod common;

use common::TestServer;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn tweets_page() -> serde_json::Value {
    json!({
        "data": [
            {"id": "103", "text": "third", "author_id": "42", "created_at": "2025-01-03T00:00:00.000Z"},
            {"id": "102", "text": "second", "author_id": "42", "created_at": "2025-01-02T00:00:00.000Z"},
            {"id": "101", "text": "first", "author_id": "42", "created_at": "2025-01-01T00:00:00.000Z"},
        ],
        "meta": {"result_count": 3, "newest_id": "103", "oldest_id": "101"}
    })
}

async fn pull(server: &TestServer, account_id: i64) -> reqwest::Response {
    server
        .as_user(
            server
                .client
                .post(&server.url(&format!("/api/social-accounts/{account_id}/pull"))),
        )
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_pull_with_app_token_ingests_and_dedups() {
    let server = TestServer::new().await;

    Mock::given(method("GET"))
        .and(path("/2/users/by/username/alice_posts"))
        .and(header("authorization", "Bearer test-app-bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "42", "username": "alice_posts", "name": "Alice"}
        })))
        .expect(1)
        .mount(&server.platform)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tweets_page()))
        .expect(2)
        .mount(&server.platform)
        .await;

    let account = server.create_account("alice_posts").await;
    let id = account["id"].as_i64().unwrap();

    let response = pull(&server, id).await;
    assert_eq!(response.status(), 200);
    let result: serde_json::Value = response.json().await.unwrap();
    assert_eq!(result["account_id"], id);
    assert_eq!(result["platform"], "twitter");
    assert_eq!(result["account_name"], "alice_posts");
    assert_eq!(result["synced_count"], 3);
    assert_eq!(result["skipped_count"], 0);
    assert_eq!(result["message"], "Sync completed successfully");
    assert!(result.get("errors").is_none());

    let response = server
        .as_user(server.client.get(&server.url("/api/content")))
        .send()
        .await
        .unwrap();
    let items: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(items.len(), 3);
    let mut links: Vec<&str> = items.iter().map(|c| c["link"].as_str().unwrap()).collect();
    links.sort_unstable();
    assert_eq!(
        links,
        vec![
            "https://x.com/alice_posts/status/101",
            "https://x.com/alice_posts/status/102",
            "https://x.com/alice_posts/status/103",
        ]
    );

    // The resolved identity and pull time were stored
    let response = server
        .as_user(server.client.get(&server.url("/api/social-accounts")))
        .send()
        .await
        .unwrap();
    let accounts: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(accounts[0]["account_id"], "42");
    assert!(accounts[0]["last_pull_at"].is_string());

    // Second pull: no handle lookup, cursor sent, everything skipped
    let response = pull(&server, id).await;
    assert_eq!(response.status(), 200);
    let result: serde_json::Value = response.json().await.unwrap();
    assert_eq!(result["synced_count"], 0);
    assert_eq!(result["skipped_count"], 3);
    assert_eq!(result["message"], "No new tweets found");

    let requests = server.platform.received_requests().await.unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.url.path(), "/2/users/42/tweets");
    assert!(
        last.url
            .query_pairs()
            .any(|(key, value)| key == "since_id" && value == "103")
    );
}

#[tokio::test]
async fn test_pull_rate_limited_returns_retry_after() {
    let server = TestServer::new().await;
    let reset = chrono::Utc::now().timestamp() + 120;

    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-reset", reset.to_string().as_str())
                .set_body_json(json!({"title": "Too Many Requests"})),
        )
        .mount(&server.platform)
        .await;

    let response = server
        .as_user(server.client.post(&server.url("/api/social-accounts")))
        .json(&json!({"platform": "twitter", "account_name": "alice_posts", "account_id": "42"}))
        .send()
        .await
        .unwrap();
    let account: serde_json::Value = response.json().await.unwrap();

    let response = pull(&server, account["id"].as_i64().unwrap()).await;

    assert_eq!(response.status(), 429);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
    let retry_after = body["retry_after"].as_u64().unwrap();
    assert!((60..=120).contains(&retry_after), "retry_after = {retry_after}");
}

#[tokio::test]
async fn test_pull_prefers_stored_oauth_token() {
    let server = TestServer::new().await;

    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .and(header("authorization", "Bearer user-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tweets_page()))
        .expect(1)
        .mount(&server.platform)
        .await;

    let response = server
        .as_user(server.client.post(&server.url("/api/social-accounts")))
        .json(&json!({
            "platform": "twitter",
            "account_name": "alice_posts",
            "account_id": "42",
            "access_token": "user-access",
        }))
        .send()
        .await
        .unwrap();
    let account: serde_json::Value = response.json().await.unwrap();

    let response = pull(&server, account["id"].as_i64().unwrap()).await;

    assert_eq!(response.status(), 200);
    let result: serde_json::Value = response.json().await.unwrap();
    assert_eq!(result["synced_count"], 3);
}

#[tokio::test]
async fn test_pull_upstream_failure_is_server_error() {
    let server = TestServer::new().await;

    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .respond_with(ResponseTemplate::new(503).set_body_string("over capacity"))
        .mount(&server.platform)
        .await;

    let response = server
        .as_user(server.client.post(&server.url("/api/social-accounts")))
        .json(&json!({"platform": "twitter", "account_name": "alice_posts", "account_id": "42"}))
        .send()
        .await
        .unwrap();
    let account: serde_json::Value = response.json().await.unwrap();

    let response = pull(&server, account["id"].as_i64().unwrap()).await;

    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn test_pull_without_any_credential_is_unavailable() {
    let server = TestServer::with_config(|config| config.twitter.bearer_token = None).await;
    let account = server.create_account("alice_posts").await;

    let response = pull(&server, account["id"].as_i64().unwrap()).await;

    assert_eq!(response.status(), 503);
    assert!(server.platform.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_client_disconnect_abandons_pull() {
    let server = TestServer::new().await;

    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tweets_page())
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&server.platform)
        .await;

    let response = server
        .as_user(server.client.post(&server.url("/api/social-accounts")))
        .json(&json!({"platform": "twitter", "account_name": "alice_posts", "account_id": "42"}))
        .send()
        .await
        .unwrap();
    let account: serde_json::Value = response.json().await.unwrap();
    let id = account["id"].as_i64().unwrap();

    // Give up while the platform call is still in flight
    let impatient = reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(300))
        .build()
        .unwrap();
    let outcome = server
        .as_user(impatient.post(&server.url(&format!("/api/social-accounts/{id}/pull"))))
        .send()
        .await;
    assert!(outcome.unwrap_err().is_timeout());

    // Wait past the platform delay; an abandoned pull stores nothing
    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;

    let response = server
        .as_user(server.client.get(&server.url("/api/content")))
        .send()
        .await
        .unwrap();
    let items: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(items.is_empty());

    let response = server
        .as_user(server.client.get(&server.url("/api/social-accounts")))
        .send()
        .await
        .unwrap();
    let accounts: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(accounts[0].get("last_pull_at").is_none());
}
