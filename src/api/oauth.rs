//! X/Twitter OAuth endpoints
//!
//! The browser is sent to the provider from `/url` and comes back to
//! `/callback`, which always answers with a redirect to the frontend.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use chrono::Utc;

use super::dto::{AuthorizationUrlResponse, OAuthCallbackQuery, OAuthStatusResponse};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::{AccountStore, NewSocialAccount};
use crate::error::AppError;
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::platform::Platform;

/// Create OAuth router
///
/// Routes:
/// - GET /url - Authorization URL for the current user
/// - GET /callback - Provider redirect target
/// - GET /status - Whether OAuth is configured
pub fn oauth_router() -> Router<AppState> {
    Router::new()
        .route("/url", get(authorization_url))
        .route("/callback", get(callback))
        .route("/status", get(status))
}

/// GET /api/twitter/oauth/url
async fn authorization_url(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<AuthorizationUrlResponse>, AppError> {
    let url = state.oauth.get_authorization_url(user.id).await?;
    Ok(Json(AuthorizationUrlResponse { url }))
}

/// GET /api/twitter/oauth/status
async fn status(State(state): State<AppState>) -> Json<OAuthStatusResponse> {
    Json(OAuthStatusResponse {
        configured: state.oauth.is_configured(),
    })
}

/// Why a callback did not end with a stored account
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallbackFailure {
    /// `error` parameter sent by the provider
    Provider(String),
    MissingParams,
    TokenExchange,
    UserFetch,
    Save,
}

impl CallbackFailure {
    fn reason(&self) -> &str {
        match self {
            CallbackFailure::Provider(error) => error.as_str(),
            CallbackFailure::MissingParams => "missing_params",
            CallbackFailure::TokenExchange => "token_exchange_failed",
            CallbackFailure::UserFetch => "user_fetch_failed",
            CallbackFailure::Save => "save_failed",
        }
    }
}

fn frontend_redirect(key: &str, value: &str) -> Redirect {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    Redirect::temporary(&format!("/?{query}"))
}

/// GET /api/twitter/oauth/callback
async fn callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Redirect {
    let outcome = complete_authorization(&state, query).await;

    let status = match &outcome {
        Ok(()) => "success",
        Err(CallbackFailure::Provider(_)) => "provider_error",
        Err(failure) => failure.reason(),
    };
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/twitter/oauth/callback", status])
        .inc();

    match outcome {
        Ok(()) => frontend_redirect("twitter_oauth_success", "true"),
        Err(failure) => frontend_redirect("twitter_oauth_error", failure.reason()),
    }
}

async fn complete_authorization(
    state: &AppState,
    query: OAuthCallbackQuery,
) -> Result<(), CallbackFailure> {
    if let Some(error) = query.error.filter(|e| !e.is_empty()) {
        tracing::warn!(
            error = %error,
            description = query.error_description.as_deref().unwrap_or_default(),
            "Provider returned an OAuth error"
        );
        return Err(CallbackFailure::Provider(error));
    }

    let (Some(code), Some(oauth_state)) = (
        query.code.filter(|c| !c.is_empty()),
        query.state.filter(|s| !s.is_empty()),
    ) else {
        return Err(CallbackFailure::MissingParams);
    };

    let (tokens, user_id) = state
        .oauth
        .exchange_code(&code, &oauth_state)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Failed to exchange OAuth code");
            CallbackFailure::TokenExchange
        })?;

    let identity = state
        .oauth
        .get_authenticated_identity(&tokens.access_token)
        .await
        .map_err(|e| {
            tracing::warn!(user_id, error = %e, "Failed to fetch authenticated user");
            CallbackFailure::UserFetch
        })?;

    let expires_at = tokens.expires_at(Utc::now());
    let platform = Platform::Twitter.as_str();

    let existing = state
        .db
        .get_social_account_by_platform_user_id(user_id, platform, &identity.id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(user_id, error = %e, "Failed to look up existing account");
            None
        });

    let saved = match existing {
        Some(account) => state
            .db
            .update_tokens(
                account.id,
                &tokens.access_token,
                &tokens.refresh_token,
                expires_at,
            )
            .await
            .map(|()| account.id),
        None => {
            let request = NewSocialAccount {
                platform: platform.to_string(),
                account_name: identity.username.clone(),
                platform_user_id: Some(identity.id.clone()),
                access_token: Some(tokens.access_token.clone()),
                refresh_token: Some(tokens.refresh_token.clone()),
            };
            state
                .db
                .create_social_account_with_tokens(user_id, &request, expires_at)
                .await
                .map(|account| account.id)
        }
    };

    let account_id = saved.map_err(|e| {
        tracing::warn!(user_id, error = %e, "Failed to save OAuth account");
        CallbackFailure::Save
    })?;

    tracing::info!(
        user_id,
        account_id,
        username = %identity.username,
        platform_user_id = %identity.id,
        "Connected X/Twitter account"
    );
    Ok(())
}
