//! Current user and social account endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};

use super::dto::MessageResponse;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::{AccountStore, NewSocialAccount, SocialAccount, User};
use crate::error::AppError;
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::service::SyncResult;

/// Create accounts router
///
/// Routes:
/// - GET /user - Current user
/// - GET /social-accounts - List the caller's accounts
/// - POST /social-accounts - Add an account
/// - DELETE /social-accounts/:id - Remove an account
/// - POST /social-accounts/:id/pull - Sync an account now
pub fn accounts_router() -> Router<AppState> {
    Router::new()
        .route("/user", get(current_user))
        .route(
            "/social-accounts",
            get(list_accounts).post(create_account),
        )
        .route("/social-accounts/:id", delete(delete_account))
        .route("/social-accounts/:id/pull", post(pull_account))
}

/// GET /api/user
async fn current_user(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// GET /api/social-accounts
async fn list_accounts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<SocialAccount>>, AppError> {
    Ok(Json(state.db.list_social_accounts(user.id).await?))
}

/// POST /api/social-accounts
async fn create_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<NewSocialAccount>,
) -> Result<(StatusCode, Json<SocialAccount>), AppError> {
    request.validate()?;

    let account = state.db.create_social_account(user.id, &request).await?;
    tracing::info!(
        user_id = user.id,
        account_id = account.id,
        platform = %account.platform,
        "Social account added"
    );

    Ok((StatusCode::CREATED, Json(account)))
}

/// DELETE /api/social-accounts/:id
async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.db.delete_social_account(id, user.id).await?;
    Ok(Json(MessageResponse::new("account deleted")))
}

/// POST /api/social-accounts/:id/pull
///
/// Runs a sync for one of the caller's accounts. Aborted if the client
/// goes away or the server shuts down.
async fn pull_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<SyncResult>, AppError> {
    let account = state
        .db
        .get_social_account(id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;

    let result = state
        .sync
        .sync_with_cancellation(&account, user.id, state.shutdown.child_token())
        .await;

    let status = match &result {
        Ok(_) => "200",
        Err(AppError::RateLimited { .. }) => "429",
        Err(_) => "error",
    };
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/social-accounts/:id/pull", status])
        .inc();

    let result = result?;

    if let Err(e) = state.db.update_last_pull(account.id).await {
        tracing::warn!(account_id = account.id, error = %e, "Failed to record last pull time");
    }

    Ok(Json(result))
}
