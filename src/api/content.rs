//! Content endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
};

use super::dto::MessageResponse;
use crate::AppState;
use crate::auth::{AdminUser, CurrentUser};
use crate::data::{Content, ContentFilters, ContentWithUser, NewContent};
use crate::error::AppError;

/// Create content router
///
/// Routes:
/// - GET /content - The caller's content, newest first
/// - POST /content - Add a content entry by hand
/// - DELETE /content/:id - Remove a content entry
/// - GET /admin/content - Everyone's content (admin only)
pub fn content_router() -> Router<AppState> {
    Router::new()
        .route("/content", get(list_content).post(create_content))
        .route("/content/:id", delete(delete_content))
        .route("/admin/content", get(list_all_content))
}

/// GET /api/content
async fn list_content(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Content>>, AppError> {
    Ok(Json(state.db.list_content(user.id).await?))
}

/// POST /api/content
async fn create_content(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<NewContent>,
) -> Result<(StatusCode, Json<Content>), AppError> {
    request.validate()?;

    if let Some(account_id) = request.social_account_id {
        state
            .db
            .get_social_account(account_id, user.id)
            .await?
            .ok_or(AppError::NotFound)?;
    }

    let content = state
        .db
        .create_content(user.id, &request)
        .await?
        .ok_or_else(|| AppError::Conflict("content with this link already exists".to_string()))?;

    Ok((StatusCode::CREATED, Json(content)))
}

/// DELETE /api/content/:id
async fn delete_content(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.db.delete_content(id, user.id).await?;
    Ok(Json(MessageResponse::new("content deleted")))
}

/// GET /api/admin/content?platform=&username=
async fn list_all_content(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(filters): Query<ContentFilters>,
) -> Result<Json<Vec<ContentWithUser>>, AppError> {
    Ok(Json(state.db.list_all_content(&filters).await?))
}
