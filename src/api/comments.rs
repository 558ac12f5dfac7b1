//! Comment API endpoints.

use axum::extract::State;

use super::{success, ApiJson, ApiPath, ApiResult};
use crate::errors::AppError;
use crate::models::{Comment, CreateCommentRequest};
use crate::AppState;

/// GET /api/incidents/{id}/comments - List comments, oldest first.
pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Vec<Comment>> {
    success(state.repo.list_comments(&id).await?)
}

/// POST /api/incidents/{id}/comments - Add a comment.
pub async fn add_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<CreateCommentRequest>,
) -> ApiResult<Comment> {
    request.validate().map_err(AppError::Validation)?;
    success(state.repo.add_comment(&id, &request).await?)
}
