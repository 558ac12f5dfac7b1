//! Incident API endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateIncidentRequest, Incident, IncidentQuery};
use crate::AppState;

/// New upvote count after an upvote.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteResult {
    pub id: String,
    pub upvotes: i64,
}

/// GET /api/incidents - List incidents, newest first.
pub async fn list_incidents(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IncidentQuery>,
) -> ApiResult<Vec<Incident>> {
    success(state.repo.list_incidents(&query).await?)
}

/// POST /api/incidents - Create an incident from explicit fields.
pub async fn create_incident(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateIncidentRequest>,
) -> ApiResult<Incident> {
    request.validate().map_err(AppError::Validation)?;
    success(state.repo.create_incident(&request).await?)
}

/// GET /api/incidents/{id} - Get a single incident.
pub async fn get_incident(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Incident> {
    match state.repo.get_incident(&id).await? {
        Some(incident) => success(incident),
        None => Err(AppError::NotFound(format!("Incident {} not found", id))),
    }
}

/// DELETE /api/incidents/{id} - Delete an incident and its comments.
pub async fn delete_incident(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<()> {
    state.repo.delete_incident(&id).await?;
    success(())
}

/// POST /api/incidents/{id}/upvote - Add one upvote.
pub async fn upvote_incident(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<UpvoteResult> {
    let upvotes = state.repo.upvote_incident(&id).await?;
    success(UpvoteResult { id, upvotes })
}
