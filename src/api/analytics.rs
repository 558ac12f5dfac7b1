//! Analytics endpoint.

use axum::extract::State;
use serde::Deserialize;

use super::{days_window, success, ApiQuery, ApiResult};
use crate::models::{timestamp_hours_ago, IncidentStats};
use crate::AppState;

const DEFAULT_ANALYTICS_DAYS: i64 = 30;
const MAX_ANALYTICS_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

/// GET /api/analytics - Incident counts for the last `days`.
pub async fn analytics(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> ApiResult<IncidentStats> {
    let days = days_window(query.days, DEFAULT_ANALYTICS_DAYS, MAX_ANALYTICS_DAYS)?;
    success(
        state
            .repo
            .incident_stats(&timestamp_hours_ago(days * 24))
            .await?,
    )
}
