//! Live incident feed endpoint.

use axum::extract::State;
use serde::Deserialize;

use super::{required, success, ApiQuery, ApiResult};
use crate::flows::fetch_live_incidents;
use crate::models::LiveIncident;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LiveIncidentsQuery {
    #[serde(default)]
    pub area: String,
}

/// GET /api/live-incidents - Incidents reported on the web for an area.
pub async fn live_incidents(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LiveIncidentsQuery>,
) -> ApiResult<Vec<LiveIncident>> {
    let area = required(&query.area, "area")?;
    success(fetch_live_incidents(&state.gemini, area).await?)
}
