//! Client configuration endpoint.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::AppState;

/// What the client may offer. API keys never leave the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub maps_enabled: bool,
    pub ai_enabled: bool,
    pub voice_agent_id: Option<String>,
    pub emergency_phone_number: Option<String>,
    pub route_corridor_meters: f64,
}

/// GET /api/client-config - Feature switches for the client.
pub async fn client_config(State(state): State<AppState>) -> ApiResult<ClientConfig> {
    success(ClientConfig {
        maps_enabled: state.maps.is_configured(),
        ai_enabled: state.gemini.is_configured(),
        voice_agent_id: state.config.voice_agent_id.clone(),
        emergency_phone_number: state.config.emergency_phone_number.clone(),
        route_corridor_meters: state.config.route_corridor_meters,
    })
}
