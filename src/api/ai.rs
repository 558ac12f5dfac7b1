//! AI endpoints: route alerts, trend summaries and speech.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::{days_window, required, success, ApiJson, ApiQuery, ApiResult};
use crate::errors::AppError;
use crate::flows::{
    generate_route_alert, match_route_incidents, summarize_trends, text_to_speech,
    MAX_SPEECH_CHARS,
};
use crate::geo::BoundingBox;
use crate::models::{
    timestamp_hours_ago, IncidentQuery, IncidentStats, RouteAlertReport, RouteAlertRequest,
    SpeechAudio, SpeechRequest, TrendSummary, MAX_SINCE_HOURS,
};
use crate::AppState;

const DEFAULT_ROUTE_SINCE_HOURS: i64 = 24;
const DEFAULT_TREND_DAYS: i64 = 7;
const MAX_TREND_DAYS: i64 = 90;
/// Recent incidents quoted to the model alongside the statistics.
const TREND_SAMPLE_SIZE: i64 = 20;

/// POST /api/ai/route-alerts - Alert for the best route between two places.
pub async fn route_alerts(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RouteAlertRequest>,
) -> ApiResult<RouteAlertReport> {
    let origin = required(&request.origin, "origin")?;
    let destination = required(&request.destination, "destination")?;
    let since_hours = request.since_hours.unwrap_or(DEFAULT_ROUTE_SINCE_HOURS);
    if !(1..=MAX_SINCE_HOURS).contains(&since_hours) {
        return Err(AppError::Validation(format!(
            "sinceHours must be between 1 and {}",
            MAX_SINCE_HOURS
        )));
    }

    let route = state
        .maps
        .directions(origin, destination, request.mode)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No route found from {} to {}",
                origin, destination
            ))
        })?;

    let corridor = state.config.route_corridor_meters;
    let candidates = match BoundingBox::around(&route.path, corridor) {
        Some(bbox) => {
            // Longitude is left unconstrained when the box spills over ±180.
            let (min_lng, max_lng) = if bbox.min_lng < -180.0 || bbox.max_lng > 180.0 {
                (-180.0, 180.0)
            } else {
                (bbox.min_lng, bbox.max_lng)
            };
            state
                .repo
                .list_all_incidents(&IncidentQuery {
                    min_lat: Some(bbox.min_lat),
                    max_lat: Some(bbox.max_lat),
                    min_lng: Some(min_lng),
                    max_lng: Some(max_lng),
                    since_hours: Some(since_hours),
                    ..Default::default()
                })
                .await?
        }
        None => Vec::new(),
    };

    let incidents = match_route_incidents(&route, &candidates, corridor);
    tracing::info!(
        route = %route.summary,
        candidates = candidates.len(),
        on_route = incidents.len(),
        "Route incidents matched"
    );

    let alert = generate_route_alert(&state.gemini, &route, &incidents).await?;
    success(RouteAlertReport {
        route,
        incidents,
        alert,
    })
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

/// Statistics for a window plus the model's reading of them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub days: i64,
    pub stats: IncidentStats,
    pub trends: TrendSummary,
}

/// GET /api/ai/trends - Summarize incident trends over the last `days`.
pub async fn trends(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TrendsQuery>,
) -> ApiResult<TrendReport> {
    let days = days_window(query.days, DEFAULT_TREND_DAYS, MAX_TREND_DAYS)?;
    let stats = state
        .repo
        .incident_stats(&timestamp_hours_ago(days * 24))
        .await?;
    let recent = state
        .repo
        .list_incidents(&IncidentQuery {
            since_hours: Some(days * 24),
            limit: Some(TREND_SAMPLE_SIZE),
            ..Default::default()
        })
        .await?;

    let trends = summarize_trends(&state.gemini, &stats, &recent).await?;
    success(TrendReport {
        days,
        stats,
        trends,
    })
}

/// POST /api/ai/speech - Read text aloud.
pub async fn speech(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SpeechRequest>,
) -> ApiResult<SpeechAudio> {
    let text = required(&request.text, "text")?;
    if text.chars().count() > MAX_SPEECH_CHARS {
        return Err(AppError::Validation(format!(
            "text must be at most {} characters",
            MAX_SPEECH_CHARS
        )));
    }
    success(text_to_speech(&state.gemini, text, request.voice.as_deref()).await?)
}
