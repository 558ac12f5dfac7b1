//! Report submission and media analysis endpoints.

use axum::extract::State;

use super::{success, ApiJson, ApiResult};
use crate::errors::AppError;
use crate::flows::{analyze_incident_report, parse_media_data_uri};
use crate::geo::LatLng;
use crate::models::{
    validate_coordinates, AnalyzeMediaRequest, CreateIncidentRequest, IncidentAnalysis,
    SubmitReportRequest, SubmittedReport,
};
use crate::AppState;

/// POST /api/reports - Analyze submitted media and save it as an incident.
///
/// Media the model does not recognise as an incident is rejected and nothing
/// is stored. A missing address is filled in by reverse geocoding when the
/// maps integration is available; failures there do not fail the report.
pub async fn submit_report(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SubmitReportRequest>,
) -> ApiResult<SubmittedReport> {
    validate_coordinates(request.latitude, request.longitude).map_err(AppError::Validation)?;
    let media = parse_media_data_uri(&request.media_data_uri)?;

    let analysis =
        analyze_incident_report(&state.gemini, media, request.description.as_deref()).await?;
    if !analysis.is_incident {
        return Err(AppError::Validation(
            "The submitted media does not appear to show a civic incident".to_string(),
        ));
    }

    let mut address = request
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    if address.is_none() && state.maps.is_configured() {
        let location = LatLng::new(request.latitude, request.longitude);
        match state.maps.reverse_geocode(location).await {
            Ok(found) => address = found,
            Err(e) => tracing::warn!("Reverse geocoding for report failed: {}", e),
        }
    }

    let incident = state
        .repo
        .create_incident(&CreateIncidentRequest {
            latitude: request.latitude,
            longitude: request.longitude,
            category: analysis.category,
            severity: analysis.severity,
            summary: analysis.summary.clone(),
            address,
            description: request.description,
        })
        .await?;

    success(SubmittedReport { incident, analysis })
}

/// POST /api/ai/analyze - Analyze media without saving anything.
pub async fn analyze_media(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnalyzeMediaRequest>,
) -> ApiResult<IncidentAnalysis> {
    let media = parse_media_data_uri(&request.media_data_uri)?;
    success(analyze_incident_report(&state.gemini, media, request.description.as_deref()).await?)
}
