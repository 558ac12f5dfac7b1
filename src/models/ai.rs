//! Results produced by the generative AI flows.

use serde::{Deserialize, Serialize};

use super::{Incident, IncidentCategory, RouteOption, Severity};

/// Classification and summary of submitted incident media.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentAnalysis {
    /// False when the media does not show a civic incident at all
    pub is_incident: bool,
    pub category: IncidentCategory,
    pub severity: Severity,
    pub summary: String,
}

/// Request body carrying media for analysis or report submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeMediaRequest {
    /// `data:<mime>;base64,<payload>`
    pub media_data_uri: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for submitting a new report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportRequest {
    pub media_data_uri: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Result of a report submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedReport {
    pub incident: Incident,
    pub analysis: IncidentAnalysis,
}

/// Alert text generated for a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAlert {
    pub headline: String,
    pub message: String,
    pub severity: Severity,
}

/// Request body for route alerts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAlertRequest {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub mode: super::TravelMode,
    /// Only consider incidents from the last N hours (default 24)
    #[serde(default)]
    pub since_hours: Option<i64>,
}

/// An incident found inside the route corridor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteIncident {
    pub incident: Incident,
    /// Distance from the route, in metres
    pub distance_from_route_meters: f64,
    /// Distance from the route start to the closest point, in metres
    pub distance_along_route_meters: f64,
}

/// Everything the client needs to render a route with its alerts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAlertReport {
    pub route: RouteOption,
    pub incidents: Vec<RouteIncident>,
    pub alert: RouteAlert,
}

/// Narrative summary of recent incident trends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// Request body for text-to-speech.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Synthesized speech.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAudio {
    pub mime_type: String,
    pub audio_data_uri: String,
}

/// An incident found on the web rather than reported by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveIncident {
    pub title: String,
    #[serde(default = "default_live_category")]
    pub category: IncidentCategory,
    pub summary: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub reported_at: Option<String>,
}

fn default_live_category() -> IncidentCategory {
    IncidentCategory::Other
}
