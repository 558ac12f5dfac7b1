use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{validate_coordinates, IncidentCategory, LiveIncident};
use crate::services::gemini::GenerateRequest;
use crate::services::GeminiClient;

const MAX_LIVE_INCIDENTS: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLiveIncident {
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    location_name: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    reported_at: Option<String>,
}

/// The model sometimes wraps the list in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFeed {
    List(Vec<RawLiveIncident>),
    Wrapped { incidents: Vec<RawLiveIncident> },
}

impl From<RawLiveIncident> for LiveIncident {
    fn from(raw: RawLiveIncident) -> Self {
        // Drop coordinates unless both are present and on the globe.
        let (latitude, longitude) = match (raw.latitude, raw.longitude) {
            (Some(lat), Some(lng)) if validate_coordinates(lat, lng).is_ok() => {
                (Some(lat), Some(lng))
            }
            _ => (None, None),
        };
        LiveIncident {
            title: raw.title.trim().to_string(),
            category: IncidentCategory::from_label(&raw.category),
            summary: raw.summary.trim().to_string(),
            location_name: raw.location_name,
            latitude,
            longitude,
            source_url: raw.source_url.filter(|u| u.starts_with("http")),
            reported_at: raw.reported_at,
        }
    }
}

fn parse_feed(feed: RawFeed) -> Vec<LiveIncident> {
    let raw = match feed {
        RawFeed::List(list) => list,
        RawFeed::Wrapped { incidents } => incidents,
    };
    raw.into_iter()
        .filter(|r| !r.title.trim().is_empty())
        .map(LiveIncident::from)
        .take(MAX_LIVE_INCIDENTS)
        .collect()
}

/// Current incidents in `area` gathered from the web via search grounding.
pub async fn fetch_live_incidents(
    gemini: &GeminiClient,
    area: &str,
) -> Result<Vec<LiveIncident>, AppError> {
    let prompt = format!(
        "Search the web for civic incidents happening right now or within the last 24 hours \
         in or near {area}: traffic accidents, flooding, power outages, road closures, fires, \
         infrastructure damage and public safety alerts.\n\
         Answer with only a JSON array (no prose). Each element has: \"title\", \"category\" \
         (one of {categories}), \"summary\", \"locationName\", \"latitude\", \"longitude\", \
         \"sourceUrl\", \"reportedAt\" (ISO 8601). Use null for unknown values and return [] \
         if nothing is found.",
        area = area,
        categories = IncidentCategory::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );

    let request = GenerateRequest::new(prompt).google_search().json();
    let feed: RawFeed = gemini.generate_json(request).await?;
    let incidents = parse_feed(feed);
    tracing::info!(area, count = incidents.len(), "Live incident feed fetched");
    Ok(incidents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_normalizes_entries() {
        let feed: RawFeed = serde_json::from_str(
            r#"{"incidents": [
                {"title": "Water main burst", "category": "Infrastructure Damage",
                 "summary": "Road flooded", "latitude": 12.9, "longitude": 77.6,
                 "sourceUrl": "https://news.example/1"},
                {"title": "  ", "category": "fire", "summary": "untitled"},
                {"title": "Outage", "category": "blackout", "summary": "Grid failure",
                 "latitude": 123.0, "longitude": 77.6, "sourceUrl": "not a url"}
            ]}"#,
        )
        .unwrap();

        let incidents = parse_feed(feed);
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].category, IncidentCategory::InfrastructureDamage);
        assert_eq!(incidents[0].latitude, Some(12.9));
        assert_eq!(incidents[1].category, IncidentCategory::PowerOutage);
        assert_eq!(incidents[1].latitude, None);
        assert_eq!(incidents[1].source_url, None);
    }

    #[test]
    fn test_parse_plain_list() {
        let feed: RawFeed = serde_json::from_str("[]").unwrap();
        assert!(parse_feed(feed).is_empty());
    }
}
