use serde::Deserialize;

use crate::errors::AppError;
use crate::geo::{along_route, LatLng};
use crate::models::{Incident, RouteAlert, RouteIncident, RouteOption, Severity};
use crate::services::gemini::GenerateRequest;
use crate::services::GeminiClient;

#[derive(Debug, Deserialize)]
struct RawAlert {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    severity: String,
}

/// Incidents within `corridor_m` of the route, in driving order.
pub fn match_route_incidents(
    route: &RouteOption,
    incidents: &[Incident],
    corridor_m: f64,
) -> Vec<RouteIncident> {
    along_route(
        &route.path,
        incidents,
        |i| LatLng::new(i.latitude, i.longitude),
        corridor_m,
    )
    .into_iter()
    .map(|(incident, d)| RouteIncident {
        incident: incident.clone(),
        distance_from_route_meters: d.distance.round(),
        distance_along_route_meters: d.along.round(),
    })
    .collect()
}

fn clear_route_alert(route: &RouteOption) -> RouteAlert {
    RouteAlert {
        headline: "Route clear".to_string(),
        message: format!(
            "No reported incidents along {} ({}, {}).",
            if route.summary.is_empty() { "this route" } else { route.summary.as_str() },
            route.distance_text,
            route.duration_text
        ),
        severity: Severity::Low,
    }
}

fn build_prompt(route: &RouteOption, incidents: &[RouteIncident]) -> String {
    let mut prompt = format!(
        "A driver is about to take the route \"{}\" ({}, about {}).\n\
         These incidents were reported along it, in driving order:\n",
        route.summary, route.distance_text, route.duration_text
    );
    for (n, item) in incidents.iter().enumerate() {
        let incident = &item.incident;
        prompt.push_str(&format!(
            "{}. [{} / {}] {} (at {:.1} km, {} upvotes, reported {}){}\n",
            n + 1,
            incident.category.as_str(),
            incident.severity.as_str(),
            incident.summary,
            item.distance_along_route_meters / 1000.0,
            incident.upvotes,
            incident.timestamp,
            incident
                .address
                .as_deref()
                .map(|a| format!(" near {}", a))
                .unwrap_or_default(),
        ));
    }
    prompt.push_str(
        "\nWrite a short alert for the driver as a JSON object with fields \
         \"headline\" (max 8 words), \"message\" (max 3 sentences, practical advice) and \
         \"severity\" (low, medium, high or critical).",
    );
    prompt
}

/// Alert for a route. Answers locally when the route is clear.
pub async fn generate_route_alert(
    gemini: &GeminiClient,
    route: &RouteOption,
    incidents: &[RouteIncident],
) -> Result<RouteAlert, AppError> {
    if incidents.is_empty() {
        return Ok(clear_route_alert(route));
    }

    let request = GenerateRequest::new(build_prompt(route, incidents))
        .system("You write concise, calm traffic alerts for commuters.")
        .json()
        .temperature(0.4);
    let raw: RawAlert = gemini.generate_json(request).await?;

    // Never report less than the worst incident on the route.
    let worst = incidents
        .iter()
        .map(|i| i.incident.severity)
        .max()
        .unwrap_or(Severity::Low);
    let severity = if raw.severity.trim().is_empty() {
        worst
    } else {
        Severity::from_label(&raw.severity).max(worst)
    };

    let headline = match raw.headline.trim() {
        "" => format!("{} incident(s) on your route", incidents.len()),
        h => h.to_string(),
    };
    if raw.message.trim().is_empty() {
        return Err(AppError::Upstream(
            "The model returned an empty route alert".to_string(),
        ));
    }

    Ok(RouteAlert {
        headline,
        message: raw.message.trim().to_string(),
        severity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncidentCategory;

    fn route() -> RouteOption {
        RouteOption {
            summary: "Ring Rd".to_string(),
            start_address: None,
            end_address: None,
            distance_meters: 11_000,
            distance_text: "11 km".to_string(),
            duration_seconds: 900,
            duration_text: "15 mins".to_string(),
            polyline: String::new(),
            path: vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 0.1)],
            warnings: Vec::new(),
        }
    }

    fn incident(id: &str, lat: f64, lng: f64) -> Incident {
        Incident {
            id: id.to_string(),
            latitude: lat,
            longitude: lng,
            category: IncidentCategory::RoadClosure,
            severity: Severity::High,
            summary: format!("Incident {}", id),
            address: None,
            description: None,
            timestamp: "2026-10-18T08:00:00.000Z".to_string(),
            upvotes: 2,
            comment_count: 0,
        }
    }

    #[test]
    fn test_match_route_incidents() {
        let incidents = vec![
            incident("b", 0.001, 0.09),
            incident("off-route", 0.2, 0.05),
            incident("a", 0.0, 0.01),
        ];
        let matched = match_route_incidents(&route(), &incidents, 500.0);
        let ids: Vec<&str> = matched.iter().map(|m| m.incident.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(matched[0].distance_from_route_meters, 0.0);
    }

    #[test]
    fn test_clear_route_alert() {
        let alert = clear_route_alert(&route());
        assert_eq!(alert.severity, Severity::Low);
        assert!(alert.message.contains("Ring Rd"));
    }

    #[test]
    fn test_prompt_mentions_each_incident() {
        let incidents = match_route_incidents(&route(), &[incident("a", 0.0, 0.05)], 500.0);
        let prompt = build_prompt(&route(), &incidents);
        assert!(prompt.contains("1. [road_closure / high] Incident a"));
        assert!(prompt.contains("at 5.6 km"));
    }
}
