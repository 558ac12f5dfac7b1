//! Incident model and the request types that create or query incidents.

use std::str::FromStr;

use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored category or severity name that is not part of the fixed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Incident category. The set is fixed; the API and the database use the
/// snake_case names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    TrafficAccident,
    Flooding,
    PowerOutage,
    RoadClosure,
    Fire,
    InfrastructureDamage,
    PublicSafety,
    Other,
}

impl IncidentCategory {
    pub const ALL: [IncidentCategory; 8] = [
        IncidentCategory::TrafficAccident,
        IncidentCategory::Flooding,
        IncidentCategory::PowerOutage,
        IncidentCategory::RoadClosure,
        IncidentCategory::Fire,
        IncidentCategory::InfrastructureDamage,
        IncidentCategory::PublicSafety,
        IncidentCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentCategory::TrafficAccident => "traffic_accident",
            IncidentCategory::Flooding => "flooding",
            IncidentCategory::PowerOutage => "power_outage",
            IncidentCategory::RoadClosure => "road_closure",
            IncidentCategory::Fire => "fire",
            IncidentCategory::InfrastructureDamage => "infrastructure_damage",
            IncidentCategory::PublicSafety => "public_safety",
            IncidentCategory::Other => "other",
        }
    }

    /// Lenient parse for model output: "Traffic Accident", "power-outage",
    /// "FLOODING" all resolve. Anything unknown becomes `Other`.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        if let Ok(category) = normalized.parse() {
            return category;
        }

        match normalized.as_str() {
            "accident" | "traffic" | "car_accident" | "collision" => {
                IncidentCategory::TrafficAccident
            }
            "flood" | "waterlogging" => IncidentCategory::Flooding,
            "power_cut" | "blackout" | "outage" => IncidentCategory::PowerOutage,
            "road_block" | "roadblock" | "closure" => IncidentCategory::RoadClosure,
            "pothole" | "damage" | "infrastructure" => IncidentCategory::InfrastructureDamage,
            "crime" | "safety" => IncidentCategory::PublicSafety,
            _ => IncidentCategory::Other,
        }
    }
}

/// Severity level, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Lenient parse for model output. Unknown labels become `Medium`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase();
        normalized.parse().unwrap_or(match normalized.as_str() {
            "minor" => Severity::Low,
            "moderate" => Severity::Medium,
            "severe" | "major" => Severity::High,
            "extreme" | "emergency" => Severity::Critical,
            _ => Severity::Medium,
        })
    }
}

/// Exact parse of the stored snake_case name.
impl FromStr for IncidentCategory {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownLabel {
                kind: "category",
                value: s.to_string(),
            })
    }
}

impl FromStr for Severity {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnknownLabel {
                kind: "severity",
                value: s.to_string(),
            })
    }
}

/// A reported civic incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: IncidentCategory,
    pub severity: Severity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// The reporter's own words, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Server-assigned at write time (RFC 3339, UTC)
    pub timestamp: String,
    pub upvotes: i64,
    #[serde(default)]
    pub comment_count: i64,
}

/// Request body for creating an incident from explicit fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncidentRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub category: IncidentCategory,
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateIncidentRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_coordinates(self.latitude, self.longitude)?;
        if self.summary.trim().is_empty() {
            return Err("Summary is required".to_string());
        }
        Ok(())
    }
}

/// Check that a latitude/longitude pair lies on the globe.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), String> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("Latitude {} is out of range", latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("Longitude {} is out of range", longitude));
    }
    Ok(())
}

/// Server timestamp format: RFC 3339, UTC, millisecond precision. Fixed width,
/// so lexical order equals chronological order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Timestamp `hours` before now, in the same format as [`timestamp_now`].
pub fn timestamp_hours_ago(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Longest look-back window accepted, in hours (one year).
pub const MAX_SINCE_HOURS: i64 = 24 * 365;

/// Maximum number of incidents a single list call may return.
pub const MAX_LIST_LIMIT: i64 = 500;
const DEFAULT_LIST_LIMIT: i64 = 100;

/// Query parameters for listing incidents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentQuery {
    #[serde(default)]
    pub category: Option<IncidentCategory>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub min_lat: Option<f64>,
    #[serde(default)]
    pub max_lat: Option<f64>,
    #[serde(default)]
    pub min_lng: Option<f64>,
    #[serde(default)]
    pub max_lng: Option<f64>,
    /// Only incidents reported within the last N hours
    #[serde(default)]
    pub since_hours: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Map viewport used to filter incidents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl IncidentQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }

    /// Lower timestamp bound derived from `sinceHours`.
    pub fn since(&self) -> Result<Option<String>, String> {
        match self.since_hours {
            None => Ok(None),
            Some(hours) if (1..=MAX_SINCE_HOURS).contains(&hours) => {
                Ok(Some(timestamp_hours_ago(hours)))
            }
            Some(hours) => Err(format!(
                "sinceHours must be between 1 and {}, got {}",
                MAX_SINCE_HOURS, hours
            )),
        }
    }

    /// Bounds must be given completely or not at all.
    pub fn bounds(&self) -> Result<Option<Bounds>, String> {
        match (self.min_lat, self.max_lat, self.min_lng, self.max_lng) {
            (None, None, None, None) => Ok(None),
            (Some(min_lat), Some(max_lat), Some(min_lng), Some(max_lng)) => {
                validate_coordinates(min_lat, min_lng)?;
                validate_coordinates(max_lat, max_lng)?;
                if min_lat > max_lat {
                    return Err("minLat must not exceed maxLat".to_string());
                }
                Ok(Some(Bounds {
                    min_lat,
                    max_lat,
                    min_lng,
                    max_lng,
                }))
            }
            _ => Err("minLat, maxLat, minLng and maxLng must be given together".to_string()),
        }
    }
}
