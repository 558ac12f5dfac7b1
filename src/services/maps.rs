//! Google Maps Platform client: Places, Directions and Geocoding web services.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{ensure_success, http_client, map_reqwest_error, ServiceError};
use crate::config::MapsConfig;
use crate::geo::{decode_polyline, LatLng};
use crate::models::{NearbyPlace, PlaceDetails, PlacePrediction, RouteOption, TravelMode};

const API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Radius used to bias autocomplete results towards the caller's position.
const AUTOCOMPLETE_BIAS_RADIUS_M: u32 = 50_000;

/// Envelope shared by the Maps web services: a `status` string plus payload.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(flatten)]
    payload: T,
}

impl<T> Envelope<T> {
    /// `OK` yields the payload, `ZERO_RESULTS` yields `None`, anything else
    /// is an API error.
    fn into_payload(self) -> Result<Option<T>, ServiceError> {
        match self.status.as_str() {
            "OK" => Ok(Some(self.payload)),
            "ZERO_RESULTS" => Ok(None),
            _ => Err(ServiceError::Api {
                message: self
                    .error_message
                    .unwrap_or_else(|| format!("request failed with status {}", self.status)),
                status: self.status,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AutocompletePayload {
    #[serde(default)]
    predictions: Vec<RawPrediction>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    place_id: String,
    description: String,
    #[serde(default)]
    structured_formatting: Option<StructuredFormatting>,
}

#[derive(Debug, Deserialize)]
struct StructuredFormatting {
    #[serde(default)]
    main_text: Option<String>,
    #[serde(default)]
    secondary_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsPayload {
    #[serde(default)]
    result: Option<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct NearbyPayload {
    #[serde(default)]
    results: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    vicinity: Option<String>,
    geometry: Geometry,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    opening_hours: Option<OpeningHours>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct OpeningHours {
    #[serde(default)]
    open_now: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GeocodePayload {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

#[derive(Debug, Deserialize)]
struct DirectionsPayload {
    #[serde(default)]
    routes: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    #[serde(default)]
    summary: String,
    overview_polyline: EncodedPolyline,
    #[serde(default)]
    legs: Vec<RawLeg>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EncodedPolyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct RawLeg {
    distance: TextValue,
    duration: TextValue,
    #[serde(default)]
    start_address: Option<String>,
    #[serde(default)]
    end_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
    value: u64,
}

/// Google Maps web service client.
#[derive(Debug, Clone)]
pub struct MapsClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
}

impl MapsClient {
    pub fn new(config: &MapsConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http_client(REQUEST_TIMEOUT)?,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ServiceError::MissingApiKey(API_KEY_VAR))?;

        tracing::debug!(path, "calling maps api");
        let res = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(params)
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        ensure_success(res)
            .await?
            .json::<Envelope<T>>()
            .await
            .map_err(map_reqwest_error)?
            .into_payload()
    }

    /// Place autocomplete, optionally biased towards `near`.
    pub async fn autocomplete(
        &self,
        input: &str,
        near: Option<LatLng>,
    ) -> Result<Vec<PlacePrediction>, ServiceError> {
        let mut params = vec![("input", input.to_string())];
        if let Some(location) = near {
            params.push(("location", location.to_string()));
            params.push(("radius", AUTOCOMPLETE_BIAS_RADIUS_M.to_string()));
        }

        let payload: Option<AutocompletePayload> =
            self.get("place/autocomplete/json", &params).await?;

        Ok(payload
            .map(|p| p.predictions)
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                let (main_text, secondary_text) = raw
                    .structured_formatting
                    .map(|f| (f.main_text, f.secondary_text))
                    .unwrap_or_default();
                PlacePrediction {
                    place_id: raw.place_id,
                    description: raw.description,
                    main_text,
                    secondary_text,
                }
            })
            .collect())
    }

    /// Resolve a place id to a name, address and coordinates.
    pub async fn place_details(&self, place_id: &str) -> Result<Option<PlaceDetails>, ServiceError> {
        let params = [
            ("place_id", place_id.to_string()),
            ("fields", "place_id,name,formatted_address,geometry".to_string()),
        ];
        // Details answers NOT_FOUND for ids that are no longer valid.
        let payload: Option<DetailsPayload> =
            match self.get("place/details/json", &params).await {
                Err(ServiceError::Api { status, .. }) if status == "NOT_FOUND" => None,
                other => other?,
            };

        Ok(payload.and_then(|p| p.result).map(|place| PlaceDetails {
            place_id: place.place_id.unwrap_or_else(|| place_id.to_string()),
            name: place.name.unwrap_or_default(),
            formatted_address: place.formatted_address,
            location: place.geometry.location,
        }))
    }

    /// Places of an optional `place_type` within `radius_m` of `location`.
    pub async fn nearby_search(
        &self,
        location: LatLng,
        radius_m: u32,
        place_type: Option<&str>,
    ) -> Result<Vec<NearbyPlace>, ServiceError> {
        let mut params = vec![
            ("location", location.to_string()),
            ("radius", radius_m.to_string()),
        ];
        if let Some(place_type) = place_type {
            params.push(("type", place_type.to_string()));
        }

        let payload: Option<NearbyPayload> = self.get("place/nearbysearch/json", &params).await?;

        Ok(payload
            .map(|p| p.results)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| {
                Some(NearbyPlace {
                    place_id: raw.place_id?,
                    name: raw.name.unwrap_or_default(),
                    vicinity: raw.vicinity.or(raw.formatted_address),
                    location: raw.geometry.location,
                    types: raw.types,
                    rating: raw.rating,
                    open_now: raw.opening_hours.and_then(|h| h.open_now),
                })
            })
            .collect())
    }

    /// Best formatted address for a coordinate.
    pub async fn reverse_geocode(&self, location: LatLng) -> Result<Option<String>, ServiceError> {
        let params = [("latlng", location.to_string())];
        let payload: Option<GeocodePayload> = self.get("geocode/json", &params).await?;

        Ok(payload.and_then(|p| p.results.into_iter().next().map(|r| r.formatted_address)))
    }

    /// Candidate routes between two free-form locations.
    pub async fn directions(
        &self,
        origin: &str,
        destination: &str,
        mode: TravelMode,
    ) -> Result<Vec<RouteOption>, ServiceError> {
        let params = [
            ("origin", origin.to_string()),
            ("destination", destination.to_string()),
            ("mode", mode.as_str().to_string()),
            ("alternatives", "true".to_string()),
        ];
        let payload: Option<DirectionsPayload> = self.get("directions/json", &params).await?;

        payload
            .map(|p| p.routes)
            .unwrap_or_default()
            .into_iter()
            .map(route_option)
            .collect()
    }
}

fn route_option(raw: RawRoute) -> Result<RouteOption, ServiceError> {
    let path = decode_polyline(&raw.overview_polyline.points)
        .map_err(|e| ServiceError::Serde(format!("bad overview polyline: {}", e)))?;

    let distance_meters: u64 = raw.legs.iter().map(|l| l.distance.value).sum();
    let duration_seconds: u64 = raw.legs.iter().map(|l| l.duration.value).sum();

    // Single-leg routes carry the API's own human-readable text.
    let (distance_text, duration_text) = match raw.legs.as_slice() {
        [leg] => (leg.distance.text.clone(), leg.duration.text.clone()),
        _ => (
            format!("{:.1} km", distance_meters as f64 / 1000.0),
            format!("{} mins", duration_seconds.div_ceil(60)),
        ),
    };

    Ok(RouteOption {
        summary: raw.summary,
        start_address: raw.legs.first().and_then(|l| l.start_address.clone()),
        end_address: raw.legs.last().and_then(|l| l.end_address.clone()),
        distance_meters,
        distance_text,
        duration_seconds,
        duration_text,
        polyline: raw.overview_polyline.points,
        path,
        warnings: raw.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_status_mapping() {
        let ok: Envelope<GeocodePayload> = serde_json::from_str(
            r#"{"status": "OK", "results": [{"formatted_address": "1 Main St"}]}"#,
        )
        .unwrap();
        let payload = ok.into_payload().unwrap().unwrap();
        assert_eq!(payload.results[0].formatted_address, "1 Main St");

        let empty: Envelope<GeocodePayload> =
            serde_json::from_str(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap();
        assert!(empty.into_payload().unwrap().is_none());

        let not_found: Envelope<GeocodePayload> =
            serde_json::from_str(r#"{"status": "NOT_FOUND"}"#).unwrap();
        assert!(matches!(
            not_found.into_payload(),
            Err(ServiceError::Api { ref status, .. }) if status == "NOT_FOUND"
        ));

        let denied: Envelope<GeocodePayload> = serde_json::from_str(
            r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#,
        )
        .unwrap();
        match denied.into_payload() {
            Err(ServiceError::Api { status, message }) => {
                assert_eq!(status, "REQUEST_DENIED");
                assert_eq!(message, "The provided API key is invalid.");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_route_option_from_raw() {
        let raw: RawRoute = serde_json::from_value(serde_json::json!({
            "summary": "I-5 N",
            "overview_polyline": { "points": "_p~iF~ps|U_ulLnnqC_mqNvxq`@" },
            "legs": [{
                "distance": { "text": "620 km", "value": 620000 },
                "duration": { "text": "6 hours", "value": 21600 },
                "start_address": "A",
                "end_address": "B"
            }],
            "warnings": []
        }))
        .unwrap();

        let route = route_option(raw).unwrap();
        assert_eq!(route.path.len(), 3);
        assert_eq!(route.distance_meters, 620_000);
        assert_eq!(route.duration_text, "6 hours");
        assert_eq!(route.start_address.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_missing_key_is_reported_before_any_request() {
        let client = MapsClient::new(&MapsConfig {
            api_key: None,
            // Unroutable; the call must fail before reaching the network.
            base_url: "http://127.0.0.1:9".to_string(),
        })
        .unwrap();

        let err = client.autocomplete("main st", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingApiKey(API_KEY_VAR)));
        assert!(!client.is_configured());
    }
}
