//! Places, geocoding and directions endpoints.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::{required, success, ApiPath, ApiQuery, ApiResult};
use crate::errors::AppError;
use crate::geo::LatLng;
use crate::models::{
    validate_coordinates, NearbyPlace, PlaceDetails, PlacePrediction, RouteOption, TravelMode,
};
use crate::AppState;

const DEFAULT_NEARBY_RADIUS_M: u32 = 1500;
const MAX_NEARBY_RADIUS_M: u32 = 50_000;

fn location(lat: f64, lng: f64) -> Result<LatLng, AppError> {
    validate_coordinates(lat, lng).map_err(AppError::Validation)?;
    Ok(LatLng::new(lat, lng))
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// GET /api/places/autocomplete - Place suggestions for partial input.
pub async fn autocomplete(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AutocompleteQuery>,
) -> ApiResult<Vec<PlacePrediction>> {
    let input = required(&query.input, "input")?;
    let near = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => Some(location(lat, lng)?),
        (None, None) => None,
        _ => {
            return Err(AppError::Validation(
                "lat and lng must be given together".to_string(),
            ))
        }
    };
    success(state.maps.autocomplete(input, near).await?)
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub radius: Option<u32>,
    #[serde(default, rename = "type")]
    pub place_type: Option<String>,
}

/// GET /api/places/nearby - Places around a point, e.g. hospitals.
pub async fn nearby_places(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<NearbyQuery>,
) -> ApiResult<Vec<NearbyPlace>> {
    let center = location(query.lat, query.lng)?;
    let radius = query.radius.unwrap_or(DEFAULT_NEARBY_RADIUS_M);
    if radius == 0 || radius > MAX_NEARBY_RADIUS_M {
        return Err(AppError::Validation(format!(
            "radius must be between 1 and {} metres",
            MAX_NEARBY_RADIUS_M
        )));
    }
    let place_type = query
        .place_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    success(state.maps.nearby_search(center, radius, place_type).await?)
}

/// GET /api/places/{placeId} - Resolve a place id.
pub async fn place_details(
    State(state): State<AppState>,
    ApiPath(place_id): ApiPath<String>,
) -> ApiResult<PlaceDetails> {
    match state.maps.place_details(&place_id).await? {
        Some(details) => success(details),
        None => Err(AppError::NotFound(format!("Place {} not found", place_id))),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReverseGeocodeQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseGeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    /// `None` when the point has no known address
    pub address: Option<String>,
}

/// GET /api/geocode/reverse - Address of a coordinate.
pub async fn reverse_geocode(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReverseGeocodeQuery>,
) -> ApiResult<ReverseGeocodeResult> {
    let point = location(query.lat, query.lng)?;
    let address = state.maps.reverse_geocode(point).await?;
    success(ReverseGeocodeResult {
        latitude: query.lat,
        longitude: query.lng,
        address,
    })
}

#[derive(Debug, Deserialize)]
pub struct DirectionsQuery {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub mode: TravelMode,
}

/// GET /api/directions - Candidate routes between two places.
pub async fn directions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DirectionsQuery>,
) -> ApiResult<Vec<RouteOption>> {
    let origin = required(&query.origin, "origin")?;
    let destination = required(&query.destination, "destination")?;
    success(state.maps.directions(origin, destination, query.mode).await?)
}
