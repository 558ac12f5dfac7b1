//! Route geometry: polyline decoding and point-to-route distances.
//!
//! Distances are in metres. Segment distances use a local equirectangular
//! projection centred on the query point, which is accurate to well under a
//! metre for the corridor widths involved (hundreds of metres).

use serde::{Deserialize, Serialize};

/// Mean earth radius in metres (IUGG).
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Error returned for a malformed encoded polyline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolylineError {
    #[error("invalid polyline character {0:?} at offset {1}")]
    InvalidChar(char, usize),
    #[error("polyline ends in the middle of a value")]
    Truncated,
    #[error("polyline value at offset {0} overflows")]
    Overflow(usize),
}

/// Decode a Google encoded polyline (precision 1e5).
pub fn decode_polyline(encoded: &str) -> Result<Vec<LatLng>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut path = Vec::new();

    while index < bytes.len() {
        lat += decode_value(bytes, &mut index)?;
        lng += decode_value(bytes, &mut index)?;
        path.push(LatLng::new(lat as f64 / 1e5, lng as f64 / 1e5));
    }

    Ok(path)
}

fn decode_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let start = *index;
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes.get(*index).ok_or(PolylineError::Truncated)?;
        if !(63..=126).contains(&byte) {
            return Err(PolylineError::InvalidChar(byte as char, *index));
        }
        if shift > 30 {
            return Err(PolylineError::Overflow(start));
        }
        *index += 1;

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Great-circle distance between two points.
pub fn haversine_distance(a: LatLng, b: LatLng) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Shortest distance from `p` to the segment `a`-`b`, together with the
/// fraction along the segment (0 at `a`, 1 at `b`) of the closest point.
pub fn distance_to_segment(p: LatLng, a: LatLng, b: LatLng) -> (f64, f64) {
    let (ax, ay) = project(p, a);
    let (bx, by) = project(p, b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((cx * cx + cy * cy).sqrt(), t)
}

/// Project `q` onto a plane tangent at `origin`, in metres.
fn project(origin: LatLng, q: LatLng) -> (f64, f64) {
    let mut d_lng = q.lng - origin.lng;
    if d_lng > 180.0 {
        d_lng -= 360.0;
    } else if d_lng < -180.0 {
        d_lng += 360.0;
    }
    let x = d_lng.to_radians() * origin.lat.to_radians().cos() * EARTH_RADIUS_METERS;
    let y = (q.lat - origin.lat).to_radians() * EARTH_RADIUS_METERS;
    (x, y)
}

/// Where a point sits relative to a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathDistance {
    /// Distance from the point to the closest point on the path
    pub distance: f64,
    /// Length of the path from its start to that closest point
    pub along: f64,
}

/// Distance from `p` to a polyline. `None` for an empty path.
pub fn distance_to_path(p: LatLng, path: &[LatLng]) -> Option<PathDistance> {
    match path {
        [] => None,
        [only] => Some(PathDistance {
            distance: haversine_distance(p, *only),
            along: 0.0,
        }),
        _ => {
            let mut best: Option<PathDistance> = None;
            let mut travelled = 0.0;

            for segment in path.windows(2) {
                let (a, b) = (segment[0], segment[1]);
                let segment_len = haversine_distance(a, b);
                let (distance, t) = distance_to_segment(p, a, b);

                if best.map_or(true, |b| distance < b.distance) {
                    best = Some(PathDistance {
                        distance,
                        along: travelled + t * segment_len,
                    });
                }
                travelled += segment_len;
            }

            best
        }
    }
}

/// Axis-aligned box around a path, widened by a buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Box enclosing `path` plus `buffer_m` on every side. `None` for an empty path.
    pub fn around(path: &[LatLng], buffer_m: f64) -> Option<Self> {
        let first = path.first()?;
        let mut bbox = BoundingBox {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lng: first.lng,
            max_lng: first.lng,
        };
        for point in &path[1..] {
            bbox.min_lat = bbox.min_lat.min(point.lat);
            bbox.max_lat = bbox.max_lat.max(point.lat);
            bbox.min_lng = bbox.min_lng.min(point.lng);
            bbox.max_lng = bbox.max_lng.max(point.lng);
        }

        let lat_buffer = (buffer_m / EARTH_RADIUS_METERS).to_degrees();
        // Longitude degrees shrink towards the poles; widest latitude governs.
        let widest_lat = bbox.min_lat.abs().max(bbox.max_lat.abs());
        let lng_buffer = if widest_lat + lat_buffer >= 85.0 {
            180.0
        } else {
            lat_buffer / (widest_lat + lat_buffer).to_radians().cos()
        };

        Some(BoundingBox {
            min_lat: (bbox.min_lat - lat_buffer).max(-90.0),
            max_lat: (bbox.max_lat + lat_buffer).min(90.0),
            min_lng: bbox.min_lng - lng_buffer,
            max_lng: bbox.max_lng + lng_buffer,
        })
    }

    pub fn contains(&self, p: LatLng) -> bool {
        // A box spilling over the antimeridian does not constrain longitude.
        let wraps = self.min_lng < -180.0 || self.max_lng > 180.0;
        (self.min_lat..=self.max_lat).contains(&p.lat)
            && (wraps || (self.min_lng..=self.max_lng).contains(&p.lng))
    }
}

/// Items whose position lies within `corridor_m` of `path`, ordered by how
/// far along the path they occur.
pub fn along_route<'a, T, F>(
    path: &[LatLng],
    items: &'a [T],
    position: F,
    corridor_m: f64,
) -> Vec<(&'a T, PathDistance)>
where
    F: Fn(&T) -> LatLng,
{
    let Some(bbox) = BoundingBox::around(path, corridor_m) else {
        return Vec::new();
    };

    let mut matched: Vec<(&T, PathDistance)> = items
        .iter()
        .filter_map(|item| {
            let p = position(item);
            if !bbox.contains(p) {
                return None;
            }
            distance_to_path(p, path)
                .filter(|d| d.distance <= corridor_m)
                .map(|d| (item, d))
        })
        .collect();

    matched.sort_by(|a, b| a.1.along.total_cmp(&b.1.along));
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn test_decode_reference_polyline() {
        let path = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(
            path,
            vec![
                LatLng::new(38.5, -120.2),
                LatLng::new(40.7, -120.95),
                LatLng::new(43.252, -126.453),
            ]
        );
    }

    #[test]
    fn test_decode_empty_polyline() {
        assert!(decode_polyline("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_polyline("_p~iF~ps|"), Err(PolylineError::Truncated));
        assert!(matches!(
            decode_polyline("_p~iF ps|U"),
            Err(PolylineError::InvalidChar(' ', 5))
        ));
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_distance(LatLng::new(0.0, 0.0), LatLng::new(1.0, 0.0));
        assert_close(d, 111_195.0, 10.0);
    }

    #[test]
    fn test_distance_to_segment_perpendicular() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(0.0, 0.02);
        // ~111 m north of the segment midpoint
        let p = LatLng::new(0.001, 0.01);
        let (distance, t) = distance_to_segment(p, a, b);
        assert_close(distance, 111.2, 0.5);
        assert_close(t, 0.5, 1e-6);
    }

    #[test]
    fn test_distance_to_segment_clamps_to_endpoint() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(0.0, 0.01);
        let p = LatLng::new(0.0, -0.01);
        let (distance, t) = distance_to_segment(p, a, b);
        assert_eq!(t, 0.0);
        assert_close(distance, haversine_distance(p, a), 0.5);
    }

    #[test]
    fn test_distance_to_path_tracks_along_distance() {
        let path = [
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 0.01),
            LatLng::new(0.01, 0.01),
        ];
        let near_second_leg = LatLng::new(0.005, 0.0101);
        let d = distance_to_path(near_second_leg, &path).unwrap();
        assert_close(d.distance, 11.1, 0.5);
        let first_leg = haversine_distance(path[0], path[1]);
        assert_close(d.along, first_leg + first_leg / 2.0, 1.0);

        assert!(distance_to_path(near_second_leg, &[]).is_none());
    }

    #[test]
    fn test_bounding_box_buffer() {
        let bbox = BoundingBox::around(&[LatLng::new(10.0, 20.0)], 1_000.0).unwrap();
        assert!(bbox.contains(LatLng::new(10.008, 20.0)));
        assert!(!bbox.contains(LatLng::new(10.02, 20.0)));
        assert!(BoundingBox::around(&[], 1_000.0).is_none());
    }

    #[test]
    fn test_along_route_filters_and_orders() {
        let path = [LatLng::new(0.0, 0.0), LatLng::new(0.0, 0.1)];
        let points = [
            ("late", LatLng::new(0.001, 0.08)),
            ("far", LatLng::new(0.05, 0.05)),
            ("early", LatLng::new(-0.001, 0.02)),
        ];

        let matched = along_route(&path, &points, |(_, p)| *p, 500.0);
        let names: Vec<&str> = matched.iter().map(|(item, _)| item.0).collect();
        assert_eq!(names, vec!["early", "late"]);
        assert!(matched.iter().all(|(_, d)| d.distance <= 500.0));
    }
}
