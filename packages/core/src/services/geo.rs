//! Geographic distance predicate for radius queries.
//!
//! Candidate rows are narrowed in SQL to a latitude band around the query
//! center, then the exact great-circle distance decides inclusion. The band
//! is a superset of the radius disk: latitude degrees have (near) constant
//! ground length, so `radius / EARTH_RADIUS` converted to degrees bounds
//! how far any point inside the disk can stray from the center latitude.
//! Longitude is deliberately left unbounded - its ground length collapses
//! toward the poles and wraps at the antimeridian, and the exact post-filter
//! makes a longitude prefilter an optimization only.

use crate::models::{validate_coordinates, ValidationError};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates, in meters (haversine).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Latitude band `[min_lat, max_lat]` containing every point within
/// `radius_meters` of the center, clamped to the legal latitude range.
pub fn latitude_band(center_lat: f64, radius_meters: f64) -> (f64, f64) {
    let delta_deg = (radius_meters / EARTH_RADIUS_METERS).to_degrees();
    (
        (center_lat - delta_deg).max(-90.0),
        (center_lat + delta_deg).min(90.0),
    )
}

/// Validate the center point and radius of a proximity query.
pub fn validate_radius_query(
    latitude: f64,
    longitude: f64,
    radius_meters: f64,
) -> Result<(), ValidationError> {
    validate_coordinates(latitude, longitude)?;
    if !radius_meters.is_finite() || radius_meters < 0.0 {
        return Err(ValidationError::InvalidRadius(radius_meters));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paris_to_london_is_about_343_km() {
        let d = haversine_distance(48.8566, 2.3522, 51.5074, -0.1278);
        assert!(
            (d - 343_500.0).abs() < 5_000.0,
            "Expected ~343 km, got {} m",
            d
        );
    }

    #[test]
    fn zero_distance_at_identical_points() {
        assert_eq!(haversine_distance(55.75, 37.61, 55.75, 37.61), 0.0);
    }

    #[test]
    fn latitude_band_contains_the_radius_disk() {
        let radius = 10_000.0;
        let (min_lat, max_lat) = latitude_band(55.0, radius);

        // The band edge is exactly one radius of ground distance away along
        // the meridian, so any point of the disk stays inside it.
        assert!(haversine_distance(55.0, 0.0, min_lat, 0.0) >= radius - 1.0);
        assert!(haversine_distance(55.0, 0.0, max_lat, 0.0) >= radius - 1.0);
        assert!(min_lat < 55.0 && max_lat > 55.0);
    }

    #[test]
    fn latitude_band_clamps_at_the_poles() {
        let (min_lat, max_lat) = latitude_band(89.9, 100_000.0);
        assert_eq!(max_lat, 90.0);
        assert!(min_lat < 89.9);
    }

    #[test]
    fn radius_query_validation() {
        assert!(validate_radius_query(55.0, 37.0, 0.0).is_ok());
        assert!(matches!(
            validate_radius_query(55.0, 37.0, -1.0),
            Err(ValidationError::InvalidRadius(_))
        ));
        assert!(matches!(
            validate_radius_query(95.0, 37.0, 10.0),
            Err(ValidationError::CoordinateOutOfRange { .. })
        ));
    }
}
