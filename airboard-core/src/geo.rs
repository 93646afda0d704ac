//! Great-circle distance.

use crate::types::Coordinate;

/// WGS-84 equatorial radius, the sphere the distance figures are quoted on.
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Distance between two validated coordinates, in kilometres.
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_km(a.latitude(), a.longitude(), b.latitude(), b.longitude())
}
