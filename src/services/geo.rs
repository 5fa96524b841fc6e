//! Geographic calculations

use crate::types::Location;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Location, to: &Location) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Estimate travel time in minutes at a given average speed
pub fn travel_time_minutes(distance_km: f64, average_speed_kmh: f64) -> f64 {
    (distance_km / average_speed_kmh) * 60.0
}

/// Calculate the haversine distance matrix between all points (km)
pub fn distance_matrix(points: &[Location]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..n {
            if i != j {
                matrix[i][j] = haversine_distance(&points[i], &points[j]);
            }
        }
    }

    matrix
}

/// Calculate the time matrix between all points (minutes), at the given average speed
pub fn time_matrix(points: &[Location], average_speed_kmh: f64) -> Vec<Vec<f64>> {
    let distances = distance_matrix(points);
    distances
        .iter()
        .map(|row| row.iter().map(|d| travel_time_minutes(*d, average_speed_kmh)).collect())
        .collect()
}
