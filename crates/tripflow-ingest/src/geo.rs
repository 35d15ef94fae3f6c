//! Great-circle distance and speed

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Haversine distance in kilometers between two points given in degrees
///
/// Symmetric, zero for coincident points and never negative. Only NaN input
/// produces NaN.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Average speed in km/h, never negative
///
/// A zero or negative duration yields 0 rather than infinity or a negative speed.
pub fn speed_kmh(distance_km: f64, duration_secs: i64) -> f64 {
    if duration_secs <= 0 {
        return 0.0;
    }
    distance_km / (duration_secs as f64 / SECONDS_PER_HOUR)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NYC_CITY_HALL: (f64, f64) = (40.7128, -74.0060);
    const WILLIAMSBURG: (f64, f64) = (40.7306, -73.9352);

    #[test]
    fn test_coincident_points() {
        assert_eq!(distance_km(40.75, -73.98, 40.75, -73.98), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let points = [
            (40.4, -74.3),
            (41.0, -73.7),
            NYC_CITY_HALL,
            WILLIAMSBURG,
            (-33.86, 151.21),
        ];
        for &(lat_a, lon_a) in &points {
            for &(lat_b, lon_b) in &points {
                let ab = distance_km(lat_a, lon_a, lat_b, lon_b);
                let ba = distance_km(lat_b, lon_b, lat_a, lon_a);
                assert_eq!(ab, ba);
                assert!(ab >= 0.0);
            }
        }
    }

    #[test]
    fn test_one_degree_latitude_at_equator() {
        let expected = 111.195;
        let d = distance_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - expected).abs() / expected < 0.005, "got {}", d);
    }

    #[test]
    fn test_manhattan_to_brooklyn() {
        let d = distance_km(NYC_CITY_HALL.0, NYC_CITY_HALL.1, WILLIAMSBURG.0, WILLIAMSBURG.1);
        assert!((d - 6.286).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_antipodal_points_are_finite() {
        let d = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_nan_propagates() {
        assert!(distance_km(f64::NAN, 0.0, 1.0, 1.0).is_nan());
    }

    #[test]
    fn test_speed() {
        assert_eq!(speed_kmh(10.0, 3600), 10.0);
        assert_eq!(speed_kmh(5.0, 600), 30.0);
        assert_eq!(speed_kmh(12.5, 0), 0.0);
        assert_eq!(speed_kmh(0.0, 0), 0.0);
    }

    #[test]
    fn test_negative_duration_gives_zero_speed() {
        assert_eq!(speed_kmh(6.3, -600), 0.0);
        assert_eq!(speed_kmh(6.3, i64::MIN), 0.0);
    }
}
