/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance in meters between two points given in degrees.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// True when the user is at most `radius_meters` from the site.
///
/// Inputs are not validated here; callers check coordinate ranges and that
/// the radius is positive.
pub fn is_within_radius(
    user_lat: f64,
    user_lon: f64,
    site_lat: f64,
    site_lon: f64,
    radius_meters: f64,
) -> bool {
    distance_meters(user_lat, user_lon, site_lat, site_lon) <= radius_meters
}

pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    // One meter of latitude, in degrees, on the haversine sphere.
    const DEG_PER_METER: f64 = 180.0 / (std::f64::consts::PI * EARTH_RADIUS_METERS);

    #[test]
    fn same_point_is_zero_distance() {
        assert_eq!(distance_meters(-6.2, 106.8, -6.2, 106.8), 0.0);
        assert!(is_within_radius(-6.2, 106.8, -6.2, 106.8, 1.0));
    }

    #[test]
    fn known_distance_jakarta_to_bandung() {
        let d = distance_meters(-6.2088, 106.8456, -6.9175, 107.6191);
        assert!((d - 116_000.0).abs() < 2_000.0, "got {d}");
    }

    #[test]
    fn radius_edge_is_inclusive() {
        let site = (-6.2, 106.8);
        // A meridian offset, so the distance is exact up to float rounding.
        let at_edge = site.0 + 100.0 * DEG_PER_METER;
        let d = distance_meters(at_edge, site.1, site.0, site.1);
        assert!((d - 100.0).abs() < 1e-6, "got {d}");
        assert!(is_within_radius(at_edge, site.1, site.0, site.1, d));

        let beyond = site.0 + 101.0 * DEG_PER_METER;
        assert!(!is_within_radius(beyond, site.1, site.0, site.1, 100.0));
    }

    #[test]
    fn distance_is_symmetric() {
        let a = distance_meters(51.5, -0.12, 48.85, 2.35);
        let b = distance_meters(48.85, 2.35, 51.5, -0.12);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn coordinate_ranges() {
        assert!(is_valid_coordinate(90.0, 180.0));
        assert!(is_valid_coordinate(-90.0, -180.0));
        assert!(!is_valid_coordinate(90.1, 0.0));
        assert!(!is_valid_coordinate(0.0, -180.5));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
        assert!(!is_valid_coordinate(0.0, f64::INFINITY));
    }
}
