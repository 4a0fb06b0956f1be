//! Great-circle and local-plane geometry in nautical miles.

/// Mean earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// Feet per nautical mile.
pub const FEET_PER_NM: f64 = 6076.12;

/// Great-circle distance in nautical miles between two points.
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_NM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial great-circle bearing from point 1 to point 2, in [0, 360).
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    normalize_deg(y.atan2(x).to_degrees())
}

/// Point reached travelling `distance_nm` from the origin on `bearing`.
pub fn destination(lat: f64, lon: f64, bearing: f64, distance_nm: f64) -> (f64, f64) {
    let delta = distance_nm / EARTH_RADIUS_NM;
    let theta = bearing.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    (phi2.to_degrees(), normalize_lon(lambda2.to_degrees()))
}

/// Geodetic position of a polar measurement (slant range taken as ground
/// range) relative to a radar origin.
pub fn polar_to_geodetic(origin_lat: f64, origin_lon: f64, range_nm: f64, azimuth_deg: f64) -> (f64, f64) {
    destination(origin_lat, origin_lon, azimuth_deg, range_nm)
}

/// Local north/east offset in nautical miles from point 1 to point 2, using
/// an equirectangular projection at the mean latitude.
pub fn local_offset_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    let mean_lat = ((lat1 + lat2) / 2.0).to_radians();
    let north = (lat2 - lat1).to_radians() * EARTH_RADIUS_NM;
    let east = normalize_lon(lon2 - lon1).to_radians() * EARTH_RADIUS_NM * mean_lat.cos();
    (north, east)
}

/// Great-circle midpoint of two points.
pub fn midpoint(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    let d = haversine_nm(lat1, lon1, lat2, lon2);
    if d == 0.0 {
        return (lat1, lon1);
    }
    destination(lat1, lon1, bearing_deg(lat1, lon1, lat2, lon2), d / 2.0)
}

/// Wrap an angle into [0, 360).
pub fn normalize_deg(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

fn normalize_lon(lon: f64) -> f64 {
    (lon + 540.0).rem_euclid(360.0) - 180.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_minute_of_latitude() {
        let d = haversine_nm(0.0, 0.0, 1.0 / 60.0, 0.0);
        assert!((d - 1.0).abs() < 0.001, "got {d}");
        assert_eq!(haversine_nm(40.0, -74.0, 40.0, -74.0), 0.0);
    }

    #[test]
    fn test_bearing_cardinals() {
        assert!((bearing_deg(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((bearing_deg(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((bearing_deg(1.0, 0.0, 0.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((bearing_deg(0.0, 1.0, 0.0, 0.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_destination_inverse_of_distance() {
        let (lat, lon) = destination(40.7, -74.0, 37.0, 25.0);
        let d = haversine_nm(40.7, -74.0, lat, lon);
        assert!((d - 25.0).abs() < 1e-6);
        assert!((bearing_deg(40.7, -74.0, lat, lon) - 37.0).abs() < 1e-6);
    }

    #[test]
    fn test_destination_crosses_antimeridian() {
        let (_, lon) = destination(0.0, 179.9, 90.0, 60.0);
        assert!(lon < -179.0, "got {lon}");
    }

    #[test]
    fn test_polar_north_of_radar() {
        let (lat, lon) = polar_to_geodetic(50.0, 8.0, 60.0, 0.0);
        assert!((lat - 51.0).abs() < 0.01);
        assert!((lon - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_offset_due_east() {
        let (n, e) = local_offset_nm(40.0, -74.0, 40.0, -73.9);
        assert_eq!(n, 0.0);
        assert!(e > 4.0 && e < 5.0);
    }

    #[test]
    fn test_midpoint() {
        let (lat, lon) = midpoint(40.0, -74.0, 42.0, -74.0);
        assert!((lat - 41.0).abs() < 1e-9);
        assert!((lon + 74.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_deg(-90.0), 270.0);
        assert_eq!(normalize_deg(360.0), 0.0);
        assert_eq!(normalize_lon(190.0), -170.0);
    }
}
