//! Spatial math for cell areas, distances and unit conversions.

/// Feet in one international nautical mile.
pub const FT_PER_NM: f64 = 1852.0 / 0.3048;
pub const M_PER_NM: f64 = 1852.0;
pub const FT_PER_M: f64 = 1.0 / 0.3048;
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// WGS-84 semi-major axis (m).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

pub fn feet_to_nm(feet: f64) -> f64 {
    feet / FT_PER_NM
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * FT_PER_M
}

/// Calculate distance between two points in nautical miles using the Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt()) / M_PER_NM
}

/// Area in NM² of the ellipsoidal quadrangle bounded by two parallels and two meridians.
///
/// Uses the closed-form zone area on the WGS-84 ellipsoid:
/// `A = b²·Δλ/2 · [q(φ2) − q(φ1)]`.
pub fn quadrangle_area_nm2(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> f64 {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let e = e2.sqrt();
    let b2 = WGS84_A * WGS84_A * (1.0 - e2);

    let q = |lat_deg: f64| {
        let s = lat_deg.clamp(-90.0, 90.0).to_radians().sin();
        s / (1.0 - e2 * s * s) + ((1.0 + e * s) / (1.0 - e * s)).ln() / (2.0 * e)
    };

    let dlambda = (lon_max - lon_min).abs().to_radians();
    let area_m2 = 0.5 * b2 * dlambda * (q(lat_max) - q(lat_min)).abs();
    area_m2 / (M_PER_NM * M_PER_NM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // one degree of latitude is ~60 NM
        let dist = haversine_nm(0.0, 0.0, 1.0, 0.0);
        assert!((dist - 60.04).abs() < 0.1);
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_nm(42.36, -71.01, 42.36, -71.01);
        assert!(dist < 1e-9);
    }

    #[test]
    fn quadrangle_area_matches_spherical_estimate_near_equator() {
        // 1° x 1° at the equator is close to 60 NM x 60 NM
        let area = quadrangle_area_nm2(0.0, 1.0, 0.0, 1.0);
        assert!((area - 3600.0).abs() / 3600.0 < 0.01, "area {area}");
    }

    #[test]
    fn quadrangle_area_shrinks_with_latitude() {
        let low = quadrangle_area_nm2(10.0, 11.0, 0.0, 1.0);
        let high = quadrangle_area_nm2(60.0, 61.0, 0.0, 1.0);
        assert!(high < low);
        assert!((high / low - 0.49).abs() < 0.05);
    }

    #[test]
    fn quadrangle_area_is_additive() {
        let whole = quadrangle_area_nm2(40.0, 42.0, -75.0, -73.0);
        let parts = quadrangle_area_nm2(40.0, 41.0, -75.0, -73.0)
            + quadrangle_area_nm2(41.0, 42.0, -75.0, -74.0)
            + quadrangle_area_nm2(41.0, 42.0, -74.0, -73.0);
        assert!((whole - parts).abs() < 1e-6);
    }

    #[test]
    fn feet_conversions() {
        assert!((feet_to_nm(FT_PER_NM) - 1.0).abs() < 1e-12);
        assert!((meters_to_feet(0.3048) - 1.0).abs() < 1e-12);
    }
}
