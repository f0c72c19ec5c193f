//! Spherical-earth geodesy.
//!
//! All routines work on the mean-radius sphere rather than the WGS-84
//! ellipsoid. At the distances this workspace cares about (tens of
//! kilometers) the error is far below the terrain-sample spacing.

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters.
pub const MEAN_EARTH_RADIUS: f64 = 6_371_000.0;

/// A geographic coordinate in decimal degrees.
///
/// `lat` is in [-90, 90], `lng` in [-180, 180).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

/// Returns the great-circle distance between `a` and `b` in meters.
pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lng - a.lng).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS * h.sqrt().asin()
}

/// Returns the initial forward bearing from `a` to `b`, in compass
/// degrees [0, 360).
pub fn bearing_deg(a: LatLng, b: LatLng) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_lambda = (b.lng - a.lng).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Returns the point reached by travelling `distance_m` meters from
/// `origin` along the great circle with initial bearing `bearing_deg`.
pub fn destination_point(origin: LatLng, bearing_deg: f64, distance_m: f64) -> LatLng {
    let delta = distance_m / MEAN_EARTH_RADIUS;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.lat.to_radians();
    let lambda1 = origin.lng.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos())
            .atan2(delta.cos() - phi1.sin() * phi2.sin());

    LatLng {
        lat: phi2.to_degrees(),
        lng: normalize_lng(lambda2.to_degrees()),
    }
}

/// Wraps a longitude into [-180, 180).
pub fn normalize_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

/// Returns how far a point `distance_m` away sits below the observer's
/// tangent plane on a spherical earth.
///
/// Small-angle approximation `d²/2R`; good to well past 20 km.
pub fn curvature_drop_m(distance_m: f64) -> f64 {
    distance_m * distance_m / (2.0 * MEAN_EARTH_RADIUS)
}

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
    "NW", "NNW",
];

/// Returns the nearest of the 16 compass points for an azimuth in
/// degrees clockwise from true north.
pub fn azimuth_to_compass(azimuth_deg: f64) -> &'static str {
    let idx = (azimuth_deg.rem_euclid(360.0) / 22.5).round() as usize % 16;
    COMPASS_POINTS[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PORTLAND: LatLng = LatLng {
        lat: 45.5231,
        lng: -122.6765,
    };

    #[test]
    fn test_haversine_destination_roundtrip() {
        for bearing in [0.0, 37.0, 90.0, 135.5, 180.0, 250.0, 359.0] {
            for distance in [10.0, 350.0, 8_000.0, 20_000.0] {
                let dest = destination_point(PORTLAND, bearing, distance);
                let measured = haversine_m(PORTLAND, dest);
                assert_relative_eq!(measured, distance, max_relative = 1e-3);
            }
        }
    }

    #[test]
    fn test_bearing_quadrants() {
        let north = destination_point(PORTLAND, 0.0, 5_000.0);
        assert!(north.lat > PORTLAND.lat);
        assert_relative_eq!(bearing_deg(PORTLAND, north), 0.0, epsilon = 0.1);

        let east = destination_point(PORTLAND, 90.0, 5_000.0);
        assert!(east.lng > PORTLAND.lng);

        let south = destination_point(PORTLAND, 180.0, 5_000.0);
        assert!(south.lat < PORTLAND.lat);
        assert_relative_eq!(bearing_deg(PORTLAND, south), 180.0, epsilon = 0.1);

        let west = destination_point(PORTLAND, 270.0, 5_000.0);
        assert!(west.lng < PORTLAND.lng);
    }

    #[test]
    fn test_compass_cardinals() {
        assert_eq!(azimuth_to_compass(0.0), "N");
        assert_eq!(azimuth_to_compass(90.0), "E");
        assert_eq!(azimuth_to_compass(180.0), "S");
        assert_eq!(azimuth_to_compass(270.0), "W");
    }

    #[test]
    fn test_compass_midpoints_roundtrip() {
        for (i, label) in COMPASS_POINTS.iter().enumerate() {
            let azimuth = i as f64 * 22.5;
            assert_eq!(azimuth_to_compass(azimuth), *label);
        }
        // Just past the rounding boundary wraps back to north.
        assert_eq!(azimuth_to_compass(348.75 + 11.3), "N");
    }

    #[test]
    fn test_normalize_lng() {
        assert_relative_eq!(normalize_lng(190.0), -170.0);
        assert_relative_eq!(normalize_lng(-190.0), 170.0);
        assert_relative_eq!(normalize_lng(-180.0), -180.0);
        assert_relative_eq!(normalize_lng(180.0), -180.0);
        assert_relative_eq!(normalize_lng(45.0), 45.0);
    }

    #[test]
    fn test_curvature_drop() {
        // ~2 m at 5 km, ~78 m at 1° of arc.
        assert_relative_eq!(curvature_drop_m(5_000.0), 1.962, epsilon = 1e-2);
        assert_relative_eq!(curvature_drop_m(0.0), 0.0);
    }

    #[test]
    fn test_destination_wraps_antimeridian() {
        let near_dateline = LatLng::new(0.0, 179.999);
        let east = destination_point(near_dateline, 90.0, 5_000.0);
        assert!(east.lng < -179.9, "crossed the antimeridian: {}", east.lng);
    }
}
