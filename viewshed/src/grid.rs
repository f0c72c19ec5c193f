//! Hex-packed candidate grid.

use geodesy::{destination_point, LatLng};

/// Nominal spacing between neighboring candidates, in meters.
pub const DEFAULT_GRID_SPACING_M: f64 = 350.0;

/// Generates a hex-packed lattice of points within `radius_m` of
/// `center`.
///
/// Rows are offset by half a spacing on odd rows, which tiles the
/// plane in near-regular hexagons and keeps coverage density uniform
/// across the disc. Planar row/column offsets are mapped onto the
/// sphere as a bearing and distance from the center.
pub fn hex_grid(center: LatLng, radius_m: f64, spacing_m: f64) -> Vec<LatLng> {
    if radius_m <= 0.0 || spacing_m <= 0.0 {
        return Vec::new();
    }

    let row_height = spacing_m * 3.0_f64.sqrt() / 2.0;
    let rows = (radius_m / row_height).ceil() as i64;
    let cols = (radius_m / spacing_m).ceil() as i64;

    let mut points = Vec::new();
    for row in -rows..=rows {
        let y = row as f64 * row_height;
        let offset = if row % 2 != 0 { spacing_m / 2.0 } else { 0.0 };
        for col in -cols..=cols {
            let x = col as f64 * spacing_m + offset;
            let distance = x.hypot(y);
            if distance > radius_m {
                continue;
            }
            if distance == 0.0 {
                points.push(center);
                continue;
            }
            // Planar displacement as bearing: x east, y north.
            let bearing = x.atan2(y).to_degrees().rem_euclid(360.0);
            points.push(destination_point(center, bearing, distance));
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodesy::haversine_m;
    use std::f64::consts::PI;

    const CENTER: LatLng = LatLng {
        lat: 45.5231,
        lng: -122.6765,
    };

    #[test]
    fn test_all_points_within_radius() {
        let radius = 5_000.0;
        for point in hex_grid(CENTER, radius, DEFAULT_GRID_SPACING_M) {
            let d = haversine_m(CENTER, point);
            assert!(d <= radius * 1.0005, "point {d} m out of {radius} m disc");
        }
    }

    #[test]
    fn test_count_tracks_disc_area() {
        let radius = 5_000.0;
        let spacing = DEFAULT_GRID_SPACING_M;
        let count = hex_grid(CENTER, radius, spacing).len() as f64;
        let expected = PI * radius * radius / (spacing * spacing * 3.0_f64.sqrt() / 2.0);
        let ratio = count / expected;
        assert!(
            (0.85..=1.15).contains(&ratio),
            "count {count} vs expected {expected}"
        );
    }

    #[test]
    fn test_degenerate_radius() {
        assert!(hex_grid(CENTER, 0.0, 350.0).is_empty());
        assert!(hex_grid(CENTER, -10.0, 350.0).is_empty());
    }

    #[test]
    fn test_center_is_emitted_once() {
        let grid = hex_grid(CENTER, 1_000.0, 350.0);
        let at_center = grid
            .iter()
            .filter(|p| haversine_m(CENTER, **p) < 1.0)
            .count();
        assert_eq!(at_center, 1);
    }

    #[test]
    fn test_neighbor_spacing() {
        let grid = hex_grid(CENTER, 1_500.0, 350.0);
        // Nearest neighbor of the center point sits one spacing away.
        let nearest = grid
            .iter()
            .map(|p| haversine_m(CENTER, *p))
            .filter(|d| *d > 1.0)
            .fold(f64::INFINITY, f64::min);
        assert!((nearest - 350.0).abs() < 5.0, "nearest neighbor {nearest}");
    }
}
