//! Slippy-map tile arithmetic and Terrarium raster decoding.
//!
//! Terrarium tiles encode elevation in PNG channels as
//! `R·256 + G + B/256 − 32768` meters per pixel.

use crate::error::FetchError;
use geodesy::LatLng;
use std::f64::consts::PI;

/// Pixels per tile edge.
pub const TILE_SIZE: u32 = 256;

/// A slippy-map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Fractional tile-space coordinates of `point` at `zoom`.
fn tile_space(point: LatLng, zoom: u8) -> (f64, f64) {
    let n = f64::from(1u32 << zoom);
    let x = (point.lng + 180.0) / 360.0 * n;
    let lat_rad = point.lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

/// Returns the tile containing `point` at `zoom`.
pub fn tile_at(point: LatLng, zoom: u8) -> TileId {
    let n = (1u32 << zoom) - 1;
    let (x, y) = tile_space(point, zoom);
    TileId {
        zoom,
        x: (x.floor() as i64).clamp(0, i64::from(n)) as u32,
        y: (y.floor() as i64).clamp(0, i64::from(n)) as u32,
    }
}

/// Returns the pixel of `tile` that `point` falls on, clamped to the
/// tile bounds.
pub fn pixel_in(point: LatLng, tile: TileId) -> (u32, u32) {
    let (x, y) = tile_space(point, tile.zoom);
    let max = f64::from(TILE_SIZE - 1);
    let px = ((x - f64::from(tile.x)) * f64::from(TILE_SIZE))
        .floor()
        .clamp(0.0, max);
    let py = ((y - f64::from(tile.y)) * f64::from(TILE_SIZE))
        .floor()
        .clamp(0.0, max);
    (px as u32, py as u32)
}

/// A decoded elevation raster for one tile.
pub struct TileRaster {
    width: u32,
    elevations: Box<[f64]>,
}

impl TileRaster {
    /// Decodes a Terrarium PNG.
    pub fn decode(bytes: &[u8]) -> Result<Self, FetchError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| FetchError::Decode(e.to_string()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FetchError::Decode("empty raster".to_string()));
        }

        let elevations = image
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                f64::from(r) * 256.0 + f64::from(g) + f64::from(b) / 256.0 - 32_768.0
            })
            .collect();

        Ok(Self { width, elevations })
    }

    /// Elevation in meters at pixel (px, py).
    pub fn elevation_at(&self, px: u32, py: u32) -> f64 {
        let height = self.elevations.len() as u32 / self.width;
        let px = px.min(self.width - 1);
        let py = py.min(height - 1);
        self.elevations[(py * self.width + px) as usize]
    }
}
