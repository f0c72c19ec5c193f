use dashmap::DashMap;
use geodesy::LatLng;

/// Cache-key resolution: 5 decimal places, ~1.1 m at the equator.
const KEY_SCALE: f64 = 1e5;

/// Process-lifetime cache of resolved point elevations.
///
/// Keys are coordinates truncated to 5 decimals, so points closer than
/// the terrain data can distinguish share an entry. Append-only during
/// normal operation; [`PointCache::clear`] exists for tests.
#[derive(Debug, Default)]
pub struct PointCache {
    entries: DashMap<(i64, i64), f64>,
}

impl PointCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(point: LatLng) -> (i64, i64) {
        (
            (point.lat * KEY_SCALE).trunc() as i64,
            (point.lng * KEY_SCALE).trunc() as i64,
        )
    }

    pub fn get(&self, point: LatLng) -> Option<f64> {
        self.entries.get(&Self::key(point)).map(|e| *e)
    }

    pub fn insert(&self, point: LatLng, elevation_m: f64) {
        self.entries.insert(Self::key(point), elevation_m);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
