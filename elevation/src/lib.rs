//! Bulk elevation resolution.
//!
//! The [`Resolver`] turns thousands of point lookups into few network
//! operations: coordinates are first served from a process-lifetime
//! cache, and the misses go to one of two interchangeable backends,
//! a Terrarium tile client or a batched HTTP provider pair.

mod cache;
mod error;
mod provider;
mod retry;
mod terrarium;
mod tiles;

pub use crate::cache::PointCache;
pub use crate::error::{ElevationError, FetchError};
pub use crate::provider::{BatchClient, DEFAULT_FALLBACK_URL, DEFAULT_PRIMARY_URL};
pub use crate::terrarium::{pixel_in, tile_at, TileId, TileRaster, TILE_SIZE};
pub use crate::tiles::{TileClient, DEFAULT_TILE_URL, DEFAULT_ZOOM};

use geodesy::LatLng;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// A coordinate with its resolved elevation, `None` when resolution
/// failed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ElevatedPoint {
    #[serde(flatten)]
    pub point: LatLng,
    pub elevation_m: Option<f64>,
}

/// Where cache misses are resolved.
pub enum Backend {
    Tiles(TileClient),
    Provider(BatchClient),
}

/// Progress callback: `(completed, total)` points, cache hits
/// included.
pub type Progress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

pub struct Resolver {
    backend: Backend,
    cache: PointCache,
}

impl Resolver {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            cache: PointCache::new(),
        }
    }

    pub fn cache(&self) -> &PointCache {
        &self.cache
    }

    /// Resolves an elevation for every point, preserving input order.
    ///
    /// Successful resolutions populate the cache. Failed points come
    /// back with `elevation_m = None`; only the degenerate case of
    /// every point failing is an error.
    pub async fn resolve(
        &self,
        points: &[LatLng],
        progress: Progress<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ElevatedPoint>, ElevationError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(ElevationError::Cancelled);
        }

        let total = points.len();
        let mut elevations: Vec<Option<f64>> =
            points.iter().map(|p| self.cache.get(*p)).collect();

        let misses: Vec<usize> = elevations
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.is_none().then_some(i))
            .collect();
        let hits = total - misses.len();
        progress(hits, total);

        if !misses.is_empty() {
            let miss_points: Vec<LatLng> = misses.iter().map(|&i| points[i]).collect();

            let completed = AtomicUsize::new(hits);
            let report = |batch: usize| {
                let done = completed.fetch_add(batch, Ordering::Relaxed) + batch;
                progress(done.min(total), total);
            };

            let resolved = self
                .backend
                .elevations(&miss_points, &report, cancel)
                .await?;
            debug_assert_eq!(resolved.len(), misses.len());

            for (&idx, elevation) in misses.iter().zip(resolved) {
                if let Some(elevation) = elevation {
                    self.cache.insert(points[idx], elevation);
                }
                elevations[idx] = elevation;
            }
        }

        if elevations.iter().all(Option::is_none) {
            return Err(ElevationError::AllElevationsFailed);
        }

        Ok(points
            .iter()
            .zip(elevations)
            .map(|(&point, elevation_m)| ElevatedPoint { point, elevation_m })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // A backend pointed at a closed local port: any attempt to go to
    // the network fails, so success proves the cache answered.
    fn unroutable_resolver() -> Resolver {
        Resolver::new(Backend::Tiles(
            TileClient::new("http://127.0.0.1:9", DEFAULT_ZOOM).unwrap(),
        ))
    }

    fn grid_points(n: usize) -> Vec<LatLng> {
        (0..n)
            .map(|i| LatLng::new(45.0 + i as f64 * 1e-3, -122.0))
            .collect()
    }

    #[tokio::test]
    async fn test_cache_hits_skip_the_network() {
        let resolver = unroutable_resolver();
        let points = grid_points(100);
        for p in &points {
            resolver.cache().insert(*p, 42.0);
        }

        let calls = Mutex::new(Vec::new());
        let progress = |done: usize, total: usize| calls.lock().unwrap().push((done, total));
        let cancel = CancellationToken::new();

        let resolved = resolver.resolve(&points, &progress, &cancel).await.unwrap();

        assert!(resolved.iter().all(|p| p.elevation_m == Some(42.0)));
        // Progress jumps straight to 100%.
        assert_eq!(calls.lock().unwrap().as_slice(), &[(100, 100)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_point_failing_is_an_error() {
        let resolver = unroutable_resolver();
        let points = grid_points(3);
        let cancel = CancellationToken::new();

        let result = resolver.resolve(&points, &|_, _| {}, &cancel).await;
        assert!(matches!(result, Err(ElevationError::AllElevationsFailed)));
    }

    #[tokio::test]
    async fn test_cancelled_before_any_work() {
        let resolver = unroutable_resolver();
        let points = grid_points(4);
        resolver.cache().insert(points[1], 7.0);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = resolver.resolve(&points, &|_, _| {}, &cancel).await;
        assert!(matches!(result, Err(ElevationError::Cancelled)));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let resolver = unroutable_resolver();
        let cancel = CancellationToken::new();
        let resolved = resolver.resolve(&[], &|_, _| {}, &cancel).await.unwrap();
        assert!(resolved.is_empty());
    }
}
