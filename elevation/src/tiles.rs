//! Terrain-tile backend.
//!
//! Resolves elevations by fetching Terrarium PNG tiles over HTTPS.
//! Every unique tile is fetched at most once per process; concurrent
//! requests for the same tile join the in-flight fetch by awaiting the
//! same one-shot cell rather than issuing a second download.

use crate::error::{ElevationError, FetchError};
use crate::retry::{retry_with_backoff, BACKOFF_BASE};
use crate::terrarium::{pixel_in, tile_at, TileId, TileRaster};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use geodesy::LatLng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// AWS terrain-tiles Terrarium endpoint.
pub const DEFAULT_TILE_URL: &str = "https://s3.amazonaws.com/elevation-tiles-prod/terrarium";

/// Zoom 12 is ~9.5 km per tile at the equator, a few meters per pixel
/// of ground resolution.
pub const DEFAULT_ZOOM: u8 = 12;

const TILE_ATTEMPTS: u32 = 3;
const TILE_CONCURRENCY: usize = 4;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

type TileCell = Arc<OnceCell<Arc<TileRaster>>>;

pub struct TileClient {
    http: reqwest::Client,
    base_url: String,
    zoom: u8,
    tiles: DashMap<TileId, TileCell>,
}

impl TileClient {
    pub fn new(base_url: impl Into<String>, zoom: u8) -> Result<Self, ElevationError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            zoom,
            tiles: DashMap::new(),
        })
    }

    pub fn with_defaults() -> Result<Self, ElevationError> {
        Self::new(DEFAULT_TILE_URL, DEFAULT_ZOOM)
    }

    /// Number of tiles decoded so far.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn clear(&self) {
        self.tiles.clear();
    }

    /// Resolves `points` against tile rasters, preserving input order.
    ///
    /// `report` is invoked with the number of newly completed points
    /// after each tile finishes. Points on tiles that fail all retry
    /// attempts come back as `None`.
    pub(crate) async fn elevations(
        &self,
        points: &[LatLng],
        report: &(dyn Fn(usize) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<f64>>, ElevationError> {
        let mut by_tile: HashMap<TileId, Vec<usize>> = HashMap::new();
        for (idx, point) in points.iter().enumerate() {
            by_tile.entry(tile_at(*point, self.zoom)).or_default().push(idx);
        }

        let mut out = vec![None; points.len()];
        let mut fetches = stream::iter(by_tile.into_iter().map(|(id, indexes)| async move {
            let raster = self.tile(id, cancel).await?;
            Ok::<_, ElevationError>((raster, indexes))
        }))
        .buffer_unordered(TILE_CONCURRENCY);

        while let Some(completed) = fetches.next().await {
            let (raster, indexes) = completed?;
            report(indexes.len());
            let Some(raster) = raster else { continue };
            for idx in indexes {
                let (px, py) = pixel_in(points[idx], tile_at(points[idx], self.zoom));
                out[idx] = Some(raster.elevation_at(px, py));
            }
        }

        Ok(out)
    }

    /// Returns the raster for `id`, fetching it if this is the first
    /// request. Failed fetches return `Ok(None)` and leave the cell
    /// empty so a later run may try again.
    async fn tile(
        &self,
        id: TileId,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<TileRaster>>, ElevationError> {
        let cell: TileCell = self
            .tiles
            .entry(id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let fetched = tokio::select! {
            _ = cancel.cancelled() => return Err(ElevationError::Cancelled),
            fetched = cell.get_or_try_init(|| self.fetch_tile(id)) => fetched,
        };

        match fetched {
            Ok(raster) => Ok(Some(raster.clone())),
            Err(err) => {
                log::warn!("tile {id} failed: {err}");
                Ok(None)
            }
        }
    }

    async fn fetch_tile(&self, id: TileId) -> Result<Arc<TileRaster>, FetchError> {
        let url = format!("{}/{}/{}/{}.png", self.base_url, id.zoom, id.x, id.y);
        retry_with_backoff(TILE_ATTEMPTS, BACKOFF_BASE, || async {
            let response = self.http.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status().as_u16()));
            }
            let bytes = response.bytes().await?;
            let raster = TileRaster::decode(&bytes)?;
            log::debug!("fetched tile {id} ({} bytes)", bytes.len());
            Ok(Arc::new(raster))
        })
        .await
    }
}
