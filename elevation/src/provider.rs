//! Batched HTTP elevation-provider backend.
//!
//! Points are chunked into bounded batches resolved over a small
//! concurrent pool. The primary provider answers a GET with
//! comma-separated coordinates and an ordered elevation array; when it
//! fails, a fallback provider answers a POST with a location list whose
//! results are re-ordered back onto the request. A batch with both
//! providers down degrades to missing elevations rather than failing
//! the whole resolve.

use crate::error::{ElevationError, FetchError};
use crate::retry::{retry_with_backoff, BACKOFF_BASE};
use futures::stream::{self, StreamExt};
use geodesy::LatLng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PRIMARY_URL: &str = "https://api.open-meteo.com/v1/elevation";
pub const DEFAULT_FALLBACK_URL: &str = "https://api.open-elevation.com/api/v1/lookup";

const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_CONCURRENCY: usize = 2;
const BATCH_ATTEMPTS: u32 = 2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Key granularity used to match fallback results back onto request
/// order; same 5-decimal truncation as the point cache.
fn match_key(lat: f64, lng: f64) -> (i64, i64) {
    ((lat * 1e5).trunc() as i64, (lng * 1e5).trunc() as i64)
}

pub struct BatchClient {
    http: reqwest::Client,
    primary_url: String,
    fallback_url: String,
    batch_size: usize,
    concurrency: usize,
}

#[derive(Deserialize)]
struct PrimaryResponse {
    elevation: Vec<f64>,
}

#[derive(Serialize)]
struct FallbackRequest {
    locations: Vec<FallbackLocation>,
}

#[derive(Serialize)]
struct FallbackLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct FallbackResponse {
    results: Vec<FallbackResult>,
}

#[derive(Deserialize)]
struct FallbackResult {
    latitude: f64,
    longitude: f64,
    elevation: f64,
}

impl BatchClient {
    pub fn new(
        primary_url: impl Into<String>,
        fallback_url: impl Into<String>,
    ) -> Result<Self, ElevationError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            primary_url: primary_url.into(),
            fallback_url: fallback_url.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    pub fn with_defaults() -> Result<Self, ElevationError> {
        Self::new(DEFAULT_PRIMARY_URL, DEFAULT_FALLBACK_URL)
    }

    /// Batch size clamped to what the providers accept per request.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.clamp(1, 250);
        self
    }

    /// Resolves `points`, preserving input order.
    ///
    /// Batches run `concurrency` at a time; `report` receives the size
    /// of each batch as it completes.
    pub(crate) async fn elevations(
        &self,
        points: &[LatLng],
        report: &(dyn Fn(usize) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<f64>>, ElevationError> {
        // `buffered` keeps completion in submission order, so output
        // slots line up with input chunks by construction.
        let mut batches = stream::iter(
            points
                .chunks(self.batch_size)
                .map(|chunk| self.resolve_batch(chunk)),
        )
        .buffered(self.concurrency);

        let mut out = Vec::with_capacity(points.len());
        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => return Err(ElevationError::Cancelled),
                batch = batches.next() => batch,
            };
            let Some(batch) = batch else { break };
            report(batch.len());
            out.extend(batch);
        }

        Ok(out)
    }

    async fn resolve_batch(&self, chunk: &[LatLng]) -> Vec<Option<f64>> {
        match self.primary(chunk).await {
            Ok(elevations) => elevations,
            Err(primary_err) => {
                log::warn!("primary elevation provider failed: {primary_err}; falling back");
                match self.fallback(chunk).await {
                    Ok(elevations) => elevations,
                    Err(fallback_err) => {
                        log::warn!("fallback elevation provider failed: {fallback_err}");
                        vec![None; chunk.len()]
                    }
                }
            }
        }
    }

    async fn primary(&self, chunk: &[LatLng]) -> Result<Vec<Option<f64>>, FetchError> {
        let latitudes = chunk
            .iter()
            .map(|p| format!("{:.6}", p.lat))
            .collect::<Vec<_>>()
            .join(",");
        let longitudes = chunk
            .iter()
            .map(|p| format!("{:.6}", p.lng))
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}?latitude={latitudes}&longitude={longitudes}",
            self.primary_url
        );

        retry_with_backoff(BATCH_ATTEMPTS, BACKOFF_BASE, || async {
            let response = self.http.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status().as_u16()));
            }
            let payload: PrimaryResponse = response.json().await?;
            if payload.elevation.len() != chunk.len() {
                return Err(FetchError::Payload(format!(
                    "expected {} elevations, got {}",
                    chunk.len(),
                    payload.elevation.len()
                )));
            }
            Ok(payload.elevation.into_iter().map(Some).collect())
        })
        .await
    }

    async fn fallback(&self, chunk: &[LatLng]) -> Result<Vec<Option<f64>>, FetchError> {
        let request = FallbackRequest {
            locations: chunk
                .iter()
                .map(|p| FallbackLocation {
                    latitude: p.lat,
                    longitude: p.lng,
                })
                .collect(),
        };

        let payload = retry_with_backoff(BATCH_ATTEMPTS, BACKOFF_BASE, || async {
            let response = self
                .http
                .post(&self.fallback_url)
                .json(&request)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status().as_u16()));
            }
            let payload: FallbackResponse = response.json().await?;
            Ok(payload)
        })
        .await?;

        // The fallback returns an object list; re-order it onto the
        // request, falling back to positional matching when a key is
        // missing (providers echo coordinates at varying precision).
        let by_key: HashMap<(i64, i64), f64> = payload
            .results
            .iter()
            .map(|r| (match_key(r.latitude, r.longitude), r.elevation))
            .collect();

        Ok(chunk
            .iter()
            .enumerate()
            .map(|(i, p)| {
                by_key
                    .get(&match_key(p.lat, p.lng))
                    .copied()
                    .or_else(|| payload.results.get(i).map(|r| r.elevation))
            })
            .collect())
    }
}
