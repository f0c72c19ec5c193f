//! Ray-cast viewshed analysis.
//!
//! For each candidate the engine walks a single line of sight toward
//! the sun's azimuth, samples terrain along it, and keeps the highest
//! apparent elevation angle. Distant samples are lowered by the earth
//! curvature drop before the angle is taken, so a ridge hull-down over
//! the horizon does not count as a blocker.

use crate::error::PipelineError;
use crate::Candidate;
use elevation::{ElevatedPoint, ElevationError, Resolver};
use geodesy::{curvature_drop_m, destination_point, LatLng};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Obstruction progress is reported at least this often.
const PROGRESS_EVERY: usize = 100;

/// Ray-cast tuning. The defaults match the product behavior; tests
/// shrink them.
#[derive(Debug, Clone, Copy)]
pub struct RayConfig {
    /// Distance between ray samples, meters.
    pub sample_spacing_m: f64,

    /// How far the ray reaches, meters.
    pub max_distance_m: f64,

    /// Samples beyond this distance get the curvature correction.
    pub curvature_threshold_m: f64,

    /// Obstruction angles below this margin still count as clear;
    /// covers the apparent radius of the solar disk.
    pub horizon_margin_deg: f64,
}

impl Default for RayConfig {
    fn default() -> Self {
        Self {
            sample_spacing_m: 300.0,
            max_distance_m: 8_000.0,
            curvature_threshold_m: 2_000.0,
            horizon_margin_deg: 0.5,
        }
    }
}

impl RayConfig {
    /// Sample distances along the ray: spacing, 2·spacing, … up to
    /// the maximum reach.
    pub fn steps(&self) -> Vec<f64> {
        let count = (self.max_distance_m / self.sample_spacing_m).floor() as usize;
        (1..=count).map(|i| i as f64 * self.sample_spacing_m).collect()
    }
}

/// One resolved terrain sample along a candidate's sight line.
#[derive(Debug, Clone, Copy)]
pub struct RaySample {
    pub point: LatLng,

    /// Nominal distance from the candidate (the spacing index, not a
    /// re-measured great-circle distance).
    pub distance_m: f64,

    pub elevation_m: f64,
}

/// What blocks (or fails to block) a candidate's view.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Obstruction {
    /// Maximum apparent elevation angle along the ray, degrees.
    /// -90 when no sample survived.
    pub obstruction_angle_deg: f64,

    pub max_blocker_distance_m: f64,

    /// Raw terrain elevation of the highest blocker, before the
    /// curvature correction.
    pub max_blocker_elevation_m: f64,

    pub is_clear: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewQuality {
    Clear,
    Obstructed,
}

impl std::fmt::Display for ViewQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewQuality::Clear => write!(f, "clear"),
            ViewQuality::Obstructed => write!(f, "obstructed"),
        }
    }
}

/// A candidate with its obstruction verdict and the sun geometry it
/// was judged against.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    #[serde(flatten)]
    pub candidate: Candidate,

    #[serde(flatten)]
    pub obstruction: Obstruction,

    pub sun_azimuth_deg: f64,
    pub sun_altitude_deg: f64,
    pub view_quality: ViewQuality,
}

/// Sweeps a candidate's ray samples for the highest apparent blocker.
pub fn obstruction(candidate_elevation_m: f64, samples: &[RaySample], cfg: &RayConfig) -> Obstruction {
    let mut max_angle = -90.0_f64;
    let mut max_distance = 0.0;
    let mut max_elevation = 0.0;

    for sample in samples {
        let mut terrain = sample.elevation_m;
        if sample.distance_m > cfg.curvature_threshold_m {
            terrain -= curvature_drop_m(sample.distance_m);
        }
        let delta = terrain - candidate_elevation_m;
        let angle = delta.atan2(sample.distance_m).to_degrees();
        if angle > max_angle {
            max_angle = angle;
            max_distance = sample.distance_m;
            max_elevation = sample.elevation_m;
        }
    }

    Obstruction {
        obstruction_angle_deg: max_angle,
        max_blocker_distance_m: max_distance,
        max_blocker_elevation_m: max_elevation,
        is_clear: max_angle < cfg.horizon_margin_deg,
    }
}

/// Runs both viewshed phases over the candidate set.
///
/// Phase A expands every candidate into ray points, resolves their
/// elevations in one bulk call (`ray_progress`), and drops samples
/// that failed to resolve. Phase B computes obstructions across a
/// rayon pool off the async runtime (`scan_progress`), falling back to
/// the caller's thread if the worker dies. Output order follows the
/// filtered candidate order.
pub async fn analyze(
    points: &[ElevatedPoint],
    sun_azimuth_deg: f64,
    sun_altitude_deg: f64,
    resolver: &Resolver,
    cfg: &RayConfig,
    ray_progress: elevation::Progress<'_>,
    scan_progress: Arc<dyn Fn(usize, usize) + Send + Sync>,
    cancel: &CancellationToken,
) -> Result<Vec<Analysis>, PipelineError> {
    let candidates: Vec<Candidate> = points
        .iter()
        .filter_map(|p| {
            p.elevation_m.map(|elevation_m| Candidate {
                point: p.point,
                elevation_m,
            })
        })
        .collect();

    // Phase A: one flat elevation request for every ray of every
    // candidate, re-split afterwards by the per-candidate count.
    let steps = cfg.steps();
    let mut ray_points = Vec::with_capacity(candidates.len() * steps.len());
    for candidate in &candidates {
        for &distance in &steps {
            ray_points.push(destination_point(candidate.point, sun_azimuth_deg, distance));
        }
    }

    let ray_elevations: Vec<Option<f64>> =
        match resolver.resolve(&ray_points, ray_progress, cancel).await {
            Ok(resolved) => resolved.into_iter().map(|p| p.elevation_m).collect(),
            Err(ElevationError::AllElevationsFailed) => {
                // Degraded run: every candidate scans an empty ray.
                log::warn!("no ray elevations resolved; treating horizons as open");
                vec![None; ray_points.len()]
            }
            Err(err) => return Err(err.into()),
        };

    let work: Vec<(Candidate, Vec<RaySample>)> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            let base = i * steps.len();
            let samples = steps
                .iter()
                .enumerate()
                .filter_map(|(j, &distance_m)| {
                    ray_elevations[base + j].map(|elevation_m| RaySample {
                        point: ray_points[base + j],
                        distance_m,
                        elevation_m,
                    })
                })
                .collect();
            (candidate, samples)
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    // Phase B: CPU-bound, embarrassingly parallel.
    let work = Arc::new(work);
    let obstructions = {
        let work_for_pool = Arc::clone(&work);
        let pool_cfg = *cfg;
        let pool_progress = Arc::clone(&scan_progress);
        match tokio::task::spawn_blocking(move || {
            scan(&work_for_pool, &pool_cfg, pool_progress.as_ref())
        })
        .await
        {
            Ok(obstructions) => obstructions,
            Err(err) => {
                log::warn!("viewshed worker failed ({err}); computing on the caller thread");
                scan(&work, cfg, scan_progress.as_ref())
            }
        }
    };

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    Ok(work
        .iter()
        .zip(obstructions)
        .map(|((candidate, _), obstruction)| Analysis {
            candidate: *candidate,
            view_quality: if obstruction.is_clear {
                ViewQuality::Clear
            } else {
                ViewQuality::Obstructed
            },
            obstruction,
            sun_azimuth_deg,
            sun_altitude_deg,
        })
        .collect())
}

fn scan(
    work: &[(Candidate, Vec<RaySample>)],
    cfg: &RayConfig,
    progress: &(dyn Fn(usize, usize) + Send + Sync),
) -> Vec<Obstruction> {
    let total = work.len();
    let done = AtomicUsize::new(0);
    work.par_iter()
        .map(|(candidate, samples)| {
            let result = obstruction(candidate.elevation_m, samples, cfg);
            let completed = done.fetch_add(1, Ordering::Relaxed) + 1;
            if completed % PROGRESS_EVERY == 0 || completed == total {
                progress(completed, total);
            }
            result
        })
        .collect()
}
