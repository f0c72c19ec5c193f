//! Viewshed analysis and candidate ranking.
//!
//! Turns a center, radius, date, and mode into a ranked list of ground
//! points scored by how cleanly they see the sun meet the horizon:
//! hex-grid generation, per-candidate ray casting along the solar
//! azimuth, a composite score, and the orchestrator that drives the
//! whole pipeline with progress and cancellation.

mod engine;
mod error;
mod grid;
mod pipeline;
mod score;

pub use crate::engine::{
    analyze, obstruction, Analysis, Obstruction, RayConfig, RaySample, ViewQuality,
};
pub use crate::error::PipelineError;
pub use crate::grid::{hex_grid, DEFAULT_GRID_SPACING_M};
pub use crate::pipeline::{
    PipelineConfig, PipelineOutput, Progress, ProgressFn, Scout, Stage, DEFAULT_RADIUS_M,
};
pub use crate::score::{rank, score, score_color, verdict, ScoreParams, ScoredCandidate};

use geodesy::LatLng;
use serde::Serialize;

/// A grid point that resolved an elevation and survived into the
/// analysis.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub point: LatLng,
    pub elevation_m: f64,
}
