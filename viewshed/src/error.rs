use elevation::ElevationError;
use solar::SolarError;
use thiserror::Error;

/// Run-fatal pipeline failures. Batch-scoped problems (a failed tile,
/// a missing ray sample) degrade inside the stages instead of
/// surfacing here.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No candidate elevation could be resolved at all.
    #[error("elevation data unavailable")]
    ElevationUnavailable(#[source] ElevationError),

    #[error(transparent)]
    Solar(#[from] SolarError),

    #[error("run cancelled")]
    Cancelled,
}

impl From<ElevationError> for PipelineError {
    fn from(err: ElevationError) -> Self {
        match err {
            ElevationError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::ElevationUnavailable(other),
        }
    }
}
