use thiserror::Error;

/// Errors surfaced to callers of [`crate::Resolver::resolve`].
#[derive(Error, Debug)]
pub enum ElevationError {
    /// Every input point failed to resolve. Partial failure is not an
    /// error; affected points simply carry no elevation.
    #[error("elevation data unavailable: every point failed to resolve")]
    AllElevationsFailed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A single fetch attempt failing. Stays internal to the backends;
/// exhausted retries degrade to missing elevations rather than
/// propagating.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("tile decode: {0}")]
    Decode(String),

    #[error("malformed response: {0}")]
    Payload(String),
}
