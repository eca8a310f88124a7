//! Errors surfaced at the session gateway boundary.

use thiserror::Error;

use sim_core::model::{ImageRef, SequenceError, SessionId, SessionResultError, SimulationId, SlideId};

/// Failures starting a session. Fatal to the session; the caller may retry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionStartError {
    #[error("simulation {0} not found")]
    NotFound(SimulationId),
    #[error("gateway returned status {0}")]
    Status(u16),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("malformed sequence: {0}")]
    Malformed(#[from] SequenceError),
    #[error("could not decode start payload: {0}")]
    Decode(String),
    #[error("asset {image_ref} for slide {slide} is missing")]
    MissingAsset { slide: SlideId, image_ref: ImageRef },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures ending a session. Non-fatal; the session stays active and end may be retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionEndError {
    #[error("session {0} is not known to the gateway")]
    UnknownSession(SessionId),
    #[error("gateway returned status {0}")]
    Status(u16),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("could not decode end payload: {0}")]
    Decode(String),
    #[error(transparent)]
    InvalidResult(#[from] SessionResultError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors building gateway configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayConfigError {
    #[error("invalid gateway url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("gateway url cannot carry a path: {0}")]
    NotABase(String),
}
