use thiserror::Error;

use crate::model::{SequenceError, SessionResultError};

/// Umbrella error for callers that want a single `sim-core` error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    SessionResult(#[from] SessionResultError),
}
