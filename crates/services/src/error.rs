//! Shared error types for the services crate.

use thiserror::Error;

use crate::playback::PlaybackStatus;

/// Errors emitted by the playback controller and runner.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("cannot {operation} while playback is {status}")]
    InvalidTransition {
        operation: &'static str,
        status: PlaybackStatus,
    },
    #[error("playback runner has shut down")]
    RunnerClosed,
}
