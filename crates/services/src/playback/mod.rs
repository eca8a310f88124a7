mod controller;
mod progress;
mod runner;
mod state;

// Public API of the playback subsystem.
pub use crate::error::PlaybackError;
pub use controller::PlaybackController;
pub use progress::PlaybackProgress;
pub use runner::{PlaybackConfig, PlaybackHandle, PlaybackRunner};
pub use state::{
    FailedOperation, IgnoreReason, InteractionOutcome, PlaybackEvent, PlaybackFailure,
    PlaybackSnapshot, PlaybackState, PlaybackStatus,
};
