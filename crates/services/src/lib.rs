#![forbid(unsafe_code)]

pub mod error;
pub mod playback;

pub use sim_core::Clock;

pub use error::PlaybackError;
pub use playback::{
    InteractionOutcome, PlaybackConfig, PlaybackController, PlaybackEvent, PlaybackHandle,
    PlaybackRunner, PlaybackSnapshot, PlaybackState, PlaybackStatus,
};
