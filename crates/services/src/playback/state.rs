use serde::Serialize;
use std::fmt;

use gateway::SessionStartError;
use sim_core::model::{Position, SequenceItem, SessionId, SessionResult, SlideId};
use sim_core::policy::InteractionState;

use super::progress::PlaybackProgress;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    #[default]
    NotStarted,
    Loading,
    Playing,
    Paused,
    Completed,
    Errored,
}

impl PlaybackStatus {
    /// Playing or paused: a current item exists.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Errored => "errored",
        };
        f.write_str(label)
    }
}

//
// ─── FAILURES ──────────────────────────────────────────────────────────────────
//

/// Which operation put playback into `Errored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FailedOperation {
    StartSession,
    MalformedSequence,
    LoadSlideAsset { slide: SlideId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackFailure {
    #[serde(flatten)]
    pub operation: FailedOperation,
    pub message: String,
}

impl PlaybackFailure {
    #[must_use]
    pub fn from_start_error(err: &SessionStartError) -> Self {
        let operation = match err {
            SessionStartError::Malformed(_) => FailedOperation::MalformedSequence,
            SessionStartError::MissingAsset { slide, .. } => {
                FailedOperation::LoadSlideAsset { slide: *slide }
            }
            _ => FailedOperation::StartSession,
        };
        Self {
            operation,
            message: err.to_string(),
        }
    }
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Mutable playback state, owned by `PlaybackController`. Everyone else sees copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub position: Position,
    pub elapsed_seconds: u64,
    pub awaiting_input: bool,
    /// Set while an advance is in flight for the current item.
    pub processing_guard: bool,
    pub pending_interaction: InteractionState,
    /// The last item has been completed. Distinct from `Completed`.
    pub end_of_content: bool,
    /// Set while an end call is outstanding.
    pub ending: bool,
    pub failure: Option<PlaybackFailure>,
}

/// Read-only copy of playback for views.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub session_id: Option<SessionId>,
    pub slide_id: Option<SlideId>,
    pub current_item: Option<SequenceItem>,
    pub progress: PlaybackProgress,
    pub result: Option<SessionResult>,
    pub passed: Option<bool>,
}

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlaybackEvent {
    Started { session_id: SessionId },
    ItemEntered { at: Position },
    Advanced { from: Position, to: Position },
    Tick { elapsed_seconds: u64 },
    Paused,
    Resumed,
    EndOfContent,
    EndFailed { message: String },
    Completed { passed: bool },
    Errored { failure: PlaybackFailure },
    Restarted,
}

//
// ─── INTERACTION OUTCOMES ──────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotPlaying,
    Stale,
    AdvanceInFlight,
    EndOfContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    Ignored(IgnoreReason),
    Applied {
        action: sim_core::policy::Action,
        advanced: bool,
    },
}

impl InteractionOutcome {
    #[must_use]
    pub fn advanced(&self) -> bool {
        matches!(self, Self::Applied { advanced: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::model::SequenceError;

    #[test]
    fn malformed_start_maps_to_malformed_operation() {
        let failure =
            PlaybackFailure::from_start_error(&SessionStartError::Malformed(SequenceError::NoSlides));
        assert_eq!(failure.operation, FailedOperation::MalformedSequence);
        assert_eq!(failure.message, "malformed sequence: simulation has no slides");
    }

    #[test]
    fn failure_serializes_operation_inline() {
        let failure = PlaybackFailure {
            operation: FailedOperation::LoadSlideAsset {
                slide: SlideId::new(4),
            },
            message: "gone".into(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["operation"], "loadSlideAsset");
        assert_eq!(json["slide"], 4);
    }
}
