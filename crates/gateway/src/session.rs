use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sim_core::model::{SequenceModel, SessionId, SessionResult, SimulationId, TranscriptEntry};

use crate::assets::SessionAssets;
use crate::error::{SessionEndError, SessionStartError};

/// Identifies the simulation a trainee is about to attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub simulation_id: SimulationId,
}

impl StartRequest {
    #[must_use]
    pub fn new(simulation_id: SimulationId) -> Self {
        Self { simulation_id }
    }
}

/// Everything a session needs to play: its id, the validated model, and slide images.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session_id: SessionId,
    pub model: SequenceModel,
    pub assets: SessionAssets,
}

/// What the scorer receives when a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndRequest {
    pub session_id: SessionId,
    pub simulation_id: SimulationId,
    pub duration_seconds: u64,
    /// Items entered so far, counting the current one.
    pub reached_items: usize,
    pub transcript: Vec<TranscriptEntry>,
}

/// Boundary to the backend that starts and scores sessions.
///
/// Implementations must tolerate `end` being called more than once for the same
/// session; the playback engine suppresses redundant concurrent calls itself.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Start a session and fetch everything needed to play it.
    ///
    /// # Errors
    ///
    /// Returns `SessionStartError` on transport failure, a malformed sequence, or a
    /// missing slide asset.
    async fn start(&self, request: &StartRequest) -> Result<StartedSession, SessionStartError>;

    /// End a session and return its scores.
    ///
    /// # Errors
    ///
    /// Returns `SessionEndError` if the scorer cannot be reached or rejects the session.
    async fn end(&self, request: &EndRequest) -> Result<SessionResult, SessionEndError>;
}
