use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use sim_core::model::{PASS_METRIC, SequenceModel, SessionId, SessionResult, SimulationId};

use crate::assets::SessionAssets;
use crate::error::{SessionEndError, SessionStartError};
use crate::session::{EndRequest, SessionGateway, StartRequest, StartedSession};

#[derive(Default)]
struct MemoryState {
    simulations: HashMap<SimulationId, (SequenceModel, SessionAssets)>,
    scores: BTreeMap<String, f64>,
    start_failures: VecDeque<String>,
    end_failures: VecDeque<String>,
    end_latency: Option<Duration>,
    start_calls: usize,
    end_calls: usize,
    end_requests: Vec<EndRequest>,
}

/// Scripted in-memory gateway for tests and prototyping.
///
/// Counts every call so tests can assert how often the engine reached the backend.
#[derive(Clone, Default)]
pub struct InMemorySessionGateway {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemorySessionGateway {
    #[must_use]
    pub fn new() -> Self {
        let gateway = Self::default();
        if let Ok(mut state) = gateway.state.lock() {
            state.scores.insert(PASS_METRIC.to_string(), 100.0);
        }
        gateway
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, String> {
        self.state.lock().map_err(|e| e.to_string())
    }

    /// Register a playable simulation.
    #[must_use]
    pub fn with_simulation(
        self,
        id: SimulationId,
        model: SequenceModel,
        assets: SessionAssets,
    ) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.simulations.insert(id, (model, assets));
        }
        self
    }

    /// Scores returned by every successful `end`.
    #[must_use]
    pub fn with_scores(self, scores: BTreeMap<String, f64>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.scores = scores;
        }
        self
    }

    /// Delay applied to every `end` call before it answers.
    #[must_use]
    pub fn with_end_latency(self, latency: Duration) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.end_latency = Some(latency);
        }
        self
    }

    /// Make the next `start` fail with a transport error.
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.start_failures.push_back(reason.into());
        }
    }

    /// Make the next `end` fail with a transport error.
    pub fn fail_next_end(&self, reason: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.end_failures.push_back(reason.into());
        }
    }

    #[must_use]
    pub fn start_calls(&self) -> usize {
        self.lock().map_or(0, |s| s.start_calls)
    }

    #[must_use]
    pub fn end_calls(&self) -> usize {
        self.lock().map_or(0, |s| s.end_calls)
    }

    #[must_use]
    pub fn end_requests(&self) -> Vec<EndRequest> {
        self.lock().map(|s| s.end_requests.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SessionGateway for InMemorySessionGateway {
    async fn start(&self, request: &StartRequest) -> Result<StartedSession, SessionStartError> {
        let mut state = self.lock().map_err(SessionStartError::Unavailable)?;
        state.start_calls += 1;
        if let Some(reason) = state.start_failures.pop_front() {
            return Err(SessionStartError::Unavailable(reason));
        }
        let (model, assets) = state
            .simulations
            .get(&request.simulation_id)
            .cloned()
            .ok_or(SessionStartError::NotFound(request.simulation_id))?;

        Ok(StartedSession {
            session_id: SessionId::random(),
            model,
            assets,
        })
    }

    async fn end(&self, request: &EndRequest) -> Result<SessionResult, SessionEndError> {
        let latency = {
            let mut state = self.lock().map_err(SessionEndError::Unavailable)?;
            state.end_calls += 1;
            state.end_requests.push(request.clone());
            state.end_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock().map_err(SessionEndError::Unavailable)?;
        if let Some(reason) = state.end_failures.pop_front() {
            return Err(SessionEndError::Unavailable(reason));
        }
        Ok(SessionResult::new(
            state.scores.clone(),
            request.duration_seconds,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::model::{ImageRef, SequenceItem, Slide, SlideId};

    fn model() -> SequenceModel {
        SequenceModel::new(vec![Slide::new(
            SlideId::new(1),
            ImageRef::new("a.png"),
            vec![SequenceItem::customer("Hi")],
        )])
        .unwrap()
    }

    fn end_request(session_id: SessionId) -> EndRequest {
        EndRequest {
            session_id,
            simulation_id: SimulationId::new(1),
            duration_seconds: 12,
            reached_items: 1,
            transcript: Vec::new(),
        }
    }

    #[tokio::test]
    async fn start_returns_registered_simulation() {
        let gateway = InMemorySessionGateway::new().with_simulation(
            SimulationId::new(1),
            model(),
            SessionAssets::new().with_image(SlideId::new(1), vec![1_u8]),
        );
        let started = gateway
            .start(&StartRequest::new(SimulationId::new(1)))
            .await
            .unwrap();
        assert_eq!(started.model.item_count(), 1);
        assert!(started.assets.contains(SlideId::new(1)));
        assert_eq!(gateway.start_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_simulation_is_not_found() {
        let gateway = InMemorySessionGateway::new();
        let err = gateway
            .start(&StartRequest::new(SimulationId::new(9)))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionStartError::NotFound(id) if id == SimulationId::new(9)));
    }

    #[tokio::test]
    async fn scripted_end_failure_is_consumed_once() {
        let gateway = InMemorySessionGateway::new();
        gateway.fail_next_end("scorer offline");
        let request = end_request(SessionId::random());

        assert!(gateway.end(&request).await.is_err());
        let result = gateway.end(&request).await.unwrap();
        assert!(result.passed());
        assert_eq!(result.duration_seconds(), 12);
        assert_eq!(gateway.end_calls(), 2);
    }
}
