use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use sim_core::model::{
    PASS_METRIC, Response, SequenceDraft, SequenceItem, SequenceModel, SessionId, SessionResult,
    SimulationId, Speaker,
};

use crate::assets::SessionAssets;
use crate::error::{SessionEndError, SessionStartError};
use crate::session::{EndRequest, SessionGateway, StartRequest, StartedSession};

/// Metric reporting how much of the sequence the trainee reached.
pub const COMPLETION_METRIC: &str = "Completion";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioFile {
    #[serde(default)]
    simulation_id: Option<SimulationId>,
    #[serde(flatten)]
    sequence: SequenceDraft,
}

/// Offline gateway that plays a scenario file from disk and scores it locally.
///
/// Slide images are resolved relative to the scenario file's directory. A session is
/// forgotten once it has been scored; sessions that are never ended live as long as the
/// gateway.
#[derive(Clone)]
pub struct FileSessionGateway {
    path: PathBuf,
    started: Arc<Mutex<HashMap<SessionId, SequenceModel>>>,
}

impl FileSessionGateway {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            started: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_assets(&self, model: &SequenceModel) -> Result<SessionAssets, SessionStartError> {
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut assets = SessionAssets::new();
        for slide in model.slides() {
            let image = base.join(slide.image_ref().as_str());
            match tokio::fs::read(&image).await {
                Ok(bytes) => assets.insert(slide.id(), bytes),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SessionStartError::MissingAsset {
                        slide: slide.id(),
                        image_ref: slide.image_ref().clone(),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(assets)
    }
}

#[async_trait]
impl SessionGateway for FileSessionGateway {
    async fn start(&self, request: &StartRequest) -> Result<StartedSession, SessionStartError> {
        debug!(path = %self.path.display(), "loading scenario");
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let scenario: ScenarioFile =
            serde_json::from_str(&raw).map_err(|e| SessionStartError::Decode(e.to_string()))?;
        if let Some(id) = scenario.simulation_id {
            if id != request.simulation_id {
                return Err(SessionStartError::NotFound(request.simulation_id));
            }
        }

        let model = scenario.sequence.validate()?;
        let assets = self.load_assets(&model).await?;
        let session_id = SessionId::random();
        self.started
            .lock()
            .map_err(|e| SessionStartError::Unavailable(e.to_string()))?
            .insert(session_id, model.clone());
        info!(session = %session_id, items = model.item_count(), "scenario loaded");

        Ok(StartedSession {
            session_id,
            model,
            assets,
        })
    }

    async fn end(&self, request: &EndRequest) -> Result<SessionResult, SessionEndError> {
        let model = self
            .started
            .lock()
            .map_err(|e| SessionEndError::Unavailable(e.to_string()))?
            .remove(&request.session_id)
            .ok_or(SessionEndError::UnknownSession(request.session_id))?;

        match SessionResult::new(score_locally(&model, request), request.duration_seconds) {
            Ok(result) => {
                info!(session = %request.session_id, passed = result.passed(), "scenario scored");
                Ok(result)
            }
            Err(err) => {
                if let Ok(mut started) = self.started.lock() {
                    started.insert(request.session_id, model);
                }
                Err(err.into())
            }
        }
    }
}

/// Offline stand-in for the remote scorer.
///
/// `Sim Accuracy` is the share of scripted trainee lines answered with the scripted
/// text (case and whitespace insensitive); `Completion` is the share of items reached.
#[must_use]
pub fn score_locally(model: &SequenceModel, request: &EndRequest) -> BTreeMap<String, f64> {
    let mut scripted = 0_u32;
    let mut matched = 0_u32;
    for (slide_index, slide) in model.slides().iter().enumerate() {
        for (item_index, item) in slide.items().iter().enumerate() {
            let SequenceItem::Message(message) = item else {
                continue;
            };
            if message.speaker != Speaker::Trainee {
                continue;
            }
            scripted += 1;
            let answered = request.transcript.iter().any(|entry| {
                entry.at.slide == slide_index
                    && entry.at.item == item_index
                    && matches!(&entry.response, Response::Submitted(text) if normalize(text) == normalize(&message.text))
            });
            if answered {
                matched += 1;
            }
        }
    }

    let accuracy = if scripted == 0 {
        100.0
    } else {
        f64::from(matched) * 100.0 / f64::from(scripted)
    };
    let total = model.item_count().max(1);
    let reached = request.reached_items.min(total);
    #[allow(clippy::cast_precision_loss)]
    let completion = reached as f64 * 100.0 / total as f64;

    let mut scores = BTreeMap::new();
    scores.insert(PASS_METRIC.to_string(), accuracy);
    scores.insert(COMPLETION_METRIC.to_string(), completion);
    scores
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
