use std::collections::BTreeMap;
use std::env;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use sim_core::model::{
    SequenceDraft, SessionId, SessionResult, SimulationId, TranscriptEntry,
};

use crate::assets::SessionAssets;
use crate::error::{GatewayConfigError, SessionEndError, SessionStartError};
use crate::session::{EndRequest, SessionGateway, StartRequest, StartedSession};

#[derive(Clone, Debug)]
pub struct HttpGatewayConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
}

impl HttpGatewayConfig {
    /// # Errors
    ///
    /// Returns `GatewayConfigError` if `base_url` does not parse or cannot take path segments.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, GatewayConfigError> {
        let base_url = Url::parse(base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayConfigError::NotABase(base_url.to_string()));
        }
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Ok(Self { base_url, api_key })
    }

    /// Reads `SIM_GATEWAY_URL` and `SIM_API_KEY`. Returns `Ok(None)` when no URL is set.
    ///
    /// # Errors
    ///
    /// Returns `GatewayConfigError` if the URL is set but invalid.
    pub fn from_env() -> Result<Option<Self>, GatewayConfigError> {
        let Ok(base_url) = env::var("SIM_GATEWAY_URL") else {
            return Ok(None);
        };
        if base_url.trim().is_empty() {
            return Ok(None);
        }
        Self::new(&base_url, env::var("SIM_API_KEY").ok()).map(Some)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Session gateway backed by the remote simulation API.
#[derive(Clone)]
pub struct HttpSessionGateway {
    client: Client,
    config: HttpGatewayConfig,
}

impl HttpSessionGateway {
    #[must_use]
    pub fn new(config: HttpGatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &HttpGatewayConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn fetch_assets(
        &self,
        sequence: &sim_core::model::SequenceModel,
    ) -> Result<SessionAssets, SessionStartError> {
        let mut assets = SessionAssets::new();
        for slide in sequence.slides() {
            let url = self.config.endpoint(&["assets", slide.image_ref().as_str()]);
            let response = self.authorize(self.client.get(url)).send().await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(SessionStartError::MissingAsset {
                    slide: slide.id(),
                    image_ref: slide.image_ref().clone(),
                });
            }
            let response = ensure_success(response).map_err(SessionStartError::Status)?;
            let bytes = response.bytes().await?;
            assets.insert(slide.id(), bytes.to_vec());
        }
        Ok(assets)
    }
}

#[async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn start(&self, request: &StartRequest) -> Result<StartedSession, SessionStartError> {
        let url = self.config.endpoint(&["sessions"]);
        debug!(%url, simulation = %request.simulation_id, "starting session");

        let response = self
            .authorize(self.client.post(url))
            .json(&StartBody {
                simulation_id: request.simulation_id,
            })
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SessionStartError::NotFound(request.simulation_id));
        }
        let response = ensure_success(response).map_err(SessionStartError::Status)?;
        let body: StartResponse = response
            .json()
            .await
            .map_err(|e| SessionStartError::Decode(e.to_string()))?;

        let model = body.sequence.validate()?;
        let assets = self.fetch_assets(&model).await?;
        info!(
            session = %body.session_id,
            slides = model.slides().len(),
            asset_bytes = assets.total_bytes(),
            "session started"
        );

        Ok(StartedSession {
            session_id: body.session_id,
            model,
            assets,
        })
    }

    async fn end(&self, request: &EndRequest) -> Result<SessionResult, SessionEndError> {
        let session = request.session_id.to_string();
        let url = self.config.endpoint(&["sessions", session.as_str(), "end"]);
        debug!(%url, "ending session");

        let response = self
            .authorize(self.client.post(url))
            .json(&EndBody {
                simulation_id: request.simulation_id,
                duration_seconds: request.duration_seconds,
                reached_items: request.reached_items,
                transcript: &request.transcript,
            })
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SessionEndError::UnknownSession(request.session_id));
        }
        let response = ensure_success(response).map_err(SessionEndError::Status)?;
        let body: EndResponse = response
            .json()
            .await
            .map_err(|e| SessionEndError::Decode(e.to_string()))?;

        Ok(SessionResult::new(body.scores, body.duration_seconds)?)
    }
}

fn ensure_success(response: Response) -> Result<Response, u16> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status.as_u16())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBody {
    simulation_id: SimulationId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    session_id: SessionId,
    sequence: SequenceDraft,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EndBody<'a> {
    simulation_id: SimulationId,
    duration_seconds: u64,
    reached_items: usize,
    transcript: &'a [TranscriptEntry],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndResponse {
    scores: BTreeMap<String, f64>,
    duration_seconds: u64,
}
