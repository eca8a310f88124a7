use serde::{Deserialize, Serialize};

use crate::model::Position;

/// What the trainee supplied at an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Response {
    Submitted(String),
    Selected(String),
}

/// One trainee response, in the order it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub at: Position,
    pub elapsed_seconds: u64,
    pub response: Response,
}

impl TranscriptEntry {
    #[must_use]
    pub fn new(at: Position, elapsed_seconds: u64, response: Response) -> Self {
        Self {
            at,
            elapsed_seconds,
            response,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match &self.response {
            Response::Submitted(text) | Response::Selected(text) => text,
        }
    }
}
