use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Metric that decides pass/fail.
pub const PASS_METRIC: &str = "Sim Accuracy";

/// Inclusive lower bound on `PASS_METRIC` for a passing session.
pub const PASS_THRESHOLD: f64 = 85.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionResultError {
    #[error("score for {metric} is not a finite number")]
    NonFiniteScore { metric: String },
}

/// Scores and duration returned by the scorer when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    scores: BTreeMap<String, f64>,
    duration_seconds: u64,
}

impl SessionResult {
    /// # Errors
    ///
    /// Returns `SessionResultError::NonFiniteScore` if any score is NaN or infinite.
    pub fn new(
        scores: BTreeMap<String, f64>,
        duration_seconds: u64,
    ) -> Result<Self, SessionResultError> {
        if let Some((metric, _)) = scores.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SessionResultError::NonFiniteScore {
                metric: metric.clone(),
            });
        }
        Ok(Self {
            scores,
            duration_seconds,
        })
    }

    #[must_use]
    pub fn scores(&self) -> &BTreeMap<String, f64> {
        &self.scores
    }

    #[must_use]
    pub fn score(&self, metric: &str) -> Option<f64> {
        self.scores.get(metric).copied()
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// A session passes iff its `Sim Accuracy` is at least 85. A missing metric fails.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.score(PASS_METRIC)
            .is_some_and(|accuracy| accuracy >= PASS_THRESHOLD)
    }
}
