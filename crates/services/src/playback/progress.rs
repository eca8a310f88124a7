use serde::Serialize;

/// Aggregated view of how far through the sequence playback is, useful for UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackProgress {
    pub reached: usize,
    pub total: usize,
    pub end_of_content: bool,
}
