mod hotspot;
mod ids;
mod result;
mod sequence;
mod transcript;

pub use hotspot::{Hotspot, HotspotDraft, HotspotKind, HotspotSettingsDraft, HotspotWidget, Rect};
pub use ids::{ParseIdError, SessionId, SimulationId, SlideId};
pub use result::{PASS_METRIC, PASS_THRESHOLD, SessionResult, SessionResultError};
pub use sequence::{
    ImageRef, ItemDraft, Message, Position, SequenceDraft, SequenceError, SequenceItem,
    SequenceModel, Slide, SlideDraft, Speaker, Step,
};
pub use transcript::{Response, TranscriptEntry};
