use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::hotspot::{Hotspot, HotspotDraft};
use crate::model::ids::SlideId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons an authored sequence cannot be played.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequenceError {
    #[error("simulation has no slides")]
    NoSlides,

    #[error("slide {slide} has no sequence items")]
    EmptySlide { slide: SlideId },

    #[error("slide {slide} has no image reference")]
    MissingImageRef { slide: SlideId },

    #[error("slide id {slide} appears more than once")]
    DuplicateSlide { slide: SlideId },

    #[error("message at {at} has no text")]
    EmptyMessage { at: Position },

    #[error("dropdown at {at} has no options")]
    DropdownWithoutOptions { at: Position },

    #[error("hotspot at {at} has an empty or non-finite rectangle")]
    InvalidRect { at: Position },

    #[error("hotspot at {at} has a zero-second timeout")]
    ZeroTimeout { at: Position },
}

//
// ─── POSITION ──────────────────────────────────────────────────────────────────
//

/// Address of one sequence item. Ordered slide-major, so progress comparisons are
/// a single `<`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub slide: usize,
    pub item: usize,
}

impl Position {
    #[must_use]
    pub const fn new(slide: usize, item: usize) -> Self {
        Self { slide, item }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slide, self.item)
    }
}

/// Result of stepping forward from a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Item(Position),
    EndOfSequence,
}

//
// ─── ITEMS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Speaker {
    Customer,
    Trainee,
}

/// One scripted dialogue turn. For trainee turns the text is a hint, not an answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub text: String,
}

impl Message {
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SequenceItem {
    Message(Message),
    Hotspot(Hotspot),
}

impl SequenceItem {
    #[must_use]
    pub fn customer(text: impl Into<String>) -> Self {
        Self::Message(Message::new(Speaker::Customer, text))
    }

    #[must_use]
    pub fn trainee(text: impl Into<String>) -> Self {
        Self::Message(Message::new(Speaker::Trainee, text))
    }

    #[must_use]
    pub fn as_hotspot(&self) -> Option<&Hotspot> {
        match self {
            Self::Hotspot(h) => Some(h),
            Self::Message(_) => None,
        }
    }
}

//
// ─── SLIDES & MODEL ────────────────────────────────────────────────────────────
//

/// Reference to a slide image, resolved by the session gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    id: SlideId,
    image_ref: ImageRef,
    items: Vec<SequenceItem>,
}

impl Slide {
    #[must_use]
    pub fn new(id: SlideId, image_ref: ImageRef, items: Vec<SequenceItem>) -> Self {
        Self {
            id,
            image_ref,
            items,
        }
    }

    #[must_use]
    pub fn id(&self) -> SlideId {
        self.id
    }

    #[must_use]
    pub fn image_ref(&self) -> &ImageRef {
        &self.image_ref
    }

    #[must_use]
    pub fn items(&self) -> &[SequenceItem] {
        &self.items
    }
}

/// Immutable description of a simulation: ordered slides of ordered items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceModel {
    slides: Vec<Slide>,
}

impl SequenceModel {
    /// Build a model from slides.
    ///
    /// # Errors
    ///
    /// Returns `SequenceError::NoSlides` for an empty list, `EmptySlide` when a slide has
    /// no items, and `DuplicateSlide` when two slides share an id.
    pub fn new(slides: Vec<Slide>) -> Result<Self, SequenceError> {
        if slides.is_empty() {
            return Err(SequenceError::NoSlides);
        }
        let mut seen = HashSet::with_capacity(slides.len());
        for slide in &slides {
            if !seen.insert(slide.id) {
                return Err(SequenceError::DuplicateSlide { slide: slide.id });
            }
            if slide.items.is_empty() {
                return Err(SequenceError::EmptySlide { slide: slide.id });
            }
        }
        Ok(Self { slides })
    }

    #[must_use]
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    #[must_use]
    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    /// Position of the first item. Always valid for a constructed model.
    #[must_use]
    pub fn first(&self) -> Position {
        Position::new(0, 0)
    }

    #[must_use]
    pub fn item_at(&self, at: Position) -> Option<&SequenceItem> {
        self.slides.get(at.slide)?.items.get(at.item)
    }

    /// Step forward within the slide, then to the next slide's first item. No wraparound.
    #[must_use]
    pub fn next(&self, at: Position) -> Step {
        let Some(slide) = self.slides.get(at.slide) else {
            return Step::EndOfSequence;
        };
        if at.item + 1 < slide.items.len() {
            return Step::Item(Position::new(at.slide, at.item + 1));
        }
        if at.slide + 1 < self.slides.len() {
            return Step::Item(Position::new(at.slide + 1, 0));
        }
        Step::EndOfSequence
    }

    /// Total number of items across all slides.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.slides.iter().map(|s| s.items.len()).sum()
    }

    /// Zero-based index of `at` in the flattened item list.
    #[must_use]
    pub fn ordinal(&self, at: Position) -> Option<usize> {
        self.item_at(at)?;
        let before: usize = self.slides[..at.slide].iter().map(|s| s.items.len()).sum();
        Some(before + at.item)
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ItemDraft {
    Message(Message),
    Hotspot(HotspotDraft),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideDraft {
    pub id: SlideId,
    pub image_ref: String,
    #[serde(default)]
    pub items: Vec<ItemDraft>,
}

/// Sequence as delivered by a gateway, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDraft {
    #[serde(default)]
    pub slides: Vec<SlideDraft>,
}

impl SequenceDraft {
    /// Validate the draft into a playable model.
    ///
    /// # Errors
    ///
    /// Returns the first `SequenceError` encountered, in slide/item order.
    pub fn validate(self) -> Result<SequenceModel, SequenceError> {
        if self.slides.is_empty() {
            return Err(SequenceError::NoSlides);
        }

        let mut slides = Vec::with_capacity(self.slides.len());
        for (slide_index, draft) in self.slides.into_iter().enumerate() {
            if draft.image_ref.trim().is_empty() {
                return Err(SequenceError::MissingImageRef { slide: draft.id });
            }
            let mut items = Vec::with_capacity(draft.items.len());
            for (item_index, item) in draft.items.into_iter().enumerate() {
                let at = Position::new(slide_index, item_index);
                let item = match item {
                    ItemDraft::Message(message) => {
                        if message.text.trim().is_empty() {
                            return Err(SequenceError::EmptyMessage { at });
                        }
                        SequenceItem::Message(message)
                    }
                    ItemDraft::Hotspot(hotspot) => SequenceItem::Hotspot(hotspot.validate(at)?),
                };
                items.push(item);
            }
            slides.push(Slide::new(draft.id, ImageRef::new(draft.image_ref), items));
        }

        SequenceModel::new(slides)
    }
}
