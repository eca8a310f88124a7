use serde::{Deserialize, Serialize};

use crate::model::sequence::{Position, SequenceError};

//
// ─── GEOMETRY ──────────────────────────────────────────────────────────────────
//

/// Rectangle a hotspot occupies on its slide image, in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    #[must_use]
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    fn is_valid(&self) -> bool {
        [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite()) && self.w > 0.0 && self.h > 0.0
    }
}

//
// ─── KINDS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HotspotKind {
    Button,
    Dropdown,
    Checkbox,
    TextField,
    Highlight,
    CoachingTip,
}

impl HotspotKind {
    /// Kinds that only make sense after an explicit click or selection.
    ///
    /// A timeout configured on one of these is never honored.
    #[must_use]
    pub fn requires_explicit_interaction(self) -> bool {
        matches!(self, Self::Button | Self::Dropdown | Self::Checkbox)
    }
}

/// Per-kind hotspot behavior, carrying only the fields each kind uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HotspotWidget {
    Button {
        label: Option<String>,
    },
    Dropdown {
        label: Option<String>,
        options: Vec<String>,
        advance_on_select: bool,
    },
    Checkbox {
        label: Option<String>,
    },
    TextField {
        placeholder: Option<String>,
        timeout_secs: Option<u32>,
    },
    Highlight {
        label: Option<String>,
        timeout_secs: Option<u32>,
    },
    CoachingTip {
        label: Option<String>,
        timeout_secs: Option<u32>,
    },
}

impl HotspotWidget {
    #[must_use]
    pub fn kind(&self) -> HotspotKind {
        match self {
            Self::Button { .. } => HotspotKind::Button,
            Self::Dropdown { .. } => HotspotKind::Dropdown,
            Self::Checkbox { .. } => HotspotKind::Checkbox,
            Self::TextField { .. } => HotspotKind::TextField,
            Self::Highlight { .. } => HotspotKind::Highlight,
            Self::CoachingTip { .. } => HotspotKind::CoachingTip,
        }
    }

    /// Auto-advance timeout, if this kind carries one.
    #[must_use]
    pub fn timeout_secs(&self) -> Option<u32> {
        match self {
            Self::TextField { timeout_secs, .. }
            | Self::Highlight { timeout_secs, .. }
            | Self::CoachingTip { timeout_secs, .. } => *timeout_secs,
            Self::Button { .. } | Self::Dropdown { .. } | Self::Checkbox { .. } => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Button { label }
            | Self::Dropdown { label, .. }
            | Self::Checkbox { label }
            | Self::Highlight { label, .. }
            | Self::CoachingTip { label, .. } => label.as_deref(),
            Self::TextField { placeholder, .. } => placeholder.as_deref(),
        }
    }
}

/// A validated interactive region on a slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub rect: Rect,
    #[serde(flatten)]
    pub widget: HotspotWidget,
}

impl Hotspot {
    #[must_use]
    pub fn new(rect: Rect, widget: HotspotWidget) -> Self {
        Self { rect, widget }
    }

    #[must_use]
    pub fn kind(&self) -> HotspotKind {
        self.widget.kind()
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Loosely-shaped hotspot settings as authored. Fields a kind does not use are dropped
/// during validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotspotSettingsDraft {
    pub timeout_seconds: Option<u32>,
    pub advance_on_select: Option<bool>,
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotDraft {
    pub kind: HotspotKind,
    pub rect: Rect,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub settings: HotspotSettingsDraft,
}

impl HotspotDraft {
    pub(crate) fn validate(self, at: Position) -> Result<Hotspot, SequenceError> {
        if !self.rect.is_valid() {
            return Err(SequenceError::InvalidRect { at });
        }
        if self.settings.timeout_seconds == Some(0) {
            return Err(SequenceError::ZeroTimeout { at });
        }

        let label = self.label.filter(|l| !l.trim().is_empty());
        let timeout_secs = self.settings.timeout_seconds;
        let widget = match self.kind {
            HotspotKind::Button => HotspotWidget::Button { label },
            HotspotKind::Dropdown => {
                let options: Vec<String> = self
                    .options
                    .into_iter()
                    .filter(|o| !o.trim().is_empty())
                    .collect();
                if options.is_empty() {
                    return Err(SequenceError::DropdownWithoutOptions { at });
                }
                HotspotWidget::Dropdown {
                    label,
                    options,
                    advance_on_select: self.settings.advance_on_select.unwrap_or(false),
                }
            }
            HotspotKind::Checkbox => HotspotWidget::Checkbox { label },
            HotspotKind::TextField => HotspotWidget::TextField {
                placeholder: self.settings.placeholder.or(label),
                timeout_secs,
            },
            HotspotKind::Highlight => HotspotWidget::Highlight {
                label,
                timeout_secs,
            },
            HotspotKind::CoachingTip => HotspotWidget::CoachingTip {
                label,
                timeout_secs,
            },
        };

        Ok(Hotspot::new(self.rect, widget))
    }
}
