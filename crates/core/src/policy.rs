//! Completion rules for sequence items.
//!
//! [`decide`] is a pure function of the current item, its transient interaction state
//! and a trigger (entering the item, or a trainee interaction). It never touches time
//! or playback state; the controller executes whatever [`Action`] it returns.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::{HotspotKind, HotspotWidget, Position, SequenceItem, Speaker};

/// Pause after a customer line before the next item, so the line can be read.
pub const MESSAGE_ADVANCE_DELAY: Duration = Duration::from_millis(800);

/// Pause after ticking a checkbox so the checked state is visible before advancing.
pub const CHECKBOX_ADVANCE_DELAY: Duration = Duration::from_millis(800);

/// Trainee interaction with the current item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum InteractionKind {
    Click,
    Select(String),
    Submit(String),
    Toggle,
}

/// Interaction event posted by the view, addressed to the item it was rendered for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub item: Position,
    pub kind: InteractionKind,
}

impl Interaction {
    #[must_use]
    pub fn new(item: Position, kind: InteractionKind) -> Self {
        Self { item, kind }
    }
}

/// Transient per-item UI state. Reset on every item entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InteractionState {
    #[default]
    Idle,
    TipShown,
    Dropdown {
        open: bool,
        selected: Option<String>,
    },
    Checked,
    Submitted {
        text: String,
    },
}

impl InteractionState {
    /// State for a freshly entered item. Coaching tips are shown without a reveal step.
    #[must_use]
    pub fn entered(item: &SequenceItem) -> Self {
        match item.as_hotspot().map(|h| h.kind()) {
            Some(HotspotKind::CoachingTip) => Self::TipShown,
            _ => Self::Idle,
        }
    }

    #[must_use]
    pub fn selection(&self) -> Option<&str> {
        match self {
            Self::Dropdown { selected, .. } => selected.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Dropdown { open: true, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger<'a> {
    Entered,
    Interaction(&'a InteractionKind),
}

/// What the controller should do in response to a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AdvanceNow,
    AdvanceAfterDelay(Duration),
    AutoAdvanceAfterTimeout(Duration),
    ToggleOpen,
    /// Record a dropdown selection; advance only when the hotspot is configured to.
    AdvanceIfConfigured { option: String, advance: bool },
    WaitForExactInput,
    AwaitInteraction,
    Ignore,
}

impl Action {
    /// True when executing this action moves to the next item immediately.
    #[must_use]
    pub fn advances_now(&self) -> bool {
        matches!(
            self,
            Self::AdvanceNow | Self::AdvanceIfConfigured { advance: true, .. }
        )
    }

    /// True when the item is waiting on the trainee after this action.
    #[must_use]
    pub fn awaits_input(&self) -> bool {
        matches!(
            self,
            Self::WaitForExactInput
                | Self::AwaitInteraction
                | Self::ToggleOpen
                | Self::AdvanceIfConfigured { advance: false, .. }
                | Self::AutoAdvanceAfterTimeout(_)
        )
    }
}

/// Map an item, its interaction state and a trigger to an action.
#[must_use]
pub fn decide(item: &SequenceItem, state: &InteractionState, trigger: Trigger<'_>) -> Action {
    match (item, trigger) {
        (SequenceItem::Message(message), Trigger::Entered) => match message.speaker {
            Speaker::Customer => Action::AdvanceAfterDelay(MESSAGE_ADVANCE_DELAY),
            Speaker::Trainee => Action::WaitForExactInput,
        },
        (SequenceItem::Message(message), Trigger::Interaction(event)) => {
            match (message.speaker, event) {
                (Speaker::Trainee, InteractionKind::Submit(text)) if !text.trim().is_empty() => {
                    Action::AdvanceNow
                }
                (Speaker::Trainee, InteractionKind::Submit(_)) => Action::WaitForExactInput,
                _ => Action::Ignore,
            }
        }
        (SequenceItem::Hotspot(hotspot), Trigger::Entered) => on_enter(&hotspot.widget),
        (SequenceItem::Hotspot(hotspot), Trigger::Interaction(event)) => {
            on_interaction(&hotspot.widget, state, event)
        }
    }
}

fn on_enter(widget: &HotspotWidget) -> Action {
    let kind = widget.kind();
    if !kind.requires_explicit_interaction() {
        if let Some(secs) = widget.timeout_secs() {
            return Action::AutoAdvanceAfterTimeout(Duration::from_secs(u64::from(secs)));
        }
    }
    match kind {
        HotspotKind::TextField => Action::WaitForExactInput,
        _ => Action::AwaitInteraction,
    }
}

fn on_interaction(
    widget: &HotspotWidget,
    state: &InteractionState,
    event: &InteractionKind,
) -> Action {
    use InteractionKind::{Click, Select, Submit, Toggle};

    match (widget, event) {
        (HotspotWidget::Button { .. } | HotspotWidget::Highlight { .. }, Click) => {
            Action::AdvanceNow
        }
        (HotspotWidget::CoachingTip { .. }, Click | Toggle) => Action::AdvanceNow,
        (HotspotWidget::Checkbox { .. }, Click | Toggle) => {
            if *state == InteractionState::Checked {
                Action::Ignore
            } else {
                Action::AdvanceAfterDelay(CHECKBOX_ADVANCE_DELAY)
            }
        }
        (HotspotWidget::Dropdown { .. }, Click | Toggle) => Action::ToggleOpen,
        (
            HotspotWidget::Dropdown {
                options,
                advance_on_select,
                ..
            },
            Select(option),
        ) => {
            if options.iter().any(|o| o == option) {
                Action::AdvanceIfConfigured {
                    option: option.clone(),
                    advance: *advance_on_select,
                }
            } else {
                Action::Ignore
            }
        }
        (HotspotWidget::Dropdown { .. }, Submit(_)) => {
            if state.selection().is_some() {
                Action::AdvanceNow
            } else {
                Action::Ignore
            }
        }
        (HotspotWidget::TextField { .. }, Submit(_)) => Action::AdvanceNow,
        (HotspotWidget::TextField { .. }, Click) => Action::WaitForExactInput,
        _ => Action::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Hotspot, Rect};

    fn hotspot(widget: HotspotWidget) -> SequenceItem {
        SequenceItem::Hotspot(Hotspot::new(Rect::new(0.0, 0.0, 10.0, 10.0), widget))
    }

    fn dropdown(advance_on_select: bool) -> SequenceItem {
        hotspot(HotspotWidget::Dropdown {
            label: None,
            options: vec!["A".into(), "B".into()],
            advance_on_select,
        })
    }

    fn interact(item: &SequenceItem, state: &InteractionState, event: InteractionKind) -> Action {
        decide(item, state, Trigger::Interaction(&event))
    }

    #[test]
    fn customer_message_advances_after_delay() {
        let item = SequenceItem::customer("Hi");
        assert_eq!(
            decide(&item, &InteractionState::Idle, Trigger::Entered),
            Action::AdvanceAfterDelay(MESSAGE_ADVANCE_DELAY)
        );
    }

    #[test]
    fn trainee_message_accepts_any_non_empty_text() {
        let item = SequenceItem::trainee("Thanks for calling");
        let state = InteractionState::Idle;
        assert_eq!(
            decide(&item, &state, Trigger::Entered),
            Action::WaitForExactInput
        );
        assert_eq!(
            interact(&item, &state, InteractionKind::Submit("something else".into())),
            Action::AdvanceNow
        );
        assert_eq!(
            interact(&item, &state, InteractionKind::Submit("   ".into())),
            Action::WaitForExactInput
        );
        assert_eq!(interact(&item, &state, InteractionKind::Click), Action::Ignore);
    }

    #[test]
    fn button_click_advances_now() {
        let item = hotspot(HotspotWidget::Button { label: None });
        assert_eq!(
            interact(&item, &InteractionState::Idle, InteractionKind::Click),
            Action::AdvanceNow
        );
    }

    #[test]
    fn explicit_kinds_never_auto_advance() {
        for widget in [
            HotspotWidget::Button { label: None },
            HotspotWidget::Checkbox { label: None },
            HotspotWidget::Dropdown {
                label: None,
                options: vec!["A".into()],
                advance_on_select: true,
            },
        ] {
            let item = hotspot(widget);
            assert_eq!(
                decide(&item, &InteractionState::Idle, Trigger::Entered),
                Action::AwaitInteraction
            );
        }
    }

    #[test]
    fn highlight_with_timeout_auto_advances() {
        let item = hotspot(HotspotWidget::Highlight {
            label: None,
            timeout_secs: Some(4),
        });
        assert_eq!(
            decide(&item, &InteractionState::Idle, Trigger::Entered),
            Action::AutoAdvanceAfterTimeout(Duration::from_secs(4))
        );
    }

    #[test]
    fn checkbox_click_advances_after_delay_once() {
        let item = hotspot(HotspotWidget::Checkbox { label: None });
        assert_eq!(
            interact(&item, &InteractionState::Idle, InteractionKind::Click),
            Action::AdvanceAfterDelay(CHECKBOX_ADVANCE_DELAY)
        );
        assert_eq!(
            interact(&item, &InteractionState::Checked, InteractionKind::Click),
            Action::Ignore
        );
    }

    #[test]
    fn dropdown_click_toggles_without_advancing() {
        let item = dropdown(true);
        let action = interact(&item, &InteractionState::Idle, InteractionKind::Click);
        assert_eq!(action, Action::ToggleOpen);
        assert!(!action.advances_now());
    }

    #[test]
    fn dropdown_select_respects_advance_on_select() {
        let held = interact(
            &dropdown(false),
            &InteractionState::Idle,
            InteractionKind::Select("A".into()),
        );
        assert!(!held.advances_now());

        let advanced = interact(
            &dropdown(true),
            &InteractionState::Idle,
            InteractionKind::Select("B".into()),
        );
        assert!(advanced.advances_now());
    }

    #[test]
    fn dropdown_ignores_unknown_option() {
        assert_eq!(
            interact(
                &dropdown(true),
                &InteractionState::Idle,
                InteractionKind::Select("Z".into())
            ),
            Action::Ignore
        );
    }

    #[test]
    fn dropdown_submit_needs_a_selection() {
        let item = dropdown(false);
        assert_eq!(
            interact(&item, &InteractionState::Idle, InteractionKind::Submit(String::new())),
            Action::Ignore
        );
        let selected = InteractionState::Dropdown {
            open: false,
            selected: Some("A".into()),
        };
        assert_eq!(
            interact(&item, &selected, InteractionKind::Submit(String::new())),
            Action::AdvanceNow
        );
    }

    #[test]
    fn text_field_advances_only_on_submit() {
        let item = hotspot(HotspotWidget::TextField {
            placeholder: None,
            timeout_secs: None,
        });
        let state = InteractionState::Idle;
        assert_eq!(
            interact(&item, &state, InteractionKind::Click),
            Action::WaitForExactInput
        );
        assert_eq!(
            interact(&item, &state, InteractionKind::Submit(String::new())),
            Action::AdvanceNow
        );
    }

    #[test]
    fn coaching_tip_is_shown_on_entry_and_dismissed_by_click() {
        let item = hotspot(HotspotWidget::CoachingTip {
            label: Some("Greet the customer".into()),
            timeout_secs: None,
        });
        let state = InteractionState::entered(&item);
        assert_eq!(state, InteractionState::TipShown);
        assert_eq!(
            interact(&item, &state, InteractionKind::Click),
            Action::AdvanceNow
        );
    }

    #[test]
    fn interaction_kind_uses_adjacent_tagging() {
        let json = serde_json::to_value(InteractionKind::Select("A".into())).unwrap();
        assert_eq!(json["type"], "select");
        assert_eq!(json["value"], "A");
    }
}
