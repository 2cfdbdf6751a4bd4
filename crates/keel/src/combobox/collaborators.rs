//! Collaborator contracts the combobox engine consumes or feeds.
//!
//! The engine owns behavior and accessibility semantics only. Rendering,
//! positioning, animation detection, and form wiring are external
//! collaborators behind the traits here; every trait ships a trivial default
//! implementation suitable for tests and animation-free hosts.

use std::sync::Arc;

use crate::combobox::lifecycle::TransitionStatus;

/// Reports when a popup's CSS transitions/animations have settled.
///
/// The engine calls [`await_settled`](Self::await_settled) when it starts an
/// enter or exit transition; the collaborator invokes `done` once nothing is
/// in flight (or immediately if no animation is configured). `done` is
/// epoch-guarded inside the engine, so late invocations after a newer
/// open/close request are harmless.
pub trait TransitionObserver: Send + Sync {
    /// Invoke `done` once the popup element has no transition in flight for
    /// the given direction (`open` = entering, `!open` = exiting).
    fn await_settled(&self, open: bool, done: Box<dyn FnOnce() + Send>);
}

/// Transition observer for hosts without animations: completes immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateTransitions;

impl TransitionObserver for ImmediateTransitions {
    fn await_settled(&self, _open: bool, done: Box<dyn FnOnce() + Send>) {
        done();
    }
}

/// Resolved popup side relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    /// Above the anchor.
    Top,
    /// Below the anchor.
    #[default]
    Bottom,
    /// Left of the anchor.
    Left,
    /// Right of the anchor.
    Right,
}

impl Side {
    /// The `data-side` attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Resolved popup alignment along the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    /// Aligned to the anchor's start edge.
    Start,
    /// Centered on the anchor.
    #[default]
    Center,
    /// Aligned to the anchor's end edge.
    End,
}

impl Align {
    /// The `data-align` attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Center => "center",
            Self::End => "end",
        }
    }
}

/// What the anchor-positioning collaborator resolved for the popup.
///
/// The engine never positions anything; it only reads these back for data
/// attributes and ARIA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnchorReadback {
    /// Resolved side.
    pub side: Side,
    /// Resolved alignment.
    pub align: Align,
    /// Whether the anchor scrolled out of view.
    pub anchor_hidden: bool,
}

/// Anchor-positioning collaborator read-back.
pub trait AnchorPositioning: Send + Sync {
    /// Current resolved placement.
    fn readback(&self) -> AnchorReadback;
}

/// Fixed placement, for tests and hosts without collision handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAnchor(pub AnchorReadback);

impl AnchorPositioning for StaticAnchor {
    fn readback(&self) -> AnchorReadback {
        self.0
    }
}

/// When the form-field collaborator validates committed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Validate when focus leaves the component.
    #[default]
    OnBlur,
    /// Validate on every commit.
    OnChange,
}

/// Form-field collaborator: field flags, dirty/touched tracking, and the
/// validation hook.
pub trait FormField: Send + Sync {
    /// Whether the field is disabled.
    fn disabled(&self) -> bool {
        false
    }

    /// Whether the field is read-only.
    fn read_only(&self) -> bool {
        false
    }

    /// Whether the field is required.
    fn required(&self) -> bool {
        false
    }

    /// Record that the field's value diverged from its initial value.
    fn set_dirty(&self, _dirty: bool) {}

    /// Record that the user interacted with the field.
    fn set_touched(&self, _touched: bool) {}

    /// Run validation against the committed submission value.
    fn commit(&self, _value: &str) {}
}

/// Form-field collaborator for roots not wired to a form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnboundField;

impl FormField for UnboundField {}

/// Props handed to the rendering collaborator for the text input part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputProps {
    /// ARIA role (`combobox`).
    pub role: &'static str,
    /// `aria-expanded`.
    pub aria_expanded: bool,
    /// `aria-controls`: the list element id while the popup is mounted.
    pub aria_controls: Option<String>,
    /// `aria-activedescendant`: the highlighted item's element id.
    pub aria_activedescendant: Option<String>,
    /// `aria-autocomplete` value.
    pub aria_autocomplete: &'static str,
    /// Current input text.
    pub value: String,
    /// Field flags from the form collaborator.
    pub disabled: bool,
    /// Read-only flag.
    pub read_only: bool,
    /// Required flag.
    pub required: bool,
}

/// Props for the trigger button part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerProps {
    /// `aria-haspopup` value (`listbox`).
    pub aria_haspopup: &'static str,
    /// `aria-expanded`.
    pub aria_expanded: bool,
    /// Disabled flag.
    pub disabled: bool,
}

/// Props for the listbox popup part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListProps {
    /// ARIA role (`listbox`).
    pub role: &'static str,
    /// The list element id, referenced by `aria-controls`.
    pub id: String,
    /// `aria-multiselectable`.
    pub aria_multiselectable: bool,
    /// Whether the popup should currently be in the tree.
    pub mounted: bool,
    /// Animation phase, for `data-starting-style`/`data-ending-style`.
    pub transition_status: TransitionStatus,
    /// `data-side` from the anchor collaborator.
    pub data_side: Side,
    /// `data-align` from the anchor collaborator.
    pub data_align: Align,
    /// Whether the anchor is scrolled out of view.
    pub data_anchor_hidden: bool,
}

/// Props for one option part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProps {
    /// ARIA role (`option`).
    pub role: &'static str,
    /// The item element id, referenced by `aria-activedescendant`.
    pub id: String,
    /// `aria-selected`: the item is part of the committed selection.
    pub aria_selected: bool,
    /// The item is virtually focused.
    pub highlighted: bool,
}

/// Shared handle type for dynamic collaborator injection.
pub type SharedTransitionObserver = Arc<dyn TransitionObserver>;
/// Shared anchor-positioning handle.
pub type SharedAnchorPositioning = Arc<dyn AnchorPositioning>;
/// Shared form-field handle.
pub type SharedFormField = Arc<dyn FormField>;
