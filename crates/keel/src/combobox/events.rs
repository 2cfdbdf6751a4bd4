//! Interaction event types routed into the combobox engine.
//!
//! These mirror the native events a rendering collaborator receives from its
//! host platform, reduced to what the engine needs: the key or text payload
//! plus an accept/ignore flag ([`EventBase`]) deciding whether the native
//! event keeps propagating.

use keel_core::EventBase;

/// Keys the combobox engine routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Up arrow.
    ArrowUp,
    /// Down arrow.
    ArrowDown,
    /// Left arrow.
    ArrowLeft,
    /// Right arrow.
    ArrowRight,
    /// Home.
    Home,
    /// End.
    End,
    /// Enter/Return.
    Enter,
    /// Escape.
    Escape,
    /// Backspace.
    Backspace,
    /// Delete (forward).
    Delete,
    /// Tab.
    Tab,
    /// A printable character.
    Character(char),
    /// Anything else.
    Unknown,
}

/// Keyboard modifiers held during an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct KeyboardModifiers {
    /// The Shift key is held.
    pub shift: bool,
    /// The Control key is held (Cmd on macOS).
    pub control: bool,
    /// The Alt key is held (Option on macOS).
    pub alt: bool,
    /// The Meta/Super key is held.
    pub meta: bool,
}

impl KeyboardModifiers {
    /// No modifiers pressed.
    pub const NONE: Self = Self {
        shift: false,
        control: false,
        alt: false,
        meta: false,
    };

    /// Check if any modifier is pressed.
    pub fn any(&self) -> bool {
        self.shift || self.control || self.alt || self.meta
    }

    /// Check if no modifiers are pressed.
    pub fn none(&self) -> bool {
        !self.any()
    }
}

/// A key press dispatched to the input or trigger.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    /// Accept/ignore state.
    pub base: EventBase,
    /// The logical key.
    pub key: Key,
    /// Modifiers held during the press.
    pub modifiers: KeyboardModifiers,
}

impl KeyEvent {
    /// A key press with no modifiers.
    pub fn new(key: Key) -> Self {
        Self {
            base: EventBase::new(),
            key,
            modifiers: KeyboardModifiers::NONE,
        }
    }

    /// Set modifiers using builder pattern.
    pub fn with_modifiers(mut self, modifiers: KeyboardModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// The native `inputType` of an input event, as far as the engine cares.
///
/// A missing input type, or `insertReplacementText`, marks a browser
/// autofill rather than manual typing. The distinction is browser-dependent
/// and best-effort, never a strict contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    /// Ordinary typed insertion.
    InsertText,
    /// Replacement insertion, typically autofill.
    InsertReplacementText,
    /// Backward deletion.
    DeleteContentBackward,
    /// Forward deletion.
    DeleteContentForward,
    /// Anything else.
    Other,
}

/// A change to the input's text.
#[derive(Debug, Clone)]
pub struct InputChangeEvent {
    /// Accept/ignore state.
    pub base: EventBase,
    /// The input's new full text.
    pub text: String,
    /// The native input type, if the platform reported one.
    pub input_type: Option<InputType>,
}

impl InputChangeEvent {
    /// An ordinary typed change.
    pub fn typed(text: impl Into<String>) -> Self {
        Self {
            base: EventBase::new(),
            text: text.into(),
            input_type: Some(InputType::InsertText),
        }
    }

    /// A change with no reported input type (autofill-like).
    pub fn unattributed(text: impl Into<String>) -> Self {
        Self {
            base: EventBase::new(),
            text: text.into(),
            input_type: None,
        }
    }

    /// Set the input type using builder pattern.
    pub fn with_input_type(mut self, input_type: InputType) -> Self {
        self.input_type = Some(input_type);
        self
    }

    /// Whether this change looks like browser autofill rather than typing.
    pub fn is_autofill(&self) -> bool {
        matches!(
            self.input_type,
            None | Some(InputType::InsertReplacementText)
        )
    }
}

/// An IME composition event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionEvent {
    /// Composition began.
    Start,
    /// In-progress composition text changed.
    Update(String),
    /// Composition committed with the final text.
    End(String),
}

/// A pointer press on a part (trigger, input, item).
#[derive(Debug, Clone, Copy, Default)]
pub struct PressEvent {
    /// Accept/ignore state.
    pub base: EventBase,
}

impl PressEvent {
    /// A fresh, unaccepted press.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autofill_heuristic() {
        assert!(InputChangeEvent::unattributed("Street 1").is_autofill());
        assert!(InputChangeEvent::typed("s")
            .with_input_type(InputType::InsertReplacementText)
            .is_autofill());
        assert!(!InputChangeEvent::typed("s").is_autofill());
        assert!(!InputChangeEvent::typed("")
            .with_input_type(InputType::DeleteContentBackward)
            .is_autofill());
    }

    #[test]
    fn test_key_event_accept() {
        let mut event = KeyEvent::new(Key::Enter);
        assert!(!event.base.is_accepted());
        event.base.accept();
        assert!(event.base.is_accepted());
    }

    #[test]
    fn test_modifiers() {
        assert!(KeyboardModifiers::NONE.none());
        let shifted = KeyboardModifiers {
            shift: true,
            ..KeyboardModifiers::NONE
        };
        assert!(shifted.any());
    }
}
