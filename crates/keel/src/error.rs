//! Error types for Keel interaction engines.
//!
//! Interaction logic has a narrow error taxonomy: misuse of the API surface
//! (contract violations) rather than runtime failures. Out-of-range indices
//! are clamped, canceled events are a deliberate veto path, and nothing here
//! is fatal — errors surface to the host application as ordinary `Result`s.

use thiserror::Error;

use crate::combobox::selection::SelectionMode;

/// Errors produced by the combobox engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComboboxError {
    /// A part handle was used after the root that created it was dropped.
    ///
    /// Parts (input, trigger, list, items) hold a weak reference to their
    /// root and must not outlive it. This is a programmer error at the call
    /// site, not a recoverable runtime condition.
    #[error("combobox root is not mounted; parts must not outlive the root that created them")]
    RootNotMounted,

    /// A selected value was supplied whose shape does not match the
    /// configured selection mode (for example an array in single mode).
    #[error("selected value shape does not match selection mode {mode:?}")]
    ShapeMismatch {
        /// The mode the root was configured with.
        mode: SelectionMode,
    },
}

/// A specialized Result type for combobox operations.
pub type Result<T> = std::result::Result<T, ComboboxError>;
