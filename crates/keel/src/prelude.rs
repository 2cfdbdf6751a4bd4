//! Convenient glob import for Keel applications.
//!
//! ```
//! use keel::prelude::*;
//! ```

pub use crate::combobox::{
    AutoHighlight, Combobox, ComboboxBuilder, ComboboxHandle, ComboboxValue, CompositionEvent,
    Filter, FilterOptions, Group, HighlightProvenance, IndexSlot, IndexUpdate, InputChangeEvent,
    InputPlacement, ItemEq, ItemHandle, ItemText, Key, KeyEvent, KeyboardModifiers, LabeledItem,
    Limit, OpenChangeReason, PressEvent, SelectedValue, SelectionMode, Stringifier,
    TransitionStatus, ValidationMode,
};
pub use crate::error::{ComboboxError, Result};

pub use keel_core::{ChangeDetails, EventBase, Signal, Store};
