//! Headless combobox/autocomplete interaction engine.
//!
//! A combobox root owns the full interaction state of a filterable
//! autocomplete widget without rendering anything: open/close lifecycle with
//! animation-aware unmounting, committed selection in none/single/multiple
//! modes, locale-aware filtering of the derived item list, keyboard and
//! pointer routing, IME composition buffering, and the generated ARIA props
//! a rendering collaborator applies to its elements.
//!
//! The root exposes three observation surfaces:
//!
//! - change hooks ([`ComboboxHooks`]) that may veto an operation before it
//!   commits,
//! - signals ([`ComboboxSignals`]) emitted after each commit settles,
//! - the state [`Store`](keel_core::Store) for fine-grained part
//!   subscriptions.
//!
//! # Example
//!
//! ```
//! use keel::combobox::{Combobox, Key, KeyEvent};
//!
//! let combobox = Combobox::new(vec![
//!     "Apple".to_string(),
//!     "Banana".to_string(),
//!     "Cherry".to_string(),
//! ]);
//!
//! combobox.set_input_value("an");
//! assert_eq!(combobox.visible_items(), vec!["Banana".to_string()]);
//!
//! let mut event = KeyEvent::new(Key::ArrowDown);
//! combobox.handle_key(&mut event);
//! assert!(combobox.open());
//! ```

pub mod collaborators;
pub mod events;
pub mod filter;
pub mod highlight;
pub mod items;
pub mod lifecycle;
pub mod registry;
pub mod root;
mod router;
pub mod selection;


pub use collaborators::{
    Align, AnchorPositioning, AnchorReadback, FormField, ImmediateTransitions, InputProps,
    ItemProps, ListProps, SharedAnchorPositioning, SharedFormField, SharedTransitionObserver,
    Side, StaticAnchor, TransitionObserver, TriggerProps, UnboundField, ValidationMode,
};
pub use events::{
    CompositionEvent, InputChangeEvent, InputType, Key, KeyEvent, KeyboardModifiers, PressEvent,
};
pub use filter::{CaseSensitivity, Filter, FilterOptions};
pub use highlight::{
    AutoHighlight, HighlightChange, HighlightProvenance, HighlightState, IndexSlot, IndexUpdate,
};
pub use items::{FilterMode, FilteredItems, Group, ItemSource, Limit, Query};
pub use lifecycle::{OpenChangeReason, OpenState, TransitionStatus};
pub use registry::{ItemEq, ItemHandle};
pub use root::{
    Combobox, ComboboxBuilder, ComboboxConfig, ComboboxHandle, ComboboxHooks, ComboboxSignals,
    ComboboxState, ComboboxValue, InputChangeReason, SelectionChangeReason,
};
pub use selection::{
    CloseReconciliation, InputPlacement, ItemText, LabeledItem, SelectedValue, SelectionMode,
    Stringifier,
};
