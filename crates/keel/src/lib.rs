//! Keel: headless, unstyled interaction primitives.
//!
//! Keel implements the *behavior* of rich widgets — state machines, keyboard
//! and pointer routing, accessibility contracts — and leaves rendering,
//! styling, positioning, and animation to collaborators supplied by the
//! host. The first engine is the [`combobox`] autocomplete root.
//!
//! The reactive plumbing (signals, the observable store, cancellable change
//! events) lives in [`keel_core`] and is re-exported here.
//!
//! # Quick start
//!
//! ```
//! use keel::prelude::*;
//!
//! let combobox = Combobox::builder()
//!     .with_items(vec!["Rust".to_string(), "Ruby".to_string()])
//!     .with_auto_highlight(AutoHighlight::InputChange)
//!     .build();
//!
//! combobox.set_input_value("ru");
//! assert_eq!(combobox.visible_items().len(), 2);
//! assert_eq!(combobox.active_index(), Some(0));
//! ```
//!
//! # Logging
//!
//! Keel instruments with `tracing`; install a subscriber in the host to see
//! records, and filter by target (for example `keel::combobox=debug`).

pub mod combobox;
pub mod error;
pub mod prelude;

pub use error::{ComboboxError, Result};

pub use keel_core::{
    ChangeDetails, ConnectionGuard, ConnectionId, EventBase, Signal, Store, SubscriptionGuard,
    SubscriptionId,
};
