//! Cancellable, reason-tagged change events.
//!
//! Every externally observable state mutation in a Keel interaction root is
//! announced through a [`ChangeDetails`] value: a reason tag describing what
//! triggered the change, plus a synchronous veto in the accept/ignore style
//! of classic widget toolkits.
//!
//! The veto is synchronous-only: once the handler that received the details
//! returns, calling [`ChangeDetails::cancel`] on a stale copy has no effect
//! on the operation — the engine reads the flag exactly once, immediately
//! after the veto hook returns.
//!
//! # Example
//!
//! ```
//! use keel_core::ChangeDetails;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Reason {
//!     ItemPress,
//! }
//!
//! let mut details = ChangeDetails::new(Reason::ItemPress);
//! assert!(!details.is_canceled());
//!
//! // A veto hook may reject the change:
//! details.cancel();
//! assert!(details.is_canceled());
//! ```

/// Details accompanying a state-changing operation.
///
/// `R` is the operation-specific reason enum (open/close reasons, input
/// change reasons, and so on). The flags mirror the [`EventBase`]
/// accept/ignore pair used by widget events:
///
/// - `canceled` — set by a veto hook to reject the change entirely. No
///   internal state is committed when set.
/// - `allow_propagation` — set by a handler to let the originating native
///   event continue to enclosing components (for example, letting Escape
///   reach an outer popup) instead of being consumed.
///
/// [`EventBase`]: crate::EventBase
#[derive(Debug, Clone)]
pub struct ChangeDetails<R> {
    reason: R,
    canceled: bool,
    allow_propagation: bool,
}

impl<R> ChangeDetails<R> {
    /// Create details for a change triggered by `reason`.
    pub fn new(reason: R) -> Self {
        Self {
            reason,
            canceled: false,
            allow_propagation: false,
        }
    }

    /// The reason tag for this change.
    pub fn reason(&self) -> &R {
        &self.reason
    }

    /// Veto the change. The pending operation commits nothing.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    /// Whether the change has been vetoed.
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Allow the originating native event to keep propagating instead of
    /// being consumed by this component.
    pub fn allow_propagation(&mut self) {
        self.allow_propagation = true;
    }

    /// Whether the originating native event should keep propagating.
    pub fn is_propagation_allowed(&self) -> bool {
        self.allow_propagation
    }

    /// Map the reason into another reason type, preserving the flags.
    pub fn map_reason<R2>(self, f: impl FnOnce(R) -> R2) -> ChangeDetails<R2> {
        ChangeDetails {
            reason: f(self.reason),
            canceled: self.canceled,
            allow_propagation: self.allow_propagation,
        }
    }
}

impl<R: Copy> ChangeDetails<R> {
    /// The reason tag by value.
    pub fn reason_copied(&self) -> R {
        self.reason
    }
}

/// Common accept/ignore state shared by raw interaction events.
///
/// An accepted event has been consumed by a handler and should not be
/// dispatched further; an ignored event continues to propagate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventBase {
    accepted: bool,
}

impl EventBase {
    /// Create a new, unaccepted event base.
    pub fn new() -> Self {
        Self { accepted: false }
    }

    /// Check if the event has been accepted.
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Accept the event, preventing further propagation.
    pub fn accept(&mut self) {
        self.accepted = true;
    }

    /// Ignore the event, allowing further propagation.
    pub fn ignore(&mut self) {
        self.accepted = false;
    }
}
