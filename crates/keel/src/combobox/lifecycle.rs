//! Open/close lifecycle control.
//!
//! The popup walks `closed → opening → open → closing → closed`. The
//! `mounted` flag outlives `open` on the way down: it stays `true` until the
//! transition-status collaborator reports that exit animations finished, so
//! the rendering collaborator keeps the popup in the tree while it animates
//! out.
//!
//! Completion callbacks are epoch-guarded: if a new open/close request
//! arrives before the previous transition settles, the newer request wins
//! and the stale completion is a no-op.

/// CSS-driven animation phase, independent of the logical `open` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionStatus {
    /// No transition in flight.
    #[default]
    Idle,
    /// Enter transition starting.
    Starting,
    /// Exit transition running.
    Ending,
}

/// The popup's lifecycle state, embedded in the root's store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenState {
    /// Logical open flag.
    pub open: bool,
    /// Whether the popup is in the tree. Stays `true` through the exit
    /// transition.
    pub mounted: bool,
    /// Animation phase.
    pub transition_status: TransitionStatus,
}

/// What triggered an open or close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenChangeReason {
    /// The trigger button was pressed.
    TriggerPress,
    /// The input itself was clicked.
    InputClick,
    /// Typing changed the input value.
    InputChange,
    /// ArrowDown from the input or trigger.
    ArrowDown,
    /// ArrowUp from the input or trigger.
    ArrowUp,
    /// An item was pressed (close after commit).
    ItemPress,
    /// Escape key.
    EscapeKey,
    /// Focus left the component.
    FocusOut,
    /// A press landed outside the component.
    OutsidePress,
    /// Explicit API call.
    Programmatic,
}

/// Drives [`OpenState`] transitions and guards stale completions.
#[derive(Debug, Default)]
pub struct LifecycleController {
    epoch: u64,
}

impl LifecycleController {
    /// Create a controller in the closed state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current transition epoch. Bumped on every open/close request.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Begin opening. Returns the epoch to pass to
    /// [`finish_open`](Self::finish_open), or `None` if already open.
    pub fn request_open(&mut self, state: &mut OpenState) -> Option<u64> {
        if state.open {
            return None;
        }
        self.epoch = self.epoch.wrapping_add(1);
        state.open = true;
        state.mounted = true;
        state.transition_status = TransitionStatus::Starting;
        Some(self.epoch)
    }

    /// Enter transition finished. Stale epochs no-op.
    pub fn finish_open(&mut self, state: &mut OpenState, epoch: u64) -> bool {
        if epoch != self.epoch || !state.open {
            return false;
        }
        state.transition_status = TransitionStatus::Idle;
        true
    }

    /// Begin closing: `open` flips immediately, `mounted` holds until
    /// [`finish_close`](Self::finish_close). Returns the epoch, or `None`
    /// if already closed.
    pub fn request_close(&mut self, state: &mut OpenState) -> Option<u64> {
        if !state.open {
            return None;
        }
        self.epoch = self.epoch.wrapping_add(1);
        state.open = false;
        state.transition_status = TransitionStatus::Ending;
        Some(self.epoch)
    }

    /// Exit transition finished: unmount. Stale epochs (a reopen arrived
    /// meanwhile) no-op. The caller runs the unmount sequence when this
    /// returns `true`.
    pub fn finish_close(&mut self, state: &mut OpenState, epoch: u64) -> bool {
        if epoch != self.epoch || state.open || !state.mounted {
            return false;
        }
        state.mounted = false;
        state.transition_status = TransitionStatus::Idle;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_open_close_walk() {
        let mut controller = LifecycleController::new();
        let mut state = OpenState::default();

        let open_epoch = controller.request_open(&mut state).unwrap();
        assert!(state.open && state.mounted);
        assert_eq!(state.transition_status, TransitionStatus::Starting);

        assert!(controller.finish_open(&mut state, open_epoch));
        assert_eq!(state.transition_status, TransitionStatus::Idle);

        let close_epoch = controller.request_close(&mut state).unwrap();
        assert!(!state.open);
        assert!(state.mounted, "mounted must hold through the exit transition");
        assert_eq!(state.transition_status, TransitionStatus::Ending);

        assert!(controller.finish_close(&mut state, close_epoch));
        assert!(!state.mounted);
        assert_eq!(state.transition_status, TransitionStatus::Idle);
    }

    #[test]
    fn test_double_request_is_noop() {
        let mut controller = LifecycleController::new();
        let mut state = OpenState::default();

        assert!(controller.request_open(&mut state).is_some());
        assert!(controller.request_open(&mut state).is_none());

        assert!(controller.request_close(&mut state).is_some());
        assert!(controller.request_close(&mut state).is_none());
    }

    #[test]
    fn test_stale_close_completion_noops_after_reopen() {
        let mut controller = LifecycleController::new();
        let mut state = OpenState::default();

        controller.request_open(&mut state);
        let close_epoch = controller.request_close(&mut state).unwrap();

        // Reopened before the exit transition settled: newest request wins.
        controller.request_open(&mut state);
        assert!(!controller.finish_close(&mut state, close_epoch));
        assert!(state.open);
        assert!(state.mounted);
    }

    #[test]
    fn test_stale_open_completion_noops_after_close() {
        let mut controller = LifecycleController::new();
        let mut state = OpenState::default();

        let open_epoch = controller.request_open(&mut state).unwrap();
        controller.request_close(&mut state);

        assert!(!controller.finish_open(&mut state, open_epoch));
        assert_eq!(state.transition_status, TransitionStatus::Ending);
    }
}
