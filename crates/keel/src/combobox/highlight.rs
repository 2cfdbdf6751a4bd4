//! Highlight and active-index tracking.
//!
//! The tracker owns the active (virtually focused) index and the selected
//! index into the currently visible filtered list. Indices are clamped
//! against the visible count on every synchronization: filtering is expected
//! to shrink the list mid-interaction, so an out-of-range index resets to
//! `None` rather than erroring.
//!
//! Highlight-change notifications are deduplicated through the item equality
//! comparer: if a recomputation moves the highlight to an item equal to the
//! previously highlighted one (a sort-stable reorder, say), no callback
//! fires even though the index changed.

use crate::combobox::registry::ItemEq;

/// Where a highlight change came from. Forwarded to the highlight callback
/// purely as provenance metadata; it never alters state transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HighlightProvenance {
    /// Keyboard navigation.
    Keyboard,
    /// Pointer hover/press.
    Pointer,
    /// Internal recomputation (clamping, auto-highlight, reset).
    #[default]
    None,
}

/// When index 0 is highlighted automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoHighlight {
    /// Never auto-highlight.
    #[default]
    Off,
    /// Highlight index 0 only while a non-empty query is present and no
    /// explicit highlight exists.
    InputChange,
    /// Highlight index 0 whenever the list is non-empty and nothing else is
    /// highlighted.
    Always,
}

/// One slot of an index update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexSlot {
    /// Leave the index as it is.
    #[default]
    Keep,
    /// Clear the index.
    Clear,
    /// Set the index (clamped to `None` if out of range).
    At(usize),
}

impl IndexSlot {
    fn resolve(self, current: Option<usize>) -> Option<usize> {
        match self {
            Self::Keep => current,
            Self::Clear => None,
            Self::At(index) => Some(index),
        }
    }
}

/// A requested index change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexUpdate {
    /// The active (virtually focused) index.
    pub active: IndexSlot,
    /// The committed-selection index.
    pub selected: IndexSlot,
    /// Provenance metadata for the highlight callback.
    pub provenance: HighlightProvenance,
}

impl IndexUpdate {
    /// Update only the active index.
    pub fn active(slot: IndexSlot, provenance: HighlightProvenance) -> Self {
        Self {
            active: slot,
            selected: IndexSlot::Keep,
            provenance,
        }
    }

    /// Update only the selected index.
    pub fn selected(slot: IndexSlot) -> Self {
        Self {
            active: IndexSlot::Keep,
            selected: slot,
            provenance: HighlightProvenance::None,
        }
    }
}

/// Mutable index state, embedded in the root's store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HighlightState {
    /// Currently highlighted index into the visible list, if any.
    pub active_index: Option<usize>,
    /// Index of the committed selection within the visible list, if any.
    pub selected_index: Option<usize>,
}

/// A highlight change to announce once the state snapshot has settled.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightChange<T> {
    /// The newly highlighted item, or `None` when the highlight cleared.
    pub item: Option<T>,
    /// Its index in the visible list.
    pub index: Option<usize>,
    /// Where the change came from.
    pub provenance: HighlightProvenance,
}

/// Tracks the highlight across index updates and list recomputations.
#[derive(Debug)]
pub struct HighlightTracker<T> {
    comparer: ItemEq<T>,
    auto: AutoHighlight,
    last_highlighted: Option<T>,
    /// Whether the current active index came from the auto-highlight policy
    /// rather than an explicit update.
    auto_applied: bool,
}

impl<T: Clone> HighlightTracker<T> {
    /// Create a tracker with the given comparer and auto-highlight policy.
    pub fn new(comparer: ItemEq<T>, auto: AutoHighlight) -> Self {
        Self {
            comparer,
            auto,
            last_highlighted: None,
            auto_applied: false,
        }
    }

    /// The configured auto-highlight policy.
    pub fn auto_highlight(&self) -> AutoHighlight {
        self.auto
    }

    fn logical_change(&mut self, next: Option<&T>) -> bool {
        let changed = match (&self.last_highlighted, next) {
            (None, None) => false,
            (Some(prev), Some(item)) => !self.comparer.eq(prev, item),
            _ => true,
        };
        if changed {
            self.last_highlighted = next.cloned();
        }
        changed
    }

    /// Apply an explicit index update against the visible items.
    ///
    /// Out-of-range requests clamp to `None`. Returns the highlight change
    /// to announce, if the active item logically changed.
    pub fn apply(
        &mut self,
        state: &mut HighlightState,
        visible: &[T],
        update: IndexUpdate,
    ) -> Option<HighlightChange<T>> {
        let clamp = |index: Option<usize>| index.filter(|&i| i < visible.len());

        state.selected_index = clamp(update.selected.resolve(state.selected_index));
        state.active_index = clamp(update.active.resolve(state.active_index));
        if update.active != IndexSlot::Keep {
            self.auto_applied = false;
        }

        let item = state.active_index.and_then(|i| visible.get(i));
        if self.logical_change(item) {
            Some(HighlightChange {
                item: state.active_index.and_then(|i| visible.get(i).cloned()),
                index: state.active_index,
                provenance: update.provenance,
            })
        } else {
            None
        }
    }

    /// Re-synchronize indices after the visible list changed: clamp
    /// out-of-range indices to `None`, then apply the auto-highlight policy.
    pub fn sync_bounds(
        &mut self,
        state: &mut HighlightState,
        visible: &[T],
        query_is_empty: bool,
    ) -> Option<HighlightChange<T>> {
        let clamp = |index: Option<usize>| index.filter(|&i| i < visible.len());

        state.selected_index = clamp(state.selected_index);
        state.active_index = clamp(state.active_index);

        // An auto-applied highlight lives only as long as its query.
        if self.auto_applied && query_is_empty {
            state.active_index = None;
        }
        if state.active_index.is_none() {
            self.auto_applied = false;
        }

        if state.active_index.is_none() && !visible.is_empty() {
            let auto = match self.auto {
                AutoHighlight::Off => false,
                AutoHighlight::InputChange => !query_is_empty,
                AutoHighlight::Always => true,
            };
            if auto {
                state.active_index = Some(0);
                self.auto_applied = true;
            }
        }

        let item = state.active_index.and_then(|i| visible.get(i));
        if self.logical_change(item) {
            Some(HighlightChange {
                item: state.active_index.and_then(|i| visible.get(i).cloned()),
                index: state.active_index,
                provenance: HighlightProvenance::None,
            })
        } else {
            None
        }
    }

    /// Forget the highlight entirely (popup unmount).
    ///
    /// Returns the clearing change if something was highlighted.
    pub fn reset(&mut self, state: &mut HighlightState) -> Option<HighlightChange<T>> {
        state.active_index = None;
        state.selected_index = None;
        self.auto_applied = false;
        if self.logical_change(None) {
            Some(HighlightChange {
                item: None,
                index: None,
                provenance: HighlightProvenance::None,
            })
        } else {
            None
        }
    }
}
