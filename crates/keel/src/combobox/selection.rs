//! Selection state machine: selected value, input value, and their
//! reconciliation rules.
//!
//! The machine owns two pieces of state — the committed selection and the
//! input text — plus the `query_changed_after_open` flag that decides
//! whether the derived list filters by the input or still treats the input
//! as representing the selection.
//!
//! The [`SelectionPolicy`] holds the configuration-derived rules (mode,
//! comparer, stringification, input placement) and applies them to a
//! [`SelectionState`]; the root invokes it inside a store update so every
//! commit settles atomically.

use std::sync::Arc;

use crate::combobox::registry::ItemEq;

/// How many values a combobox commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// No committed selection; the combobox acts as a filtering input.
    None,
    /// At most one committed value.
    #[default]
    Single,
    /// A set of committed values, toggled by repeated selection.
    Multiple,
}

/// The committed selection. The variant always matches the configured
/// [`SelectionMode`]; [`SelectionPolicy::normalize`] reshapes foreign input
/// at the API boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectedValue<T> {
    /// Nothing is ever committed (none mode).
    None,
    /// Zero or one committed value (single mode).
    Single(Option<T>),
    /// Zero or more committed values (multiple mode).
    Multiple(Vec<T>),
}

impl<T> SelectedValue<T> {
    /// The empty value for `mode`.
    pub fn empty(mode: SelectionMode) -> Self {
        match mode {
            SelectionMode::None => Self::None,
            SelectionMode::Single => Self::Single(None),
            SelectionMode::Multiple => Self::Multiple(Vec::new()),
        }
    }

    /// The mode this shape belongs to.
    pub fn mode(&self) -> SelectionMode {
        match self {
            Self::None => SelectionMode::None,
            Self::Single(_) => SelectionMode::Single,
            Self::Multiple(_) => SelectionMode::Multiple,
        }
    }

    /// The single committed value, if this is a non-empty single selection.
    pub fn single(&self) -> Option<&T> {
        match self {
            Self::Single(value) => value.as_ref(),
            _ => None,
        }
    }

    /// The committed values in multiple mode (empty slice otherwise).
    pub fn multiple(&self) -> &[T] {
        match self {
            Self::Multiple(values) => values,
            _ => &[],
        }
    }

    /// Whether nothing is committed.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Single(value) => value.is_none(),
            Self::Multiple(values) => values.is_empty(),
        }
    }
}

/// Items that know how to present themselves as text.
///
/// `label` is the display text shown in the input and the popup;
/// `submit_value` is what a form submission carries. They coincide unless
/// the item distinguishes them (see [`LabeledItem`]).
pub trait ItemText {
    /// Display text.
    fn label(&self) -> String;

    /// Form-submission text. Defaults to the label.
    fn submit_value(&self) -> String {
        self.label()
    }
}

impl ItemText for String {
    fn label(&self) -> String {
        self.clone()
    }
}

impl ItemText for &'static str {
    fn label(&self) -> String {
        (*self).to_string()
    }
}

/// An item with distinct display and submission text, the conventional
/// `{ value, label }` pair shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabeledItem {
    /// Form-submission value.
    pub value: String,
    /// Display label.
    pub label: String,
}

impl LabeledItem {
    /// Create a labeled item.
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

impl ItemText for LabeledItem {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn submit_value(&self) -> String {
        self.value.clone()
    }
}

/// Item-to-text conversion, overridable per root.
///
/// Defaults to the item's [`ItemText`] impl; callers supply closures when
/// their item type's text lives elsewhere (say, a lookup table).
pub struct Stringifier<T> {
    label: Arc<dyn Fn(&T) -> String + Send + Sync>,
    value: Arc<dyn Fn(&T) -> String + Send + Sync>,
}

impl<T: ItemText> Default for Stringifier<T> {
    fn default() -> Self {
        Self {
            label: Arc::new(|item: &T| item.label()),
            value: Arc::new(|item: &T| item.submit_value()),
        }
    }
}

impl<T> Stringifier<T> {
    /// Build from explicit closures.
    pub fn new(
        label: impl Fn(&T) -> String + Send + Sync + 'static,
        value: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: Arc::new(label),
            value: Arc::new(value),
        }
    }

    /// Display text for `item`.
    pub fn label_of(&self, item: &T) -> String {
        (self.label)(item)
    }

    /// Form-submission text for `item`.
    pub fn value_of(&self, item: &T) -> String {
        (self.value)(item)
    }

    /// Shared handle to the label extractor (used by the derived items
    /// engine).
    pub fn label_fn(&self) -> Arc<dyn Fn(&T) -> String + Send + Sync> {
        self.label.clone()
    }
}

impl<T> Clone for Stringifier<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Stringifier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Stringifier")
    }
}

/// Where the text input is rendered relative to the popup.
///
/// Close-time reconciliation differs: an input inside the popup starts blank
/// on the next open, an input outside keeps showing the committed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputPlacement {
    /// Input rendered inside the popup.
    Inside,
    /// Input rendered outside the popup (the anchor itself).
    #[default]
    Outside,
}

/// Mutable selection-machine state, embedded in the root's store state.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState<T> {
    /// The committed selection.
    pub selected: SelectedValue<T>,
    /// The raw input text (untrimmed).
    pub input_value: String,
    /// Whether the user edited the query since the popup opened.
    pub query_changed_after_open: bool,
}

impl<T> SelectionState<T> {
    /// Empty state for `mode`.
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            selected: SelectedValue::empty(mode),
            input_value: String::new(),
            query_changed_after_open: false,
        }
    }
}

/// What a close-time reconciliation did to the input value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReconciliation {
    /// Input left as-is.
    Untouched,
    /// Input cleared so the next open starts blank.
    Cleared,
    /// Input forced to the stringified selection; the mismatch counted as a
    /// confirmed selection.
    SelectionConfirmed,
    /// Input forced to empty because nothing is selected; the leftover text
    /// counted as an abandoned filter.
    FilterAbandoned,
}

/// Effects of a selection commit the root must announce after settling.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEffect {
    /// The input value was synchronized to the selection's label.
    pub input_synced: Option<String>,
}

/// Configuration-derived selection rules.
#[derive(Clone)]
pub struct SelectionPolicy<T> {
    /// Selection mode.
    pub mode: SelectionMode,
    /// Equality comparer for membership and toggling.
    pub comparer: ItemEq<T>,
    /// Item-to-text conversion.
    pub stringify: Stringifier<T>,
    /// Where the input lives relative to the popup.
    pub input_placement: InputPlacement,
    /// In none mode, whether pressing an item fills the input with its
    /// label.
    pub fill_input_on_press: bool,
}

impl<T: Clone> SelectionPolicy<T> {
    /// Reshape a foreign value to this policy's mode.
    ///
    /// Scalars become one-element sets in multiple mode; in single mode the
    /// first element of a set wins; none mode discards everything.
    pub fn normalize(&self, value: SelectedValue<T>) -> SelectedValue<T> {
        match (self.mode, value) {
            (SelectionMode::None, _) => SelectedValue::None,
            (SelectionMode::Single, SelectedValue::Single(v)) => SelectedValue::Single(v),
            (SelectionMode::Single, SelectedValue::Multiple(mut vs)) => {
                SelectedValue::Single(if vs.is_empty() {
                    None
                } else {
                    Some(vs.remove(0))
                })
            }
            (SelectionMode::Single, SelectedValue::None) => SelectedValue::Single(None),
            (SelectionMode::Multiple, SelectedValue::Multiple(vs)) => SelectedValue::Multiple(vs),
            (SelectionMode::Multiple, SelectedValue::Single(v)) => {
                SelectedValue::Multiple(v.into_iter().collect())
            }
            (SelectionMode::Multiple, SelectedValue::None) => SelectedValue::Multiple(Vec::new()),
        }
    }

    /// Toggle `item`'s membership in a multiple-mode selection.
    pub fn toggle(&self, current: &SelectedValue<T>, item: &T) -> SelectedValue<T> {
        let mut values: Vec<T> = current.multiple().to_vec();
        if let Some(pos) = values.iter().position(|v| self.comparer.eq(v, item)) {
            values.remove(pos);
        } else {
            values.push(item.clone());
        }
        SelectedValue::Multiple(values)
    }

    /// Commit `next` into `state`, synchronizing the input where the mode
    /// and input placement call for it.
    pub fn apply_commit(
        &self,
        state: &mut SelectionState<T>,
        next: SelectedValue<T>,
    ) -> CommitEffect {
        let next = self.normalize(next);

        // None-mode fill-on-press is driven by the pressed item, not the
        // committed value, so the router handles it separately.
        let sync = match self.mode {
            SelectionMode::Single if self.input_placement == InputPlacement::Outside => {
                Some(match next.single() {
                    Some(item) => self.stringify.label_of(item),
                    None => String::new(),
                })
            }
            _ => None,
        };

        state.selected = next;

        let input_synced = match sync {
            Some(text) if text != state.input_value => {
                state.input_value = text.clone();
                Some(text)
            }
            _ => None,
        };

        CommitEffect { input_synced }
    }

    /// Set the input value, tracking post-open query edits while the popup
    /// is open.
    pub fn apply_input(&self, state: &mut SelectionState<T>, next: String, popup_open: bool) {
        if popup_open && next != state.input_value {
            state.query_changed_after_open = true;
        }
        state.input_value = next;
    }

    /// Whether the input text still reads back the committed selection
    /// rather than acting as a filter.
    ///
    /// A single-mode selection is represented by its stringified label; with
    /// nothing committed only an empty input counts.
    pub fn input_represents_selection(&self, state: &SelectionState<T>) -> bool {
        match state.selected.single() {
            Some(item) => state.input_value == self.stringify.label_of(item),
            None => state.input_value.is_empty(),
        }
    }

    /// Drop leftover filter text after a multiple-mode commit. This is an
    /// explicit follow-up action so committing never re-triggers filtering
    /// mid-interaction.
    pub fn clear_query_after_commit(&self, state: &mut SelectionState<T>) -> bool {
        if state.input_value.is_empty() {
            return false;
        }
        state.input_value.clear();
        true
    }

    /// Close-time input reconciliation, run once the popup is fully closed
    /// (exit transition complete).
    pub fn reconcile_on_close(&self, state: &mut SelectionState<T>) -> CloseReconciliation {
        match self.mode {
            SelectionMode::None => CloseReconciliation::Untouched,
            SelectionMode::Single => match self.input_placement {
                InputPlacement::Inside => {
                    state.input_value.clear();
                    CloseReconciliation::Cleared
                }
                InputPlacement::Outside => {
                    let forced = match state.selected.single() {
                        Some(item) => self.stringify.label_of(item),
                        None => String::new(),
                    };
                    let outcome = if forced.is_empty() {
                        CloseReconciliation::FilterAbandoned
                    } else {
                        CloseReconciliation::SelectionConfirmed
                    };
                    state.input_value = forced;
                    outcome
                }
            },
            SelectionMode::Multiple => {
                if state.input_value.is_empty() {
                    CloseReconciliation::Untouched
                } else {
                    state.input_value.clear();
                    CloseReconciliation::Cleared
                }
            }
        }
    }
}

impl<T> std::fmt::Debug for SelectionPolicy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionPolicy")
            .field("mode", &self.mode)
            .field("input_placement", &self.input_placement)
            .field("fill_input_on_press", &self.fill_input_on_press)
            .finish()
    }
}
