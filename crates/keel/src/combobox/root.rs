//! The combobox root: configuration, the owned state store, and
//! coordination of the sub-machines.
//!
//! The root owns one [`Store`] holding the complete interaction state and a
//! set of single-purpose machines (selection policy, derived-items engine,
//! highlight tracker, lifecycle controller) that each mutate their slice of
//! it. Action methods batch mutations with [`Store::update_silent`], settle
//! derived state, then notify the store and emit signals in a fixed order,
//! so observers always see a fully consistent snapshot.
//!
//! Change hooks may veto an operation before anything commits; signals fire
//! after the commit settles and cannot veto. Forced input synchronizations
//! (selection sync, close reconciliation) invoke the input hook for
//! observation only.
//!
//! # Example
//!
//! ```
//! use keel::combobox::Combobox;
//!
//! let combobox = Combobox::builder()
//!     .with_items(vec!["Apple".to_string(), "Banana".to_string()])
//!     .build();
//!
//! combobox.set_input_value("an");
//! assert_eq!(combobox.visible_items(), vec!["Banana".to_string()]);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use keel_core::logging::targets::COMBOBOX;
use keel_core::{ChangeDetails, Signal, Store};

use crate::combobox::collaborators::{
    AnchorPositioning, ImmediateTransitions, InputProps, ItemProps, ListProps,
    SharedAnchorPositioning, SharedFormField, SharedTransitionObserver, TransitionObserver,
    TriggerProps, ValidationMode,
};
use crate::combobox::filter::Filter;
use crate::combobox::highlight::{
    AutoHighlight, HighlightChange, HighlightProvenance, HighlightState, HighlightTracker,
    IndexUpdate,
};
use crate::combobox::items::{
    DerivedItemsEngine, FilterMode, FilteredItems, Group, ItemSource, Limit, Query,
};
use crate::combobox::lifecycle::{
    LifecycleController, OpenChangeReason, OpenState, TransitionStatus,
};
use crate::combobox::registry::{ItemEq, ItemHandle, ItemRegistry};
use crate::combobox::selection::{
    InputPlacement, ItemText, SelectedValue, SelectionMode, SelectionPolicy, SelectionState,
    Stringifier,
};
use crate::error::{ComboboxError, Result};

/// Bound alias for item value types the engine can manage.
pub trait ComboboxValue: Clone + PartialEq + ItemText + Send + Sync + 'static {}

impl<T: Clone + PartialEq + ItemText + Send + Sync + 'static> ComboboxValue for T {}

// ============================================================================
// Change reasons
// ============================================================================

/// What triggered a committed-selection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChangeReason {
    /// An item in the popup was pressed.
    ItemPress,
    /// Enter committed the highlighted item.
    EnterKey,
    /// A chip was removed in multiple mode.
    ChipRemoval,
    /// Browser autofill matched an item.
    Autofill,
    /// Explicit API call.
    Programmatic,
}

/// What triggered an input-value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputChangeReason {
    /// The user typed or deleted text.
    Typing,
    /// Browser autofill replaced the text.
    Autofill,
    /// An IME composition committed its final text.
    CompositionEnd,
    /// The input was synchronized to the committed selection.
    SelectionSync,
    /// Leftover filter text was cleared after a commit.
    QueryCleared,
    /// Close-time reconciliation forced the input.
    CloseReconciliation,
    /// Explicit API call.
    Programmatic,
}

// ============================================================================
// Configuration, hooks, signals
// ============================================================================

/// Veto hook for selection commits.
pub type SelectionHook<T> =
    Arc<dyn Fn(&SelectedValue<T>, &mut ChangeDetails<SelectionChangeReason>) + Send + Sync>;
/// Veto hook for input-value changes.
pub type InputHook = Arc<dyn Fn(&str, &mut ChangeDetails<InputChangeReason>) + Send + Sync>;
/// Veto hook for open/close requests.
pub type OpenHook = Arc<dyn Fn(bool, &mut ChangeDetails<OpenChangeReason>) + Send + Sync>;
/// Observation hook for highlight changes (not vetoable).
pub type HighlightHook<T> = Arc<dyn Fn(Option<&T>, HighlightProvenance) + Send + Sync>;

/// Static configuration of a combobox root.
pub struct ComboboxConfig<T> {
    /// Selection mode.
    pub mode: SelectionMode,
    /// Auto-highlight policy.
    pub auto_highlight: AutoHighlight,
    /// Cap on the derived item count.
    pub limit: Limit,
    /// Where the input lives relative to the popup.
    pub input_placement: InputPlacement,
    /// In none mode, pressing an item fills the input with its label.
    pub fill_input_on_press: bool,
    /// Clicking the input opens the popup.
    pub open_on_input_click: bool,
    /// Typing in a closed combobox opens the popup.
    pub open_on_input_change: bool,
    /// The rendering collaborator shows an empty-state panel when zero items
    /// match. Affects Escape propagation only.
    pub has_empty_state_ui: bool,
    /// When the form collaborator validates.
    pub validation_mode: ValidationMode,
    /// Item equality comparer.
    pub comparer: ItemEq<T>,
    /// Item-to-text conversion.
    pub stringify: Stringifier<T>,
    /// The text matcher, or `None` to disable filtering entirely.
    pub filter: Option<Arc<Filter>>,
}

impl<T: ComboboxValue> Default for ComboboxConfig<T> {
    fn default() -> Self {
        Self {
            mode: SelectionMode::default(),
            auto_highlight: AutoHighlight::default(),
            limit: Limit::default(),
            input_placement: InputPlacement::default(),
            fill_input_on_press: false,
            open_on_input_click: true,
            open_on_input_change: true,
            has_empty_state_ui: false,
            validation_mode: ValidationMode::default(),
            comparer: ItemEq::default(),
            stringify: Stringifier::default(),
            filter: Some(Filter::system()),
        }
    }
}

impl<T> std::fmt::Debug for ComboboxConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComboboxConfig")
            .field("mode", &self.mode)
            .field("auto_highlight", &self.auto_highlight)
            .field("limit", &self.limit)
            .field("input_placement", &self.input_placement)
            .field("filter_enabled", &self.filter.is_some())
            .finish()
    }
}

/// Cancellable change hooks, consulted before each commit.
pub struct ComboboxHooks<T> {
    /// Selection-commit veto.
    pub on_selected_value_change: Option<SelectionHook<T>>,
    /// Input-change veto.
    pub on_input_value_change: Option<InputHook>,
    /// Open/close veto.
    pub on_open_change: Option<OpenHook>,
    /// Highlight observation.
    pub on_item_highlighted: Option<HighlightHook<T>>,
}

impl<T> Default for ComboboxHooks<T> {
    fn default() -> Self {
        Self {
            on_selected_value_change: None,
            on_input_value_change: None,
            on_open_change: None,
            on_item_highlighted: None,
        }
    }
}

impl<T> std::fmt::Debug for ComboboxHooks<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComboboxHooks")
            .field("selection", &self.on_selected_value_change.is_some())
            .field("input", &self.on_input_value_change.is_some())
            .field("open", &self.on_open_change.is_some())
            .field("highlight", &self.on_item_highlighted.is_some())
            .finish()
    }
}

/// Signals emitted after each state commit settles.
pub struct ComboboxSignals<T> {
    /// The committed selection changed.
    pub selected_value_changed: Signal<SelectedValue<T>>,
    /// The input text changed.
    pub input_value_changed: Signal<String>,
    /// The popup opened or closed.
    pub open_changed: Signal<bool>,
    /// The highlighted item logically changed.
    pub item_highlighted: Signal<HighlightChange<T>>,
}

impl<T> Default for ComboboxSignals<T> {
    fn default() -> Self {
        Self {
            selected_value_changed: Signal::new(),
            input_value_changed: Signal::new(),
            open_changed: Signal::new(),
            item_highlighted: Signal::new(),
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// The complete interaction state, owned by the root's store.
#[derive(Debug)]
pub struct ComboboxState<T> {
    /// Popup lifecycle.
    pub open: OpenState,
    /// Selection machine state.
    pub selection: SelectionState<T>,
    /// Index tracker state.
    pub highlight: HighlightState,
    /// Highlighted chip index during chip keyboard navigation.
    pub highlighted_chip: Option<usize>,
    /// What caused the current open, while open.
    pub open_reason: Option<OpenChangeReason>,
    /// The derived visible list.
    pub filtered: Arc<FilteredItems<T>>,
}

/// A deferred observable emission, announced after the store settles.
pub(crate) enum Emission<T> {
    Open(bool),
    Input {
        text: String,
        reason: InputChangeReason,
        /// Forced synchronizations still invoke the input hook, for
        /// observation only.
        invoke_hook: bool,
    },
    Selection(SelectedValue<T>),
    Highlight(HighlightChange<T>),
}

/// Result of an open/close request, as the event router needs it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpenRequestOutcome {
    /// The request committed (was not vetoed).
    pub(crate) committed: bool,
    /// The open hook asked to let the native event keep propagating.
    pub(crate) allow_propagation: bool,
}

pub(crate) struct ComboboxInner<T: ComboboxValue> {
    pub(crate) id: String,
    pub(crate) config: ComboboxConfig<T>,
    pub(crate) policy: SelectionPolicy<T>,
    pub(crate) hooks: ComboboxHooks<T>,
    pub(crate) signals: ComboboxSignals<T>,
    pub(crate) store: Store<ComboboxState<T>>,
    pub(crate) source: Mutex<ItemSource<T>>,
    pub(crate) engine: Mutex<DerivedItemsEngine<T>>,
    pub(crate) registry: Mutex<ItemRegistry<T>>,
    pub(crate) tracker: Mutex<HighlightTracker<T>>,
    pub(crate) lifecycle: Mutex<LifecycleController>,
    pub(crate) composition: Mutex<Option<String>>,
    pub(crate) transitions: SharedTransitionObserver,
    pub(crate) anchor: Option<SharedAnchorPositioning>,
    pub(crate) form: Option<SharedFormField>,
}

impl<T: ComboboxValue> ComboboxInner<T> {
    /// Which filter mode the current state calls for.
    ///
    /// Single mode with a committed selection and an unedited query keeps
    /// showing the full list: the input text still *represents* the
    /// selection rather than a filter.
    fn filter_mode(&self, state: &ComboboxState<T>) -> FilterMode {
        if self.config.filter.is_none() {
            return FilterMode::Passthrough;
        }
        let selection_represented = self.config.mode == SelectionMode::Single
            && !state.selection.selected.is_empty()
            && !state.selection.query_changed_after_open;
        if selection_represented {
            FilterMode::SelectionAware
        } else {
            FilterMode::Substring
        }
    }

    /// Recompute the derived list, rebuild the registry, and re-clamp
    /// indices. Collected emissions are announced later by
    /// [`settle`](Self::settle).
    pub(crate) fn refresh_derived(&self, emissions: &mut Vec<Emission<T>>) {
        let (query, mode) = self
            .store
            .with(|s| (Query::from_input(&s.selection.input_value), self.filter_mode(s)));

        let filtered = {
            let source = self.source.lock();
            self.engine
                .lock()
                .derive(&source, &query, mode, self.config.limit)
        };

        let visible = filtered.flatten();
        self.registry.lock().rebuild(visible.clone());

        let change = self.store.update_silent(|s| {
            s.filtered = filtered.clone();
            self.tracker
                .lock()
                .sync_bounds(&mut s.highlight, &visible, query.is_empty())
        });
        if let Some(change) = change {
            emissions.push(Emission::Highlight(change));
        }
    }

    /// Notify store subscribers, then announce the collected emissions in
    /// order. Runs with no lock held, so observers may dispatch follow-up
    /// actions.
    pub(crate) fn settle(&self, emissions: Vec<Emission<T>>) {
        self.store.notify();
        for emission in emissions {
            match emission {
                Emission::Open(open) => self.signals.open_changed.emit(open),
                Emission::Input {
                    text,
                    reason,
                    invoke_hook,
                } => {
                    if invoke_hook {
                        if let Some(hook) = &self.hooks.on_input_value_change {
                            let mut details = ChangeDetails::new(reason);
                            hook(&text, &mut details);
                        }
                    }
                    self.signals.input_value_changed.emit(text);
                }
                Emission::Selection(value) => self.signals.selected_value_changed.emit(value),
                Emission::Highlight(change) => {
                    if let Some(hook) = &self.hooks.on_item_highlighted {
                        hook(change.item.as_ref(), change.provenance);
                    }
                    self.signals.item_highlighted.emit(change);
                }
            }
        }
    }

    /// The text a form submission carries for the current selection.
    pub(crate) fn submission_text(&self, state: &SelectionState<T>) -> String {
        match &state.selected {
            SelectedValue::None => state.input_value.clone(),
            SelectedValue::Single(value) => value
                .as_ref()
                .map(|v| self.policy.stringify.value_of(v))
                .unwrap_or_default(),
            SelectedValue::Multiple(values) => values
                .iter()
                .map(|v| self.policy.stringify.value_of(v))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Mark the bound form field dirty and, in on-change validation mode,
    /// run validation against the new submission value.
    pub(crate) fn commit_to_form(&self) {
        if let Some(form) = &self.form {
            form.set_dirty(true);
            form.set_touched(true);
            if self.config.validation_mode == ValidationMode::OnChange {
                let text = self.store.with(|s| self.submission_text(&s.selection));
                form.commit(&text);
            }
        }
    }

    pub(crate) fn complete_open(&self, epoch: u64) {
        let finished = self
            .store
            .update_silent(|s| self.lifecycle.lock().finish_open(&mut s.open, epoch));
        if finished {
            self.store.notify();
        }
    }

    pub(crate) fn complete_close(&self, epoch: u64) {
        let finished = self
            .store
            .update_silent(|s| self.lifecycle.lock().finish_close(&mut s.open, epoch));
        if finished {
            self.run_unmount();
        }
    }

    /// The unmount sequence, run exactly once per completed close: reset
    /// indices and chip navigation, forget the open reason, reconcile the
    /// input, then recompute the derived list for the next open.
    fn run_unmount(&self) {
        let mut emissions = Vec::new();
        let (highlight_change, forced_input) = self.store.update_silent(|s| {
            let highlight_change = self.tracker.lock().reset(&mut s.highlight);
            s.highlighted_chip = None;
            s.open_reason = None;
            s.selection.query_changed_after_open = false;

            let before = s.selection.input_value.clone();
            let outcome = self.policy.reconcile_on_close(&mut s.selection);
            debug!(target: COMBOBOX, ?outcome, "popup unmounted");
            let forced =
                (s.selection.input_value != before).then(|| s.selection.input_value.clone());
            (highlight_change, forced)
        });

        if let Some(change) = highlight_change {
            emissions.push(Emission::Highlight(change));
        }
        if let Some(text) = forced_input {
            emissions.push(Emission::Input {
                text,
                reason: InputChangeReason::CloseReconciliation,
                invoke_hook: true,
            });
        }
        self.refresh_derived(&mut emissions);
        self.settle(emissions);
    }
}

// ============================================================================
// Root handle
// ============================================================================

/// A headless combobox/autocomplete interaction root.
///
/// Cheap to clone; clones share the same underlying state.
pub struct Combobox<T: ComboboxValue> {
    pub(crate) inner: Arc<ComboboxInner<T>>,
}

impl<T: ComboboxValue> Clone for Combobox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ComboboxValue> std::fmt::Debug for Combobox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Combobox").field("id", &self.inner.id).finish()
    }
}

/// A weak handle to a combobox root, held by parts that must not keep the
/// root alive.
pub struct ComboboxHandle<T: ComboboxValue> {
    inner: Weak<ComboboxInner<T>>,
}

impl<T: ComboboxValue> Clone for ComboboxHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ComboboxValue> ComboboxHandle<T> {
    /// Upgrade to the root, failing if the root was dropped.
    pub fn upgrade(&self) -> Result<Combobox<T>> {
        self.inner
            .upgrade()
            .map(|inner| Combobox { inner })
            .ok_or(ComboboxError::RootNotMounted)
    }
}

static NEXT_ROOT_ID: AtomicU64 = AtomicU64::new(0);

impl<T: ComboboxValue> Combobox<T> {
    /// Start building a combobox root.
    pub fn builder() -> ComboboxBuilder<T> {
        ComboboxBuilder::new()
    }

    /// A default-configured root over a flat item list.
    pub fn new(items: Vec<T>) -> Self {
        Self::builder().with_items(items).build()
    }

    /// Stable id prefix used for the generated ARIA element ids.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// A weak handle for parts.
    pub fn handle(&self) -> ComboboxHandle<T> {
        ComboboxHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The root's signals.
    pub fn signals(&self) -> &ComboboxSignals<T> {
        &self.inner.signals
    }

    /// The root's state store, for fine-grained part subscriptions.
    pub fn store(&self) -> &Store<ComboboxState<T>> {
        &self.inner.store
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Whether the popup is logically open.
    pub fn open(&self) -> bool {
        self.inner.store.with(|s| s.open.open)
    }

    /// Whether the popup is mounted (may outlive `open` through the exit
    /// transition).
    pub fn mounted(&self) -> bool {
        self.inner.store.with(|s| s.open.mounted)
    }

    /// Current animation phase.
    pub fn transition_status(&self) -> TransitionStatus {
        self.inner.store.with(|s| s.open.transition_status)
    }

    /// What caused the current open, while open.
    pub fn open_reason(&self) -> Option<OpenChangeReason> {
        self.inner.store.with(|s| s.open_reason)
    }

    /// The current input text.
    pub fn input_value(&self) -> String {
        self.inner.store.with(|s| s.selection.input_value.clone())
    }

    /// The committed selection.
    pub fn selected_value(&self) -> SelectedValue<T> {
        self.inner.store.with(|s| s.selection.selected.clone())
    }

    /// The highlighted index into the visible list.
    pub fn active_index(&self) -> Option<usize> {
        self.inner.store.with(|s| s.highlight.active_index)
    }

    /// The committed selection's index within the visible list.
    pub fn selected_index(&self) -> Option<usize> {
        self.inner.store.with(|s| s.highlight.selected_index)
    }

    /// The highlighted item.
    pub fn highlighted_item(&self) -> Option<T> {
        self.inner.store.with(|s| {
            s.highlight
                .active_index
                .and_then(|i| s.filtered.flatten().into_iter().nth(i))
        })
    }

    /// The highlighted chip index during chip keyboard navigation.
    pub fn highlighted_chip(&self) -> Option<usize> {
        self.inner.store.with(|s| s.highlighted_chip)
    }

    /// The derived visible list, shared.
    pub fn filtered_items(&self) -> Arc<FilteredItems<T>> {
        self.inner.store.with(|s| s.filtered.clone())
    }

    /// The visible items in order.
    pub fn visible_items(&self) -> Vec<T> {
        self.inner.registry.lock().items().to_vec()
    }

    /// The label completion for the highlighted item, when it extends the
    /// current query as a prefix match. Hosts use this for inline
    /// ghost-text completion.
    pub fn inline_completion(&self) -> Option<String> {
        let filter = self.inner.config.filter.clone()?;
        let (input, item) = self.inner.store.with(|s| {
            let item = s
                .highlight
                .active_index
                .and_then(|i| s.filtered.flatten().into_iter().nth(i));
            (s.selection.input_value.clone(), item)
        });
        let label = self.inner.policy.stringify.label_of(&item?);
        let query = Query::from_input(&input);
        (!query.is_empty() && filter.starts_with(&label, query.as_str())).then_some(label)
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Replace the item list.
    pub fn set_items(&self, items: Vec<T>) {
        self.replace_source(ItemSource::Flat(items));
    }

    /// Replace the item list with grouped items.
    pub fn set_grouped_items(&self, groups: Vec<Group<T>>) {
        self.replace_source(ItemSource::Grouped(groups));
    }

    fn replace_source(&self, source: ItemSource<T>) {
        *self.inner.source.lock() = source;
        self.inner.engine.lock().invalidate_items();
        let mut emissions = Vec::new();
        self.inner.refresh_derived(&mut emissions);
        self.inner.settle(emissions);
    }

    /// Set the input text. Returns `false` if a hook vetoed the change.
    pub fn set_input_value(&self, text: impl Into<String>) -> bool {
        self.set_input_with_reason(text.into(), InputChangeReason::Programmatic)
    }

    pub(crate) fn set_input_with_reason(&self, next: String, reason: InputChangeReason) -> bool {
        let unchanged = self.inner.store.with(|s| s.selection.input_value == next);
        if unchanged {
            return true;
        }
        if let Some(hook) = &self.inner.hooks.on_input_value_change {
            let mut details = ChangeDetails::new(reason);
            hook(&next, &mut details);
            if details.is_canceled() {
                return false;
            }
        }

        self.inner.store.update_silent(|s| {
            let open = s.open.open;
            self.inner
                .policy
                .apply_input(&mut s.selection, next.clone(), open);
            // Editing text leaves chip navigation.
            s.highlighted_chip = None;
        });

        let mut emissions = vec![Emission::Input {
            text: next,
            reason,
            invoke_hook: false,
        }];
        self.inner.refresh_derived(&mut emissions);
        self.inner.settle(emissions);
        true
    }

    /// Commit a selection, reshaping the value to the configured mode.
    /// Returns `false` if a hook vetoed the commit.
    pub fn set_selected_value(&self, next: SelectedValue<T>) -> bool {
        self.set_selected_with_reason(next, SelectionChangeReason::Programmatic)
    }

    /// Commit a selection, rejecting values whose shape does not match the
    /// configured mode.
    pub fn try_set_selected_value(&self, next: SelectedValue<T>) -> Result<bool> {
        if next.mode() != self.inner.config.mode {
            return Err(ComboboxError::ShapeMismatch {
                mode: self.inner.config.mode,
            });
        }
        Ok(self.set_selected_with_reason(next, SelectionChangeReason::Programmatic))
    }

    pub(crate) fn set_selected_with_reason(
        &self,
        next: SelectedValue<T>,
        reason: SelectionChangeReason,
    ) -> bool {
        let next = self.inner.policy.normalize(next);
        let unchanged = self.inner.store.with(|s| s.selection.selected == next);
        if unchanged {
            return true;
        }
        if let Some(hook) = &self.inner.hooks.on_selected_value_change {
            let mut details = ChangeDetails::new(reason);
            hook(&next, &mut details);
            if details.is_canceled() {
                return false;
            }
        }

        let effect = self
            .inner
            .store
            .update_silent(|s| self.inner.policy.apply_commit(&mut s.selection, next.clone()));
        debug!(target: COMBOBOX, ?reason, "selection committed");

        let mut emissions = vec![Emission::Selection(next)];
        if let Some(text) = effect.input_synced {
            emissions.push(Emission::Input {
                text,
                reason: InputChangeReason::SelectionSync,
                invoke_hook: true,
            });
        }
        self.inner.refresh_derived(&mut emissions);
        self.inner.settle(emissions);
        self.inner.commit_to_form();
        true
    }

    /// Select (or, in multiple mode, toggle) one item.
    pub fn select_item(&self, item: &T) -> bool {
        self.select_item_with_reason(item, SelectionChangeReason::Programmatic)
    }

    pub(crate) fn select_item_with_reason(
        &self,
        item: &T,
        reason: SelectionChangeReason,
    ) -> bool {
        match self.inner.config.mode {
            SelectionMode::Single => {
                self.set_selected_with_reason(SelectedValue::Single(Some(item.clone())), reason)
            }
            SelectionMode::Multiple => {
                let next = self
                    .inner
                    .store
                    .with(|s| self.inner.policy.toggle(&s.selection.selected, item));
                self.set_selected_with_reason(next, reason)
            }
            SelectionMode::None => {
                if self.inner.config.fill_input_on_press {
                    let label = self.inner.policy.stringify.label_of(item);
                    self.set_input_with_reason(label, InputChangeReason::SelectionSync)
                } else {
                    true
                }
            }
        }
    }

    /// Drop leftover filter text after a commit. An explicit follow-up
    /// action so committing never re-filters mid-interaction.
    pub fn clear_query_after_commit(&self) {
        let cleared = self
            .inner
            .store
            .update_silent(|s| self.inner.policy.clear_query_after_commit(&mut s.selection));
        if cleared {
            let mut emissions = vec![Emission::Input {
                text: String::new(),
                reason: InputChangeReason::QueryCleared,
                invoke_hook: true,
            }];
            self.inner.refresh_derived(&mut emissions);
            self.inner.settle(emissions);
        }
    }

    /// Open or close the popup. Returns `false` if a hook vetoed the change.
    pub fn set_open(&self, open: bool) -> bool {
        self.set_open_with_reason(open, OpenChangeReason::Programmatic)
    }

    pub(crate) fn set_open_with_reason(&self, open: bool, reason: OpenChangeReason) -> bool {
        self.set_open_internal(open, reason).committed
    }

    pub(crate) fn set_open_internal(
        &self,
        open: bool,
        reason: OpenChangeReason,
    ) -> OpenRequestOutcome {
        let unchanged = self.inner.store.with(|s| s.open.open == open);
        if unchanged {
            return OpenRequestOutcome {
                committed: true,
                allow_propagation: false,
            };
        }
        let mut allow_propagation = false;
        if let Some(hook) = &self.inner.hooks.on_open_change {
            let mut details = ChangeDetails::new(reason);
            hook(open, &mut details);
            allow_propagation = details.is_propagation_allowed();
            if details.is_canceled() {
                return OpenRequestOutcome {
                    committed: false,
                    allow_propagation,
                };
            }
        }

        let epoch = self.inner.store.update_silent(|s| {
            let mut lifecycle = self.inner.lifecycle.lock();
            if open {
                let epoch = lifecycle.request_open(&mut s.open);
                if epoch.is_some() {
                    s.open_reason = Some(reason);
                    // Text applied before the open (typing in a closed
                    // combobox, programmatic input) counts as a query edit
                    // unless it reads back the committed selection.
                    s.selection.query_changed_after_open =
                        !self.inner.policy.input_represents_selection(&s.selection);
                }
                epoch
            } else {
                lifecycle.request_close(&mut s.open)
            }
        });
        let Some(epoch) = epoch else {
            return OpenRequestOutcome {
                committed: true,
                allow_propagation,
            };
        };
        debug!(target: COMBOBOX, open, ?reason, "open state changed");

        let mut emissions = vec![Emission::Open(open)];
        if open {
            self.inner.refresh_derived(&mut emissions);
        }
        self.inner.settle(emissions);

        let weak = Arc::downgrade(&self.inner);
        self.inner.transitions.await_settled(
            open,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    if open {
                        inner.complete_open(epoch);
                    } else {
                        inner.complete_close(epoch);
                    }
                }
            }),
        );
        OpenRequestOutcome {
            committed: true,
            allow_propagation,
        }
    }

    /// Apply an explicit index update. Out-of-range requests clamp to
    /// `None`.
    pub fn set_indices(&self, update: IndexUpdate) {
        let visible = self.visible_items();
        let change = self
            .inner
            .store
            .update_silent(|s| self.inner.tracker.lock().apply(&mut s.highlight, &visible, update));
        let mut emissions = Vec::new();
        if let Some(change) = change {
            emissions.push(Emission::Highlight(change));
        }
        self.inner.settle(emissions);
    }

    /// Move chip keyboard navigation. Out-of-range indices clear it.
    pub fn set_highlighted_chip(&self, chip: Option<usize>) {
        self.inner.store.update(|s| {
            let count = s.selection.selected.multiple().len();
            s.highlighted_chip = chip.filter(|&i| i < count);
        });
    }

    /// Remove the chip at `index` from a multiple-mode selection.
    pub fn remove_chip(&self, index: usize) -> bool {
        let Some(item) = self
            .inner
            .store
            .with(|s| s.selection.selected.multiple().get(index).cloned())
        else {
            return false;
        };
        let committed = self.select_item_with_reason(&item, SelectionChangeReason::ChipRemoval);
        if committed {
            self.set_highlighted_chip(None);
        }
        committed
    }

    /// Register an activation handle for the visible item at `index`.
    pub fn register_item_handle(&self, index: usize, handle: ItemHandle) -> bool {
        self.inner.registry.lock().register_handle(index, handle)
    }

    // ------------------------------------------------------------------
    // Part props
    // ------------------------------------------------------------------

    /// Props for the text input part.
    pub fn input_props(&self) -> InputProps {
        let (open, mounted, value, active) = self.inner.store.with(|s| {
            (
                s.open.open,
                s.open.mounted,
                s.selection.input_value.clone(),
                s.highlight.active_index,
            )
        });
        let form = self.inner.form.as_ref();
        InputProps {
            role: "combobox",
            aria_expanded: open,
            aria_controls: mounted.then(|| format!("{}-list", self.inner.id)),
            aria_activedescendant: active.map(|i| format!("{}-item-{}", self.inner.id, i)),
            aria_autocomplete: "list",
            value,
            disabled: form.map_or(false, |f| f.disabled()),
            read_only: form.map_or(false, |f| f.read_only()),
            required: form.map_or(false, |f| f.required()),
        }
    }

    /// Props for the trigger button part.
    pub fn trigger_props(&self) -> TriggerProps {
        TriggerProps {
            aria_haspopup: "listbox",
            aria_expanded: self.open(),
            disabled: self.inner.form.as_ref().map_or(false, |f| f.disabled()),
        }
    }

    /// Props for the listbox popup part.
    pub fn list_props(&self) -> ListProps {
        let (mounted, status) = self
            .inner
            .store
            .with(|s| (s.open.mounted, s.open.transition_status));
        let readback = self
            .inner
            .anchor
            .as_ref()
            .map(|a| a.readback())
            .unwrap_or_default();
        ListProps {
            role: "listbox",
            id: format!("{}-list", self.inner.id),
            aria_multiselectable: self.inner.config.mode == SelectionMode::Multiple,
            mounted,
            transition_status: status,
            data_side: readback.side,
            data_align: readback.align,
            data_anchor_hidden: readback.anchor_hidden,
        }
    }

    /// Props for the visible item at `index`, or `None` if out of range.
    pub fn item_props(&self, index: usize) -> Option<ItemProps> {
        let item = self.inner.registry.lock().get(index).cloned()?;
        let (active, selected) = self.inner.store.with(|s| {
            let selected = match &s.selection.selected {
                SelectedValue::None => false,
                SelectedValue::Single(value) => value
                    .as_ref()
                    .map_or(false, |v| self.inner.config.comparer.eq(v, &item)),
                SelectedValue::Multiple(values) => {
                    values.iter().any(|v| self.inner.config.comparer.eq(v, &item))
                }
            };
            (s.highlight.active_index, selected)
        });
        Some(ItemProps {
            role: "option",
            id: format!("{}-item-{}", self.inner.id, index),
            aria_selected: selected,
            highlighted: active == Some(index),
        })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Combobox`] roots.
pub struct ComboboxBuilder<T: ComboboxValue> {
    config: ComboboxConfig<T>,
    hooks: ComboboxHooks<T>,
    source: ItemSource<T>,
    initial_selected: Option<SelectedValue<T>>,
    initial_input: Option<String>,
    transitions: SharedTransitionObserver,
    anchor: Option<SharedAnchorPositioning>,
    form: Option<SharedFormField>,
}

impl<T: ComboboxValue> Default for ComboboxBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ComboboxValue> ComboboxBuilder<T> {
    /// A builder with default configuration and no items.
    pub fn new() -> Self {
        Self {
            config: ComboboxConfig::default(),
            hooks: ComboboxHooks::default(),
            source: ItemSource::default(),
            initial_selected: None,
            initial_input: None,
            transitions: Arc::new(ImmediateTransitions),
            anchor: None,
            form: None,
        }
    }

    /// Set the selection mode.
    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set flat items.
    pub fn with_items(mut self, items: Vec<T>) -> Self {
        self.source = ItemSource::Flat(items);
        self
    }

    /// Set grouped items.
    pub fn with_grouped_items(mut self, groups: Vec<Group<T>>) -> Self {
        self.source = ItemSource::Grouped(groups);
        self
    }

    /// Set the auto-highlight policy.
    pub fn with_auto_highlight(mut self, auto: AutoHighlight) -> Self {
        self.config.auto_highlight = auto;
        self
    }

    /// Cap the derived item count.
    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.config.limit = limit;
        self
    }

    /// Use an explicit text matcher.
    pub fn with_filter(mut self, filter: Arc<Filter>) -> Self {
        self.config.filter = Some(filter);
        self
    }

    /// Disable filtering entirely (the host filters, or the list is static).
    pub fn without_filter(mut self) -> Self {
        self.config.filter = None;
        self
    }

    /// Set the input placement.
    pub fn with_input_placement(mut self, placement: InputPlacement) -> Self {
        self.config.input_placement = placement;
        self
    }

    /// Replace the item equality comparer.
    pub fn with_comparer(mut self, comparer: ItemEq<T>) -> Self {
        self.config.comparer = comparer;
        self
    }

    /// Replace the item-to-text conversion.
    pub fn with_stringifier(mut self, stringify: Stringifier<T>) -> Self {
        self.config.stringify = stringify;
        self
    }

    /// In none mode, pressing an item fills the input with its label.
    pub fn with_fill_input_on_press(mut self, fill: bool) -> Self {
        self.config.fill_input_on_press = fill;
        self
    }

    /// Whether clicking the input opens the popup.
    pub fn with_open_on_input_click(mut self, open: bool) -> Self {
        self.config.open_on_input_click = open;
        self
    }

    /// Whether typing in a closed combobox opens the popup.
    pub fn with_open_on_input_change(mut self, open: bool) -> Self {
        self.config.open_on_input_change = open;
        self
    }

    /// Declare that the host renders an empty-state panel for zero matches.
    pub fn with_empty_state_ui(mut self, has: bool) -> Self {
        self.config.has_empty_state_ui = has;
        self
    }

    /// Set the form validation mode.
    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.config.validation_mode = mode;
        self
    }

    /// Install a transition observer.
    pub fn with_transition_observer(
        mut self,
        observer: impl TransitionObserver + 'static,
    ) -> Self {
        self.transitions = Arc::new(observer);
        self
    }

    /// Install an anchor-positioning collaborator.
    pub fn with_anchor_positioning(mut self, anchor: impl AnchorPositioning + 'static) -> Self {
        self.anchor = Some(Arc::new(anchor));
        self
    }

    /// Bind a form-field collaborator.
    pub fn with_form_field(mut self, form: SharedFormField) -> Self {
        self.form = Some(form);
        self
    }

    /// Set the initial selection (normalized to the configured mode).
    pub fn with_selected_value(mut self, value: SelectedValue<T>) -> Self {
        self.initial_selected = Some(value);
        self
    }

    /// Set the initial input text.
    pub fn with_input_value(mut self, text: impl Into<String>) -> Self {
        self.initial_input = Some(text.into());
        self
    }

    /// Install the selection-commit veto hook.
    pub fn on_selected_value_change(
        mut self,
        hook: impl Fn(&SelectedValue<T>, &mut ChangeDetails<SelectionChangeReason>) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_selected_value_change = Some(Arc::new(hook));
        self
    }

    /// Install the input-change veto hook.
    pub fn on_input_value_change(
        mut self,
        hook: impl Fn(&str, &mut ChangeDetails<InputChangeReason>) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_input_value_change = Some(Arc::new(hook));
        self
    }

    /// Install the open/close veto hook.
    pub fn on_open_change(
        mut self,
        hook: impl Fn(bool, &mut ChangeDetails<OpenChangeReason>) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_open_change = Some(Arc::new(hook));
        self
    }

    /// Install the highlight observation hook.
    pub fn on_item_highlighted(
        mut self,
        hook: impl Fn(Option<&T>, HighlightProvenance) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_item_highlighted = Some(Arc::new(hook));
        self
    }

    /// Build the root.
    pub fn build(self) -> Combobox<T> {
        let id = format!(
            "keel-combobox-{}",
            NEXT_ROOT_ID.fetch_add(1, Ordering::Relaxed)
        );

        let policy = SelectionPolicy {
            mode: self.config.mode,
            comparer: self.config.comparer.clone(),
            stringify: self.config.stringify.clone(),
            input_placement: self.config.input_placement,
            fill_input_on_press: self.config.fill_input_on_press,
        };

        let mut selection = SelectionState::new(self.config.mode);
        if let Some(value) = self.initial_selected {
            policy.apply_commit(&mut selection, value);
        }
        if let Some(text) = self.initial_input {
            selection.input_value = text;
        }

        let matcher = self.config.filter.clone().unwrap_or_else(Filter::system);
        let engine = DerivedItemsEngine::new(matcher, self.config.stringify.label_fn());
        let registry = ItemRegistry::new(self.config.comparer.clone());
        let tracker = HighlightTracker::new(self.config.comparer.clone(), self.config.auto_highlight);

        let state = ComboboxState {
            open: OpenState::default(),
            selection,
            highlight: HighlightState::default(),
            highlighted_chip: None,
            open_reason: None,
            filtered: Arc::new(FilteredItems::empty()),
        };

        let inner = Arc::new(ComboboxInner {
            id,
            config: self.config,
            policy,
            hooks: self.hooks,
            signals: ComboboxSignals::default(),
            store: Store::new(state),
            source: Mutex::new(self.source),
            engine: Mutex::new(engine),
            registry: Mutex::new(registry),
            tracker: Mutex::new(tracker),
            lifecycle: Mutex::new(LifecycleController::new()),
            composition: Mutex::new(None),
            transitions: self.transitions,
            anchor: self.anchor,
            form: self.form,
        });

        // Seed the derived list so accessors are valid before the first
        // interaction. Nothing can be connected yet, so emissions are moot.
        inner.refresh_derived(&mut Vec::new());

        Combobox { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn fruits() -> Vec<String> {
        vec!["Apple".to_string(), "Banana".to_string(), "Cherry".to_string()]
    }

    #[test]
    fn test_builder_defaults() {
        let combobox = Combobox::new(fruits());
        assert!(!combobox.open());
        assert!(!combobox.mounted());
        assert_eq!(combobox.input_value(), "");
        assert_eq!(combobox.selected_value(), SelectedValue::Single(None));
        assert_eq!(combobox.visible_items(), fruits());
    }

    #[test]
    fn test_typing_filters_visible_items() {
        let combobox = Combobox::new(fruits());
        assert!(combobox.set_input_value("an"));
        assert_eq!(combobox.visible_items(), vec!["Banana".to_string()]);

        assert!(combobox.set_input_value(""));
        assert_eq!(combobox.visible_items(), fruits());
    }

    #[test]
    fn test_select_item_syncs_outside_input() {
        let combobox = Combobox::new(fruits());
        let inputs = Arc::new(Mutex::new(Vec::new()));
        let inputs_clone = inputs.clone();
        combobox.signals().input_value_changed.connect(move |text| {
            inputs_clone.lock().push(text.clone());
        });

        assert!(combobox.select_item(&"Banana".to_string()));
        assert_eq!(
            combobox.selected_value(),
            SelectedValue::Single(Some("Banana".to_string()))
        );
        assert_eq!(combobox.input_value(), "Banana");
        assert_eq!(inputs.lock().clone(), vec!["Banana".to_string()]);
    }

    #[test]
    fn test_open_close_with_immediate_transitions() {
        let combobox = Combobox::new(fruits());
        let opens = Arc::new(Mutex::new(Vec::new()));
        let opens_clone = opens.clone();
        combobox.signals().open_changed.connect(move |&open| {
            opens_clone.lock().push(open);
        });

        assert!(combobox.set_open(true));
        assert!(combobox.open());
        assert!(combobox.mounted());
        assert_eq!(combobox.transition_status(), TransitionStatus::Idle);
        assert_eq!(combobox.open_reason(), Some(OpenChangeReason::Programmatic));

        assert!(combobox.set_open(false));
        assert!(!combobox.open());
        // Immediate transitions: the exit settles synchronously.
        assert!(!combobox.mounted());
        assert_eq!(combobox.open_reason(), None);
        assert_eq!(opens.lock().clone(), vec![true, false]);
    }

    #[test]
    fn test_open_veto_hook() {
        let combobox = Combobox::<String>::builder()
            .with_items(fruits())
            .on_open_change(|_open, details| details.cancel())
            .build();

        assert!(!combobox.set_open(true));
        assert!(!combobox.open());
    }

    #[test]
    fn test_selection_veto_commits_nothing() {
        let combobox = Combobox::<String>::builder()
            .with_items(fruits())
            .on_selected_value_change(|value, details| {
                if value.single().map(String::as_str) == Some("Cherry") {
                    details.cancel();
                }
            })
            .build();

        assert!(!combobox.select_item(&"Cherry".to_string()));
        assert_eq!(combobox.selected_value(), SelectedValue::Single(None));
        assert_eq!(combobox.input_value(), "");

        assert!(combobox.select_item(&"Apple".to_string()));
        assert_eq!(
            combobox.selected_value(),
            SelectedValue::Single(Some("Apple".to_string()))
        );
    }

    #[test]
    fn test_close_reconciliation_restores_selection_text() {
        let combobox = Combobox::new(fruits());
        combobox.select_item(&"Banana".to_string());

        combobox.set_open(true);
        combobox.set_input_value("Ban");
        assert_eq!(combobox.input_value(), "Ban");

        combobox.set_open(false);
        assert_eq!(combobox.input_value(), "Banana");
    }

    #[test]
    fn test_close_reconciliation_abandons_filter() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);
        combobox.set_input_value("Ban");

        combobox.set_open(false);
        assert_eq!(combobox.input_value(), "");
    }

    #[test]
    fn test_try_set_selected_value_rejects_shape_mismatch() {
        let combobox = Combobox::new(fruits());
        let result =
            combobox.try_set_selected_value(SelectedValue::Multiple(vec!["Apple".to_string()]));
        assert_eq!(
            result,
            Err(ComboboxError::ShapeMismatch {
                mode: SelectionMode::Single
            })
        );

        assert!(combobox
            .try_set_selected_value(SelectedValue::Single(Some("Apple".to_string())))
            .unwrap());
    }

    #[test]
    fn test_multiple_mode_toggle_and_chips() {
        let combobox = Combobox::<String>::builder()
            .with_items(fruits())
            .with_mode(SelectionMode::Multiple)
            .build();

        combobox.select_item(&"Apple".to_string());
        combobox.select_item(&"Banana".to_string());
        assert_eq!(
            combobox.selected_value().multiple(),
            ["Apple".to_string(), "Banana".to_string()]
        );

        combobox.set_highlighted_chip(Some(1));
        assert_eq!(combobox.highlighted_chip(), Some(1));

        assert!(combobox.remove_chip(0));
        assert_eq!(combobox.selected_value().multiple(), ["Banana".to_string()]);
        assert_eq!(combobox.highlighted_chip(), None);

        assert!(!combobox.remove_chip(5));
    }

    #[test]
    fn test_selection_aware_shows_full_list_until_query_edit() {
        let combobox = Combobox::new(fruits());
        combobox.select_item(&"Banana".to_string());

        // Input reads "Banana" but it represents the selection, not a query.
        combobox.set_open(true);
        assert_eq!(combobox.visible_items().len(), 3);

        // Editing after open switches to real filtering.
        combobox.set_input_value("Ban");
        assert_eq!(combobox.visible_items(), vec!["Banana".to_string()]);
    }

    #[test]
    fn test_input_change_auto_highlight_clears_with_query() {
        let combobox = Combobox::<String>::builder()
            .with_items(fruits())
            .with_auto_highlight(AutoHighlight::InputChange)
            .build();
        combobox.set_open(true);

        combobox.set_input_value("a");
        assert_eq!(combobox.active_index(), Some(0));

        combobox.set_input_value("");
        assert_eq!(combobox.active_index(), None);
    }

    #[test]
    fn test_set_indices_and_highlight_signal() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);

        let fires = Arc::new(AtomicUsize::new(0));
        let fires_clone = fires.clone();
        combobox.signals().item_highlighted.connect(move |_| {
            fires_clone.fetch_add(1, Ordering::SeqCst);
        });

        combobox.set_indices(IndexUpdate::active(
            crate::combobox::highlight::IndexSlot::At(1),
            HighlightProvenance::Keyboard,
        ));
        assert_eq!(combobox.active_index(), Some(1));
        assert_eq!(combobox.highlighted_item(), Some("Banana".to_string()));
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inline_completion_requires_prefix_match() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);
        combobox.set_input_value("Che");
        combobox.set_indices(IndexUpdate::active(
            crate::combobox::highlight::IndexSlot::At(0),
            HighlightProvenance::Keyboard,
        ));
        assert_eq!(combobox.inline_completion(), Some("Cherry".to_string()));

        // Substring match without prefix: no completion.
        combobox.set_input_value("an");
        combobox.set_indices(IndexUpdate::active(
            crate::combobox::highlight::IndexSlot::At(0),
            HighlightProvenance::Keyboard,
        ));
        assert_eq!(combobox.inline_completion(), None);
    }

    #[test]
    fn test_props_carry_generated_ids() {
        let combobox = Combobox::new(fruits());

        let input = combobox.input_props();
        assert_eq!(input.role, "combobox");
        assert!(!input.aria_expanded);
        assert_eq!(input.aria_controls, None);

        combobox.set_open(true);
        combobox.set_indices(IndexUpdate::active(
            crate::combobox::highlight::IndexSlot::At(0),
            HighlightProvenance::Keyboard,
        ));

        let input = combobox.input_props();
        assert!(input.aria_expanded);
        assert_eq!(
            input.aria_controls.as_deref(),
            Some(format!("{}-list", combobox.id()).as_str())
        );
        assert_eq!(
            input.aria_activedescendant.as_deref(),
            Some(format!("{}-item-0", combobox.id()).as_str())
        );

        let list = combobox.list_props();
        assert_eq!(list.role, "listbox");
        assert!(list.mounted);
        assert!(!list.aria_multiselectable);

        combobox.select_item(&"Apple".to_string());
        let item = combobox.item_props(0).unwrap();
        assert!(item.aria_selected);
        assert!(item.highlighted);
        assert!(combobox.item_props(99).is_none());
    }

    #[test]
    fn test_handle_fails_after_root_drop() {
        let combobox = Combobox::new(fruits());
        let handle = combobox.handle();
        assert!(handle.upgrade().is_ok());

        drop(combobox);
        assert_eq!(handle.upgrade().err(), Some(ComboboxError::RootNotMounted));
    }

    #[test]
    fn test_set_items_refreshes_derived_list() {
        let combobox = Combobox::new(fruits());
        combobox.set_input_value("an");
        assert_eq!(combobox.visible_items(), vec!["Banana".to_string()]);

        combobox.set_items(vec!["Mandarin".to_string(), "Kiwi".to_string()]);
        assert_eq!(combobox.visible_items(), vec!["Mandarin".to_string()]);
    }
}
