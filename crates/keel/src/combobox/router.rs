//! Interaction event routing.
//!
//! Handlers translate raw input, keyboard, pointer, and composition events
//! into root actions. An event the router consumed is marked accepted;
//! unaccepted events should keep propagating in the host (Enter with no
//! highlight reaches the form, Escape with nothing visible reaches an outer
//! popup).
//!
//! Keyboard map, from the input part:
//!
//! | Key             | Closed                      | Open                         |
//! |-----------------|-----------------------------|------------------------------|
//! | ArrowDown       | open, highlight first       | move highlight down (wraps)  |
//! | ArrowUp         | open, highlight last        | move highlight up (wraps)    |
//! | Home / End      | -                           | highlight first / last       |
//! | Enter           | -                           | commit highlighted item      |
//! | Escape          | -                           | close                        |
//! | Backspace       | chip navigation (multiple)  | chip navigation (multiple)   |
//! | ArrowLeft/Right | chip navigation (multiple)  | chip navigation (multiple)   |

use tracing::{debug, trace};

use keel_core::logging::targets::COMBOBOX;

use crate::combobox::events::{CompositionEvent, InputChangeEvent, Key, KeyEvent, PressEvent};
use crate::combobox::highlight::{HighlightProvenance, IndexSlot, IndexUpdate};
use crate::combobox::lifecycle::OpenChangeReason;
use crate::combobox::root::{Combobox, ComboboxValue, InputChangeReason, SelectionChangeReason};
use crate::combobox::selection::SelectionMode;
use crate::combobox::collaborators::ValidationMode;

impl<T: ComboboxValue> Combobox<T> {
    // ------------------------------------------------------------------
    // Text input
    // ------------------------------------------------------------------

    /// Route a change to the input's text.
    ///
    /// During an IME composition the change is buffered and nothing is
    /// derived; autofill-looking changes try to commit an exactly matching
    /// item; ordinary typing filters and, when configured, opens the popup.
    pub fn handle_input_change(&self, event: &mut InputChangeEvent) {
        {
            let mut composition = self.inner.composition.lock();
            if composition.is_some() {
                *composition = Some(event.text.clone());
                event.base.accept();
                return;
            }
        }

        if event.is_autofill() && !event.text.is_empty() {
            self.handle_autofill(event);
            return;
        }

        let applied =
            self.set_input_with_reason(event.text.clone(), InputChangeReason::Typing);
        if !applied {
            return;
        }
        event.base.accept();

        if self.inner.config.open_on_input_change && !self.open() {
            self.set_open_with_reason(true, OpenChangeReason::InputChange);
        }
    }

    /// Autofill heuristic: commit the item whose label exactly matches the
    /// filled text, without opening the popup.
    fn handle_autofill(&self, event: &mut InputChangeEvent) {
        let matched = {
            let source = self.inner.source.lock();
            source.flatten().into_iter().find(|item| {
                let label = self.inner.policy.stringify.label_of(item);
                match &self.inner.config.filter {
                    Some(filter) => filter.matches_exactly(&label, &event.text),
                    None => label == event.text,
                }
            })
        };

        let applied =
            self.set_input_with_reason(event.text.clone(), InputChangeReason::Autofill);
        if !applied {
            return;
        }
        event.base.accept();

        if let Some(item) = matched {
            if self.inner.config.mode != SelectionMode::None {
                debug!(target: COMBOBOX, "autofill matched an item");
                self.select_item_with_reason(&item, SelectionChangeReason::Autofill);
            }
        }
    }

    // ------------------------------------------------------------------
    // IME composition
    // ------------------------------------------------------------------

    /// Route an IME composition event.
    pub fn handle_composition(&self, event: &CompositionEvent) {
        match event {
            CompositionEvent::Start => {
                let current = self.input_value();
                *self.inner.composition.lock() = Some(current);
                trace!(target: COMBOBOX, "composition started");
            }
            CompositionEvent::Update(text) => {
                let mut composition = self.inner.composition.lock();
                if composition.is_some() {
                    *composition = Some(text.clone());
                }
            }
            CompositionEvent::End(text) => {
                let was_composing = self.inner.composition.lock().take().is_some();
                if !was_composing {
                    return;
                }
                trace!(target: COMBOBOX, "composition committed");
                let applied =
                    self.set_input_with_reason(text.clone(), InputChangeReason::CompositionEnd);
                if applied && self.inner.config.open_on_input_change && !self.open() {
                    self.set_open_with_reason(true, OpenChangeReason::InputChange);
                }
            }
        }
    }

    /// Whether an IME composition is in flight.
    pub fn is_composing(&self) -> bool {
        self.inner.composition.lock().is_some()
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    /// Route a key press from the input (or trigger) part.
    pub fn handle_key(&self, event: &mut KeyEvent) {
        if event.modifiers.control || event.modifiers.alt || event.modifiers.meta {
            return;
        }
        if self.is_composing() {
            // The IME owns the keyboard until the composition ends.
            return;
        }

        if self.handle_chip_key(event) {
            return;
        }

        match event.key {
            Key::ArrowDown => self.navigate(event, Direction::Down),
            Key::ArrowUp => self.navigate(event, Direction::Up),
            Key::Home => {
                if self.open() && !self.visible_items().is_empty() {
                    self.highlight(IndexSlot::At(0));
                    event.base.accept();
                }
            }
            Key::End => {
                let count = self.visible_items().len();
                if self.open() && count > 0 {
                    self.highlight(IndexSlot::At(count - 1));
                    event.base.accept();
                }
            }
            Key::Enter => self.commit_highlighted(event),
            Key::Escape => self.dismiss(event),
            _ => {}
        }
    }

    /// Chip keyboard navigation in multiple mode while the input is empty.
    /// Returns `true` when the key was consumed by chips.
    fn handle_chip_key(&self, event: &mut KeyEvent) -> bool {
        if self.inner.config.mode != SelectionMode::Multiple || !self.input_value().is_empty() {
            return false;
        }
        let chips = self.selected_value().multiple().len();
        if chips == 0 {
            return false;
        }
        let current = self.highlighted_chip();

        match event.key {
            Key::ArrowLeft => {
                let next = match current {
                    None => chips - 1,
                    Some(0) => 0,
                    Some(i) => i - 1,
                };
                self.set_highlighted_chip(Some(next));
                event.base.accept();
                true
            }
            Key::ArrowRight => match current {
                // Caret movement in the (empty) input, not ours.
                None => false,
                Some(i) => {
                    let next = (i + 1 < chips).then_some(i + 1);
                    self.set_highlighted_chip(next);
                    event.base.accept();
                    true
                }
            },
            Key::Backspace | Key::Delete => match current {
                Some(i) => {
                    self.remove_chip(i);
                    event.base.accept();
                    true
                }
                None if event.key == Key::Backspace => {
                    self.set_highlighted_chip(Some(chips - 1));
                    event.base.accept();
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn navigate(&self, event: &mut KeyEvent, direction: Direction) {
        if !self.open() {
            let reason = match direction {
                Direction::Down => OpenChangeReason::ArrowDown,
                Direction::Up => OpenChangeReason::ArrowUp,
            };
            if !self.set_open_with_reason(true, reason) {
                return;
            }
            let count = self.visible_items().len();
            if count > 0 {
                let slot = match direction {
                    Direction::Down => IndexSlot::At(0),
                    Direction::Up => IndexSlot::At(count - 1),
                };
                self.highlight(slot);
            }
            event.base.accept();
            return;
        }

        let count = self.visible_items().len();
        if count == 0 {
            event.base.accept();
            return;
        }
        let next = match (direction, self.active_index()) {
            (Direction::Down, None) => 0,
            (Direction::Down, Some(i)) => (i + 1) % count,
            (Direction::Up, None) => count - 1,
            (Direction::Up, Some(i)) => (i + count - 1) % count,
        };
        self.highlight(IndexSlot::At(next));
        event.base.accept();
    }

    fn highlight(&self, slot: IndexSlot) {
        self.set_indices(IndexUpdate::active(slot, HighlightProvenance::Keyboard));
    }

    /// Enter: activate the highlighted item's registered handle, falling
    /// back to a plain commit. Without a highlight the event stays
    /// unaccepted so a surrounding form submit proceeds.
    fn commit_highlighted(&self, event: &mut KeyEvent) {
        if !self.open() {
            return;
        }
        let Some(index) = self.active_index() else {
            return;
        };
        event.base.accept();

        if let Some(handle) = self.inner.registry.lock().handle(index) {
            handle.activate();
            return;
        }
        let Some(item) = self.inner.registry.lock().get(index).cloned() else {
            return;
        };
        let committed = self.select_item_with_reason(&item, SelectionChangeReason::EnterKey);
        if !committed {
            return;
        }
        match self.inner.config.mode {
            SelectionMode::Multiple => self.clear_query_after_commit(),
            _ => {
                self.set_open_with_reason(false, OpenChangeReason::ItemPress);
            }
        }
    }

    /// Escape: close the popup. When nothing is visible and the host renders
    /// no empty-state panel, or the open hook allowed propagation, the event
    /// stays unaccepted so an enclosing popup can also dismiss.
    fn dismiss(&self, event: &mut KeyEvent) {
        if !self.open() {
            return;
        }
        let nothing_visible =
            self.visible_items().is_empty() && !self.inner.config.has_empty_state_ui;

        let outcome = self.set_open_internal(false, OpenChangeReason::EscapeKey);
        if !outcome.committed {
            return;
        }
        if !nothing_visible && !outcome.allow_propagation {
            event.base.accept();
        }
    }

    // ------------------------------------------------------------------
    // Pointer
    // ------------------------------------------------------------------

    /// The trigger button was pressed: toggle the popup.
    pub fn handle_trigger_press(&self, event: &mut PressEvent) {
        if self.inner.form.as_ref().map_or(false, |f| f.disabled()) {
            return;
        }
        let open = self.open();
        if self.set_open_with_reason(!open, OpenChangeReason::TriggerPress) {
            event.base.accept();
        }
    }

    /// The input itself was clicked.
    pub fn handle_input_click(&self, event: &mut PressEvent) {
        if !self.inner.config.open_on_input_click || self.open() {
            return;
        }
        if self.set_open_with_reason(true, OpenChangeReason::InputClick) {
            event.base.accept();
        }
    }

    /// The visible item at `index` was pressed.
    pub fn handle_item_press(&self, index: usize, event: &mut PressEvent) {
        let Some(item) = self.inner.registry.lock().get(index).cloned() else {
            return;
        };
        let committed = self.select_item_with_reason(&item, SelectionChangeReason::ItemPress);
        if !committed {
            return;
        }
        event.base.accept();
        match self.inner.config.mode {
            // Multiple mode keeps the popup open for further toggles.
            SelectionMode::Multiple => self.clear_query_after_commit(),
            _ => {
                self.set_open_with_reason(false, OpenChangeReason::ItemPress);
            }
        }
    }

    /// The pointer moved over the visible item at `index`.
    pub fn handle_item_hover(&self, index: usize) {
        self.set_indices(IndexUpdate::active(
            IndexSlot::At(index),
            HighlightProvenance::Pointer,
        ));
    }

    /// A press landed outside the component.
    pub fn handle_outside_press(&self, event: &mut PressEvent) {
        if !self.open() {
            return;
        }
        if self.set_open_with_reason(false, OpenChangeReason::OutsidePress) {
            event.base.accept();
        }
    }

    /// Focus left the component: close and, in on-blur validation mode, run
    /// validation against the committed submission value.
    pub fn handle_focus_out(&self) {
        if self.open() {
            self.set_open_with_reason(false, OpenChangeReason::FocusOut);
        }
        if let Some(form) = &self.inner.form {
            form.set_touched(true);
            if self.inner.config.validation_mode == ValidationMode::OnBlur {
                let text = self
                    .inner
                    .store
                    .with(|s| self.inner.submission_text(&s.selection));
                form.commit(&text);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Down,
    Up,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::combobox::collaborators::FormField;
    use crate::combobox::events::InputType;
    use crate::combobox::registry::ItemHandle;
    use crate::combobox::root::ComboboxBuilder;
    use crate::combobox::selection::SelectedValue;

    fn fruits() -> Vec<String> {
        vec!["Apple".to_string(), "Banana".to_string(), "Cherry".to_string()]
    }

    fn multiple() -> ComboboxBuilder<String> {
        Combobox::builder()
            .with_items(fruits())
            .with_mode(SelectionMode::Multiple)
    }

    #[test]
    fn test_arrow_down_opens_and_highlights_first() {
        let combobox = Combobox::new(fruits());

        let mut event = KeyEvent::new(Key::ArrowDown);
        combobox.handle_key(&mut event);

        assert!(event.base.is_accepted());
        assert!(combobox.open());
        assert_eq!(combobox.open_reason(), Some(OpenChangeReason::ArrowDown));
        assert_eq!(combobox.active_index(), Some(0));
    }

    #[test]
    fn test_arrow_up_opens_and_highlights_last() {
        let combobox = Combobox::new(fruits());

        let mut event = KeyEvent::new(Key::ArrowUp);
        combobox.handle_key(&mut event);

        assert!(combobox.open());
        assert_eq!(combobox.active_index(), Some(2));
    }

    #[test]
    fn test_arrow_navigation_wraps() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);

        for expected in [0, 1, 2, 0] {
            let mut event = KeyEvent::new(Key::ArrowDown);
            combobox.handle_key(&mut event);
            assert_eq!(combobox.active_index(), Some(expected));
        }

        let mut event = KeyEvent::new(Key::ArrowUp);
        combobox.handle_key(&mut event);
        assert_eq!(combobox.active_index(), Some(2));
    }

    #[test]
    fn test_home_and_end() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);

        let mut event = KeyEvent::new(Key::End);
        combobox.handle_key(&mut event);
        assert_eq!(combobox.active_index(), Some(2));

        let mut event = KeyEvent::new(Key::Home);
        combobox.handle_key(&mut event);
        assert_eq!(combobox.active_index(), Some(0));
    }

    #[test]
    fn test_enter_commits_highlighted_and_closes() {
        let combobox = Combobox::new(fruits());
        let mut down = KeyEvent::new(Key::ArrowDown);
        combobox.handle_key(&mut down);
        combobox.handle_key(&mut KeyEvent::new(Key::ArrowDown));

        let mut enter = KeyEvent::new(Key::Enter);
        combobox.handle_key(&mut enter);

        assert!(enter.base.is_accepted());
        assert_eq!(
            combobox.selected_value(),
            SelectedValue::Single(Some("Banana".to_string()))
        );
        assert_eq!(combobox.input_value(), "Banana");
        assert!(!combobox.open());
    }

    #[test]
    fn test_enter_without_highlight_propagates() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);

        let mut enter = KeyEvent::new(Key::Enter);
        combobox.handle_key(&mut enter);

        // Unaccepted: a surrounding form submit may proceed.
        assert!(!enter.base.is_accepted());
        assert!(combobox.open());
    }

    #[test]
    fn test_enter_activates_registered_handle() {
        let combobox = Combobox::new(fruits());
        combobox.handle_key(&mut KeyEvent::new(Key::ArrowDown));

        let activations = Arc::new(AtomicUsize::new(0));
        let activations_clone = activations.clone();
        assert!(combobox.register_item_handle(
            0,
            ItemHandle::new(move || {
                activations_clone.fetch_add(1, Ordering::SeqCst);
            })
        ));

        combobox.handle_key(&mut KeyEvent::new(Key::Enter));
        assert_eq!(activations.load(Ordering::SeqCst), 1);
        // The handle owns the behavior; no implicit commit happens.
        assert_eq!(combobox.selected_value(), SelectedValue::Single(None));
    }

    #[test]
    fn test_escape_closes_and_consumes() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);

        let mut escape = KeyEvent::new(Key::Escape);
        combobox.handle_key(&mut escape);

        assert!(escape.base.is_accepted());
        assert!(!combobox.open());
    }

    #[test]
    fn test_escape_propagates_when_nothing_visible() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);
        combobox.set_input_value("zzz");
        assert!(combobox.visible_items().is_empty());

        let mut escape = KeyEvent::new(Key::Escape);
        combobox.handle_key(&mut escape);

        assert!(!combobox.open());
        assert!(!escape.base.is_accepted());
    }

    #[test]
    fn test_escape_consumed_with_empty_state_ui() {
        let combobox = Combobox::<String>::builder()
            .with_items(fruits())
            .with_empty_state_ui(true)
            .build();
        combobox.set_open(true);
        combobox.set_input_value("zzz");

        let mut escape = KeyEvent::new(Key::Escape);
        combobox.handle_key(&mut escape);

        assert!(!combobox.open());
        assert!(escape.base.is_accepted());
    }

    #[test]
    fn test_typing_opens_popup() {
        let combobox = Combobox::new(fruits());

        let mut event = InputChangeEvent::typed("a");
        combobox.handle_input_change(&mut event);

        assert!(event.base.is_accepted());
        assert!(combobox.open());
        assert_eq!(combobox.open_reason(), Some(OpenChangeReason::InputChange));
        assert_eq!(combobox.input_value(), "a");
    }

    #[test]
    fn test_typing_while_closed_with_selection_filters_on_open() {
        let combobox = Combobox::new(fruits());
        combobox.select_item(&"Banana".to_string());

        // The keystroke lands before the popup opens; the new text is a
        // query, not the selection read-back, so the opened list filters.
        combobox.handle_input_change(&mut InputChangeEvent::typed("Ch"));

        assert!(combobox.open());
        assert_eq!(combobox.visible_items(), vec!["Cherry".to_string()]);
    }

    #[test]
    fn test_autofill_commits_exact_match_without_opening() {
        let combobox = Combobox::new(fruits());
        let commits = Arc::new(Mutex::new(Vec::new()));
        let commits_clone = commits.clone();
        combobox
            .signals()
            .selected_value_changed
            .connect(move |value| {
                commits_clone.lock().push(value.clone());
            });

        let mut event = InputChangeEvent::unattributed("banana");
        combobox.handle_input_change(&mut event);

        assert!(event.base.is_accepted());
        assert!(!combobox.open());
        assert_eq!(
            combobox.selected_value(),
            SelectedValue::Single(Some("Banana".to_string()))
        );
        // The selection sync restores the item's canonical label.
        assert_eq!(combobox.input_value(), "Banana");
        assert_eq!(commits.lock().len(), 1);
    }

    #[test]
    fn test_autofill_without_match_just_sets_text() {
        let combobox = Combobox::new(fruits());

        let mut event =
            InputChangeEvent::typed("Durian").with_input_type(InputType::InsertReplacementText);
        combobox.handle_input_change(&mut event);

        assert_eq!(combobox.input_value(), "Durian");
        assert_eq!(combobox.selected_value(), SelectedValue::Single(None));
        assert!(!combobox.open());
    }

    #[test]
    fn test_composition_buffers_until_end() {
        let combobox = Combobox::new(fruits());

        combobox.handle_composition(&CompositionEvent::Start);
        assert!(combobox.is_composing());

        let mut event = InputChangeEvent::typed("b");
        combobox.handle_input_change(&mut event);
        assert!(event.base.is_accepted());
        // Nothing derived or committed while composing.
        assert_eq!(combobox.input_value(), "");
        assert_eq!(combobox.visible_items().len(), 3);
        assert!(!combobox.open());

        combobox.handle_composition(&CompositionEvent::Update("ba".to_string()));
        combobox.handle_composition(&CompositionEvent::End("ban".to_string()));

        assert!(!combobox.is_composing());
        assert_eq!(combobox.input_value(), "ban");
        assert_eq!(combobox.visible_items(), vec!["Banana".to_string()]);
        assert!(combobox.open());
    }

    #[test]
    fn test_stray_composition_end_is_ignored() {
        let combobox = Combobox::new(fruits());
        combobox.handle_composition(&CompositionEvent::End("stray".to_string()));
        assert_eq!(combobox.input_value(), "");
    }

    #[test]
    fn test_trigger_press_toggles() {
        let combobox = Combobox::new(fruits());

        let mut press = PressEvent::new();
        combobox.handle_trigger_press(&mut press);
        assert!(press.base.is_accepted());
        assert!(combobox.open());
        assert_eq!(combobox.open_reason(), Some(OpenChangeReason::TriggerPress));

        combobox.handle_trigger_press(&mut PressEvent::new());
        assert!(!combobox.open());
    }

    #[test]
    fn test_input_click_opens_once() {
        let combobox = Combobox::new(fruits());

        let mut press = PressEvent::new();
        combobox.handle_input_click(&mut press);
        assert!(press.base.is_accepted());
        assert!(combobox.open());

        let mut again = PressEvent::new();
        combobox.handle_input_click(&mut again);
        assert!(!again.base.is_accepted());
        assert!(combobox.open());
    }

    #[test]
    fn test_item_press_single_closes() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);

        let mut press = PressEvent::new();
        combobox.handle_item_press(2, &mut press);

        assert!(press.base.is_accepted());
        assert_eq!(
            combobox.selected_value(),
            SelectedValue::Single(Some("Cherry".to_string()))
        );
        assert!(!combobox.open());
    }

    #[test]
    fn test_item_press_multiple_keeps_open_and_clears_query() {
        let combobox = multiple().build();
        combobox.set_open(true);
        combobox.set_input_value("ban");
        assert_eq!(combobox.visible_items(), vec!["Banana".to_string()]);

        let mut press = PressEvent::new();
        combobox.handle_item_press(0, &mut press);

        assert!(combobox.open());
        assert_eq!(combobox.selected_value().multiple(), ["Banana".to_string()]);
        assert_eq!(combobox.input_value(), "");
        assert_eq!(combobox.visible_items().len(), 3);
    }

    #[test]
    fn test_chip_backspace_highlights_then_removes() {
        let combobox = multiple().build();
        combobox.select_item(&"Apple".to_string());
        combobox.select_item(&"Banana".to_string());

        let mut first = KeyEvent::new(Key::Backspace);
        combobox.handle_key(&mut first);
        assert!(first.base.is_accepted());
        assert_eq!(combobox.highlighted_chip(), Some(1));
        assert_eq!(combobox.selected_value().multiple().len(), 2);

        let mut second = KeyEvent::new(Key::Backspace);
        combobox.handle_key(&mut second);
        assert_eq!(combobox.selected_value().multiple(), ["Apple".to_string()]);
        assert_eq!(combobox.highlighted_chip(), None);
    }

    #[test]
    fn test_chip_arrow_navigation() {
        let combobox = multiple().build();
        combobox.select_item(&"Apple".to_string());
        combobox.select_item(&"Banana".to_string());

        let mut left = KeyEvent::new(Key::ArrowLeft);
        combobox.handle_key(&mut left);
        assert_eq!(combobox.highlighted_chip(), Some(1));

        combobox.handle_key(&mut KeyEvent::new(Key::ArrowLeft));
        assert_eq!(combobox.highlighted_chip(), Some(0));

        // Already at the first chip: stays put.
        combobox.handle_key(&mut KeyEvent::new(Key::ArrowLeft));
        assert_eq!(combobox.highlighted_chip(), Some(0));

        combobox.handle_key(&mut KeyEvent::new(Key::ArrowRight));
        assert_eq!(combobox.highlighted_chip(), Some(1));

        // Past the last chip: back to the input caret.
        combobox.handle_key(&mut KeyEvent::new(Key::ArrowRight));
        assert_eq!(combobox.highlighted_chip(), None);
    }

    #[test]
    fn test_chip_navigation_requires_empty_input() {
        let combobox = multiple().build();
        combobox.select_item(&"Apple".to_string());
        combobox.set_input_value("ba");

        let mut event = KeyEvent::new(Key::Backspace);
        combobox.handle_key(&mut event);
        assert!(!event.base.is_accepted());
        assert_eq!(combobox.highlighted_chip(), None);
        assert_eq!(combobox.selected_value().multiple().len(), 1);
    }

    #[test]
    fn test_typing_exits_chip_navigation() {
        let combobox = multiple().build();
        combobox.select_item(&"Apple".to_string());
        combobox.handle_key(&mut KeyEvent::new(Key::Backspace));
        assert_eq!(combobox.highlighted_chip(), Some(0));

        combobox.handle_input_change(&mut InputChangeEvent::typed("b"));
        assert_eq!(combobox.highlighted_chip(), None);
    }

    #[test]
    fn test_item_hover_highlights_with_pointer_provenance() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);

        let provenances = Arc::new(Mutex::new(Vec::new()));
        let provenances_clone = provenances.clone();
        combobox.signals().item_highlighted.connect(move |change| {
            provenances_clone.lock().push(change.provenance);
        });

        combobox.handle_item_hover(1);
        assert_eq!(combobox.active_index(), Some(1));
        assert_eq!(provenances.lock().clone(), vec![HighlightProvenance::Pointer]);
    }

    #[test]
    fn test_outside_press_closes() {
        let combobox = Combobox::new(fruits());
        combobox.set_open(true);

        let mut press = PressEvent::new();
        combobox.handle_outside_press(&mut press);
        assert!(press.base.is_accepted());
        assert!(!combobox.open());
        assert_eq!(combobox.open_reason(), None);
    }

    #[derive(Debug, Default)]
    struct RecordingField {
        touched: std::sync::atomic::AtomicBool,
        committed: Mutex<Vec<String>>,
    }

    impl FormField for RecordingField {
        fn set_touched(&self, touched: bool) {
            self.touched.store(touched, Ordering::SeqCst);
        }

        fn commit(&self, value: &str) {
            self.committed.lock().push(value.to_string());
        }
    }

    #[test]
    fn test_focus_out_closes_and_validates_on_blur() {
        let field = Arc::new(RecordingField::default());
        let combobox = Combobox::<String>::builder()
            .with_items(fruits())
            .with_form_field(field.clone())
            .build();

        combobox.set_open(true);
        combobox.select_item(&"Banana".to_string());
        combobox.handle_focus_out();

        assert!(!combobox.open());
        assert!(field.touched.load(Ordering::SeqCst));
        assert_eq!(field.committed.lock().clone(), vec!["Banana".to_string()]);
    }

    #[test]
    fn test_on_change_validation_runs_at_commit() {
        let field = Arc::new(RecordingField::default());
        let combobox = Combobox::<String>::builder()
            .with_items(fruits())
            .with_form_field(field.clone())
            .with_validation_mode(ValidationMode::OnChange)
            .build();

        combobox.select_item(&"Apple".to_string());
        assert_eq!(field.committed.lock().clone(), vec!["Apple".to_string()]);
    }

    #[test]
    fn test_modified_keys_are_ignored() {
        let combobox = Combobox::new(fruits());

        let mut event = KeyEvent::new(Key::ArrowDown).with_modifiers(
            crate::combobox::events::KeyboardModifiers {
                control: true,
                ..Default::default()
            },
        );
        combobox.handle_key(&mut event);
        assert!(!combobox.open());
        assert!(!event.base.is_accepted());
    }
}
