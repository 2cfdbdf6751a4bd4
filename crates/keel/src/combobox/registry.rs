//! Item equality and the visible-item registry.
//!
//! [`ItemEq`] is the equality comparer used everywhere two item values are
//! compared: selection membership, highlight deduplication, and index lookup.
//! It defaults to `PartialEq` and can be replaced by a caller-supplied
//! closure for application values whose identity is narrower than their
//! full structural equality (say, compare only an `id` field).
//!
//! [`ItemRegistry`] mirrors the currently *visible* filtered list as an
//! ordered collection, adding per-item activation handles. The Enter key
//! activates the highlighted item's registered handle, so item-specific
//! press behavior installed by the rendering collaborator (link navigation,
//! for example) still runs.

use std::sync::Arc;

/// Equality comparer over item values.
pub struct ItemEq<T>(Arc<dyn Fn(&T, &T) -> bool + Send + Sync>);

impl<T> ItemEq<T> {
    /// Create a comparer from a custom closure.
    pub fn new(compare: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(compare))
    }

    /// Compare two items.
    pub fn eq(&self, a: &T, b: &T) -> bool {
        (self.0)(a, b)
    }
}

impl<T: PartialEq> Default for ItemEq<T> {
    fn default() -> Self {
        Self::new(|a: &T, b: &T| a == b)
    }
}

impl<T> Clone for ItemEq<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> std::fmt::Debug for ItemEq<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ItemEq")
    }
}

/// An activation handle registered for a visible item.
///
/// The rendering collaborator registers one handle per rendered item node;
/// activating it is the headless equivalent of synthesizing a click on that
/// node.
#[derive(Clone)]
pub struct ItemHandle {
    activate: Arc<dyn Fn() + Send + Sync>,
}

impl ItemHandle {
    /// Create a handle whose activation runs `on_activate`.
    pub fn new(on_activate: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            activate: Arc::new(on_activate),
        }
    }

    /// Run the registered activation behavior.
    pub fn activate(&self) {
        (self.activate)();
    }
}

impl std::fmt::Debug for ItemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ItemHandle")
    }
}

/// Ordered registry of the currently visible items.
///
/// Rebuilt from the derived filtered list after every recomputation; indices
/// handed out by the registry are only valid until the next rebuild.
#[derive(Debug)]
pub struct ItemRegistry<T> {
    items: Vec<T>,
    handles: Vec<Option<ItemHandle>>,
    comparer: ItemEq<T>,
}

impl<T> ItemRegistry<T> {
    /// Create an empty registry using `comparer` for lookups.
    pub fn new(comparer: ItemEq<T>) -> Self {
        Self {
            items: Vec::new(),
            handles: Vec::new(),
            comparer,
        }
    }

    /// Replace the visible items. Previously registered handles are dropped;
    /// the rendering collaborator re-registers handles for the nodes it
    /// keeps mounted.
    pub fn rebuild(&mut self, items: Vec<T>) {
        self.handles = vec![None; items.len()];
        self.items = items;
    }

    /// Number of visible items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the registry holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The visible items, in order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// The item at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// The first index whose item compares equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.items.iter().position(|item| self.comparer.eq(item, value))
    }

    /// Whether any visible item compares equal to `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    /// Register an activation handle for the item at `index`.
    ///
    /// Returns `false` if the index is out of range (for example because the
    /// list was rebuilt between render and registration).
    pub fn register_handle(&mut self, index: usize, handle: ItemHandle) -> bool {
        match self.handles.get_mut(index) {
            Some(slot) => {
                *slot = Some(handle);
                true
            }
            None => false,
        }
    }

    /// The activation handle registered at `index`, if any.
    pub fn handle(&self, index: usize) -> Option<ItemHandle> {
        self.handles.get(index).and_then(|slot| slot.clone())
    }
}
