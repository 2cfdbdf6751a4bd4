//! Observable state store with selector subscriptions.
//!
//! A [`Store<S>`] owns a single state value and notifies subscribers after
//! each committed update. Subscriptions are *fine-grained*: a subscriber
//! registers a selector that projects the slice of state it cares about, and
//! its callback only runs when that slice actually changes (compared with
//! `PartialEq`). A full-state broadcast never reaches a subscriber whose
//! slice is untouched.
//!
//! The store is the data backbone of an interaction root: the root owns the
//! store exclusively and exposes action methods; child parts read through
//! subscriptions and never mutate fields directly.
//!
//! # Two-phase commit
//!
//! [`Store::update`] runs the mutation closure to completion while holding
//! the state lock, then notifies in two phases: every subscription's selector
//! is re-evaluated against the settled snapshot first, and only then do the
//! changed subscribers' callbacks run, with no lock held. Derived state is
//! therefore always fully settled and mutually consistent before any
//! observer runs, and an observer may read the store (or dispatch follow-up
//! actions) from its callback.
//!
//! # Example
//!
//! ```
//! use keel_core::Store;
//!
//! #[derive(Default)]
//! struct State {
//!     open: bool,
//!     input: String,
//! }
//!
//! let store = Store::new(State::default());
//!
//! // Only fires when `open` changes, not when `input` does.
//! store.subscribe(|s: &State| s.open, |open| {
//!     println!("open: {}", open);
//! });
//!
//! store.update(|s| s.input.push_str("ba"));   // no notification
//! store.update(|s| s.open = true);            // notifies
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use slotmap::{new_key_type, SlotMap};
use tracing::trace;

use crate::error::StoreError;
use crate::logging::targets::STORE;

new_key_type! {
    /// A unique identifier for a store subscription.
    ///
    /// Use this ID to remove a subscription via [`Store::unsubscribe`].
    pub struct SubscriptionId;
}

/// A deferred subscriber callback, ready to run once the state lock is
/// released.
type PendingCallback = Box<dyn FnOnce() + Send>;

/// Type-erased subscriber entry: re-evaluates its selector against the new
/// state and, when the selected slice changed, hands back the callback to
/// run in the second notification phase.
type Subscriber<S> = Arc<Mutex<dyn FnMut(&S) -> Option<PendingCallback> + Send>>;

/// An observable, exclusively-owned state container.
///
/// See the [module docs](self) for the subscription and commit model.
pub struct Store<S> {
    state: RwLock<S>,
    subscribers: Mutex<SlotMap<SubscriptionId, Subscriber<S>>>,
}

impl<S> Store<S> {
    /// Create a store owning `initial`.
    pub fn new(initial: S) -> Self {
        Self {
            state: RwLock::new(initial),
            subscribers: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Read the state through a closure without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.read())
    }

    /// Read a cloned slice of the state through a selector.
    pub fn select<T: Clone>(&self, selector: impl FnOnce(&S) -> T) -> T {
        selector(&self.state.read())
    }

    /// Subscribe to a slice of the state.
    ///
    /// `selector` projects the slice; `callback` runs after each committed
    /// update whose projection differs (`PartialEq`) from the previous one,
    /// receiving the new slice. The selector is evaluated once immediately to
    /// seed the comparison baseline; the callback is *not* invoked for that
    /// initial evaluation.
    ///
    /// Returns a [`SubscriptionId`] for later removal.
    pub fn subscribe<T, Sel, Cb>(&self, selector: Sel, callback: Cb) -> SubscriptionId
    where
        T: Clone + PartialEq + Send + 'static,
        Sel: Fn(&S) -> T + Send + 'static,
        Cb: FnMut(&T) + Send + 'static,
    {
        let mut last = self.with(&selector);
        let callback = Arc::new(Mutex::new(callback));
        let entry = move |state: &S| -> Option<PendingCallback> {
            let next = selector(state);
            if next != last {
                last = next.clone();
                let callback = callback.clone();
                Some(Box::new(move || (callback.lock())(&next)))
            } else {
                None
            }
        };
        let id = self.subscribers.lock().insert(Arc::new(Mutex::new(entry)));
        trace!(target: STORE, ?id, "subscription added");
        id
    }

    /// Remove a subscription.
    ///
    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().remove(id).is_some()
    }

    /// Remove a subscription, failing on an unknown or already-removed ID.
    pub fn try_unsubscribe(&self, id: SubscriptionId) -> Result<(), StoreError> {
        if self.unsubscribe(id) {
            Ok(())
        } else {
            Err(StoreError::InvalidSubscription)
        }
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Mutate the state, then notify subscribers whose slice changed.
    ///
    /// The mutation closure runs to completion before any subscriber is
    /// invoked (two-phase commit). Returns the closure's result.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut S) -> R) -> R {
        let result = {
            let mut state = self.state.write();
            mutate(&mut state)
        };
        self.notify();
        result
    }

    /// Mutate the state without notifying subscribers.
    ///
    /// Useful for batch updates that end with a single explicit
    /// [`notify`](Self::notify), or for initialization.
    pub fn update_silent<R>(&self, mutate: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.state.write();
        mutate(&mut state)
    }

    /// Re-evaluate all subscriptions against the current state.
    ///
    /// Phase one evaluates every selector against one consistent snapshot;
    /// phase two runs the changed subscribers' callbacks with no lock held.
    /// Subscriber entries are snapshotted before evaluation, so a callback
    /// may subscribe or unsubscribe without deadlocking. Subscriptions added
    /// during notification are not evaluated for that notification.
    pub fn notify(&self) {
        let entries: Vec<Subscriber<S>> = self.subscribers.lock().values().cloned().collect();

        let mut pending = Vec::new();
        {
            let state = self.state.read();
            for entry in entries {
                if let Some(callback) = (entry.lock())(&state) {
                    pending.push(callback);
                }
            }
        }

        if !pending.is_empty() {
            trace!(target: STORE, changed = pending.len(), "notifying subscribers");
        }
        for callback in pending {
            callback();
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.state.read())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

/// RAII guard that removes a store subscription when dropped.
pub struct SubscriptionGuard<'a, S> {
    store: &'a Store<S>,
    id: Option<SubscriptionId>,
}

impl<'a, S> SubscriptionGuard<'a, S> {
    /// Wrap an existing subscription in a guard.
    pub fn new(store: &'a Store<S>, id: SubscriptionId) -> Self {
        Self {
            store,
            id: Some(id),
        }
    }

    /// Release the guard without unsubscribing.
    pub fn release(mut self) -> Option<SubscriptionId> {
        self.id.take()
    }
}

impl<S> Drop for SubscriptionGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.store.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct State {
        open: bool,
        input: String,
        count: usize,
    }

    #[test]
    fn test_subscribe_fires_only_on_slice_change() {
        let store = Store::new(State::default());
        let fires = Arc::new(AtomicUsize::new(0));

        let fires_clone = fires.clone();
        store.subscribe(
            |s: &State| s.open,
            move |_| {
                fires_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        store.update(|s| s.input.push('a'));
        assert_eq!(fires.load(Ordering::SeqCst), 0);

        store.update(|s| s.open = true);
        assert_eq!(fires.load(Ordering::SeqCst), 1);

        // Same value again: no notification.
        store.update(|s| s.open = true);
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_update_returns_closure_result() {
        let store = Store::new(State::default());
        let previous = store.update(|s| {
            s.count += 1;
            s.count - 1
        });
        assert_eq!(previous, 0);
        assert_eq!(store.select(|s| s.count), 1);
    }

    #[test]
    fn test_silent_update_then_explicit_notify() {
        let store = Store::new(State::default());
        let fires = Arc::new(AtomicUsize::new(0));

        let fires_clone = fires.clone();
        store.subscribe(
            |s: &State| s.count,
            move |_| {
                fires_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        store.update_silent(|s| s.count = 1);
        store.update_silent(|s| s.count = 2);
        assert_eq!(fires.load(Ordering::SeqCst), 0);

        store.notify();
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let store = Store::new(State::default());
        let fires = Arc::new(AtomicUsize::new(0));

        let fires_clone = fires.clone();
        let id = store.subscribe(
            |s: &State| s.open,
            move |_| {
                fires_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert!(store.unsubscribe(id));
        store.update(|s| s.open = true);
        assert_eq!(fires.load(Ordering::SeqCst), 0);
        assert!(!store.unsubscribe(id));
        assert_eq!(
            store.try_unsubscribe(id),
            Err(StoreError::InvalidSubscription)
        );
    }

    #[test]
    fn test_callback_sees_settled_state() {
        // Both fields change in one update; the callback must observe the
        // final snapshot, never a half-applied one.
        let store = Arc::new(Store::new(State::default()));
        let observed = Arc::new(Mutex::new(None));

        let store_clone = store.clone();
        let observed_clone = observed.clone();
        store.subscribe(
            |s: &State| s.open,
            move |&open| {
                let input = store_clone.select(|s| s.input.clone());
                *observed_clone.lock() = Some((open, input));
            },
        );

        store.update(|s| {
            s.input = "ban".to_string();
            s.open = true;
        });

        assert_eq!(
            observed.lock().clone(),
            Some((true, "ban".to_string()))
        );
    }

    #[test]
    fn test_subscription_guard() {
        let store = Store::new(State::default());
        let fires = Arc::new(AtomicUsize::new(0));

        {
            let fires_clone = fires.clone();
            let id = store.subscribe(
                |s: &State| s.open,
                move |_| {
                    fires_clone.fetch_add(1, Ordering::SeqCst);
                },
            );
            let _guard = SubscriptionGuard::new(&store, id);
            store.update(|s| s.open = true);
        }

        store.update(|s| s.open = false);
        assert_eq!(fires.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscription_count(), 0);
    }
}
