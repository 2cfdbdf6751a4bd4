//! Core systems for Keel, a headless UI interaction library.
//!
//! This crate carries the reactive plumbing shared by all Keel interaction
//! engines:
//!
//! - [`Signal`] — type-safe signal/slot notification
//! - [`Store`] — observable state container with fine-grained selector
//!   subscriptions and two-phase commit
//! - [`ChangeDetails`] / [`EventBase`] — cancellable, reason-tagged change
//!   events with accept/ignore semantics
//!
//! Execution model: single-threaded and cooperative. All state mutation
//! happens synchronously inside a host event handler; slots and subscriber
//! callbacks run directly in the mutating thread, after the state snapshot
//! has fully settled.

pub mod error;
pub mod event;
pub mod logging;
pub mod signal;
pub mod store;

pub use error::{CoreError, Result, SignalError, StoreError};
pub use event::{ChangeDetails, EventBase};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use store::{Store, SubscriptionGuard, SubscriptionId};
