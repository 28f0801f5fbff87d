//! Listener and node identifiers, and the ordered listener list.
//!
//! A listener is any callback that wants to hear about a node's value. This
//! includes dependent nodes (via `depends_on`), UI glue, and test recorders.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::expression::{LiveExpression, LiveValue};

/// Unique identifier for a registered listener.
///
/// Returned by `add_listener` and used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a node, used in logs and by the cascade guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value listener: called with the node and its current value.
pub type Listener<V> = Arc<dyn Fn(&LiveExpression<V>, &V) + Send + Sync>;

/// Listeners in registration order.
pub(crate) struct ListenerList<V: LiveValue> {
    entries: IndexMap<ListenerId, Listener<V>>,
}

impl<V: LiveValue> ListenerList<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, id: ListenerId, listener: Listener<V>) {
        self.entries.insert(id, listener);
    }

    /// Remove a listener, keeping the others in order.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    /// Copy out the listeners so they can be called without the lock.
    pub(crate) fn snapshot(&self) -> SmallVec<[Listener<V>; 4]> {
        self.entries.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
