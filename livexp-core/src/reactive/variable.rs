//! Live Variable
//!
//! A `LiveVariable` is the leaf of a live expression graph: a value that is
//! set from the outside rather than computed. Setting it refreshes the
//! underlying expression, which notifies listeners only when the new value
//! differs from the old one.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::expression::{Lane, LiveExpression, LiveValue, Strategy};
use crate::dispose::{Disposable, OnDispose};
use crate::schedule::{AsyncMode, Scheduler};

/// A settable live expression.
///
/// # Example
///
/// ```rust,ignore
/// let count = LiveVariable::new(0);
/// let doubled = count.apply(|n| n * 2);
///
/// count.set_value(5);
/// assert_eq!(doubled.get_value(), 10);
/// ```
pub struct LiveVariable<V: LiveValue> {
    expression: LiveExpression<V>,

    /// The value most recently set. The expression's cached value catches
    /// up on refresh.
    source: Arc<Mutex<V>>,
}

impl<V: LiveValue> LiveVariable<V> {
    /// Create a variable that refreshes and notifies synchronously.
    pub fn new(value: V) -> Self {
        Self::with_lane(value, None)
    }

    /// Create a variable whose refresh and/or notification runs on
    /// `scheduler`.
    pub fn scheduled(
        value: V,
        scheduler: Arc<dyn Scheduler>,
        refresh: AsyncMode,
        notify: AsyncMode,
        delay: Duration,
    ) -> Self {
        Self::with_lane(value, Some(Lane::new(scheduler, refresh, notify, delay)))
    }

    fn with_lane(value: V, lane: Option<Lane>) -> Self {
        let source = Arc::new(Mutex::new(value.clone()));
        let compute = {
            let source = Arc::clone(&source);
            move || source.lock().clone()
        };
        Self {
            expression: LiveExpression::from_parts(value, Strategy::Compute(Box::new(compute)), lane),
            source,
        }
    }

    /// Set a new value and refresh.
    pub fn set_value(&self, value: V) {
        *self.source.lock() = value;
        self.expression.refresh();
    }

    /// Replace the value with a function of the current one, then refresh.
    ///
    /// The read and the write happen under one lock, so concurrent updates
    /// are not lost.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&V) -> V,
    {
        {
            let mut source = self.source.lock();
            let next = f(&source);
            *source = next;
        }
        self.expression.refresh();
    }

    /// The read-only expression view of this variable.
    pub fn expression(&self) -> &LiveExpression<V> {
        &self.expression
    }
}

impl<V: LiveValue> Deref for LiveVariable<V> {
    type Target = LiveExpression<V>;

    fn deref(&self) -> &Self::Target {
        &self.expression
    }
}

impl<V: LiveValue> Clone for LiveVariable<V> {
    fn clone(&self) -> Self {
        Self {
            expression: self.expression.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<V: LiveValue> From<LiveVariable<V>> for LiveExpression<V> {
    fn from(variable: LiveVariable<V>) -> Self {
        variable.expression
    }
}

impl<V: LiveValue> Disposable for LiveVariable<V> {
    fn dispose(&self) {
        self.expression.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.expression.is_disposed()
    }
}

impl<V: LiveValue> OnDispose for LiveVariable<V> {
    fn on_dispose<F>(&self, handler: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        self.expression.on_dispose(move |expression| {
            handler(&LiveVariable {
                expression: expression.clone(),
                source,
            })
        });
    }
}

impl<V> std::fmt::Debug for LiveVariable<V>
where
    V: LiveValue + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveVariable")
            .field("id", &self.expression.id())
            .field("value", &self.expression.get_value())
            .field("listener_count", &self.expression.listener_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
