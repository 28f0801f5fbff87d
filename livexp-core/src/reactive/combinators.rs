//! Derived-node combinators.
//!
//! Each combinator returns a new node wired to `self`. The new node starts
//! out computed from `self`'s current value, and disposing or dropping it
//! releases its subscription on `self`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::delegating::DelegatingLiveExp;
use super::expression::{Lane, LiveExpression, LiveValue, Strategy};
use super::variable::LiveVariable;
use crate::dispose::Disposable;
use crate::schedule::{AsyncMode, Scheduler};

impl<V: LiveValue> LiveExpression<V> {
    /// A node tracking `f(value)`.
    pub fn apply<R, F>(&self, f: F) -> LiveExpression<R>
    where
        R: LiveValue,
        F: Fn(&V) -> R + Send + Sync + 'static,
    {
        let seen = self.get_value();
        let initial = f(&seen);
        let target = self.clone();
        let result = LiveExpression::new(initial, move || f(&target.get_value()));
        result.seeded_from(self, &seen);
        result
    }

    /// A node tracking `f(value)`, `None` where `f` rejects the value.
    pub fn filter_map<R, F>(&self, f: F) -> LiveExpression<Option<R>>
    where
        R: LiveValue,
        F: Fn(&V) -> Option<R> + Send + Sync + 'static,
    {
        self.apply(f)
    }

    /// A node holding the value while `predicate` accepts it, `None`
    /// otherwise.
    pub fn filter<F>(&self, predicate: F) -> LiveExpression<Option<V>>
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.filter_map(move |value| predicate(value).then(|| value.clone()))
    }

    /// Chain a function that picks another node based on this node's value.
    ///
    /// The result follows the value of whichever node `f` returned last and
    /// updates when either this value or that node's value changes. Nodes
    /// returned by `f` are not disposed by the result; only its listeners
    /// on them are removed.
    pub fn then<R, F>(&self, f: F) -> DelegatingLiveExp<R>
    where
        R: LiveValue,
        F: Fn(&V) -> LiveExpression<R> + Send + Sync + 'static,
    {
        let targets = self.apply(f);
        let result = DelegatingLiveExp::new();

        let delegating = result.downgrade();
        targets.add_listener(move |_, target| {
            if let Some(delegating) = delegating.upgrade() {
                delegating.set_delegate(Some(target.clone()));
            }
        });
        result.expression().add_source_release(move || targets.dispose());
        result
    }

    /// A copy of this node that follows it after a debounce window.
    ///
    /// Bursts of changes within `delay` reach the copy as one update with
    /// the final value.
    pub fn delay(&self, delay: Duration, scheduler: Arc<dyn Scheduler>) -> LiveExpression<V> {
        let seen = self.get_value();
        let target = self.clone();
        let result = LiveExpression::from_parts(
            seen.clone(),
            Strategy::Compute(Box::new(move || target.get_value())),
            Some(Lane::new(scheduler, AsyncMode::Async, AsyncMode::Sync, delay)),
        );
        result.seeded_from(self, &seen);
        result
    }

    /// Like `apply`, for factories producing disposable objects.
    ///
    /// Each produced object is owned by the result: it is disposed when a
    /// new value replaces it, and the last one is disposed together with
    /// the result. Disposing this node disposes the result.
    pub fn apply_factory<R, F>(&self, factory: F) -> LiveExpression<Option<R>>
    where
        R: LiveValue + Disposable,
        F: Fn(&V) -> R + Send + Sync + 'static,
    {
        let products = LiveVariable::new(None::<R>);
        let current: Arc<Mutex<Option<R>>> = Arc::default();

        {
            let current = Arc::clone(&current);
            products.add_listener(move |_, next: &Option<R>| {
                let previous = std::mem::replace(&mut *current.lock(), next.clone());
                if let Some(previous) = previous {
                    if next.as_ref() != Some(&previous) {
                        previous.dispose();
                    }
                }
            });
        }

        let listener = {
            let products = products.clone();
            self.add_listener(move |_, value| products.set_value(Some(factory(value))))
        };

        {
            let source = self.downgrade();
            let current = Arc::clone(&current);
            products.on_dispose(move |_| {
                if let Some(source) = source.upgrade() {
                    source.remove_listener(listener);
                }
                let last = current.lock().take();
                if let Some(last) = last {
                    last.dispose();
                }
            });
        }

        {
            let products = products.clone();
            self.on_dispose(move |_| products.dispose());
        }

        products.expression().clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
