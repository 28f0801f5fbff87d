//! Delegating Live Expression
//!
//! A node whose value mirrors whichever other node it currently delegates
//! to. Switching the delegate moves the subscription: the old delegate's
//! listener is removed and the new one's is added. `LiveExpression::then`
//! is built on this.

use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::expression::{LiveExpression, LiveValue, WeakExpression};
use super::listener::ListenerId;

struct DelegateSlot<R: LiveValue> {
    target: Option<LiveExpression<R>>,
    listener: Option<ListenerId>,
}

/// A live expression following a replaceable delegate.
///
/// Its value is `None` while there is no delegate. Delegates are not owned:
/// disposing this node unsubscribes from the delegate but does not dispose
/// it.
pub struct DelegatingLiveExp<R: LiveValue> {
    expression: LiveExpression<Option<R>>,
    slot: Arc<Mutex<DelegateSlot<R>>>,
}

impl<R: LiveValue> DelegatingLiveExp<R> {
    pub fn new() -> Self {
        let slot = Arc::new(Mutex::new(DelegateSlot {
            target: None,
            listener: None,
        }));

        let compute = {
            let slot = Arc::clone(&slot);
            move || {
                let target = slot.lock().target.clone();
                target.map(|target| target.get_value())
            }
        };
        let expression = LiveExpression::new(None, compute);

        {
            let slot = Arc::clone(&slot);
            expression.add_source_release(move || detach(&slot));
        }

        Self { expression, slot }
    }

    /// Follow `target` from now on (or nothing, for `None`).
    pub fn set_delegate(&self, target: Option<LiveExpression<R>>) {
        if self.expression.is_disposed() {
            return;
        }
        if self.slot.lock().target == target {
            return;
        }

        detach(&self.slot);

        if let Some(target) = target {
            self.slot.lock().target = Some(target.clone());

            let dependent = self.expression.downgrade();
            let listener = target.add_listener(move |_, _| {
                if let Some(dependent) = dependent.upgrade() {
                    dependent.refresh();
                }
            });

            let mut slot = self.slot.lock();
            if slot.target.as_ref() == Some(&target) {
                slot.listener = Some(listener);
            } else {
                // Lost a race with another set_delegate.
                drop(slot);
                target.remove_listener(listener);
            }
        }

        // Covers a cleared or already disposed delegate, which deliver
        // nothing on subscription.
        self.expression.refresh();
    }

    /// The node currently delegated to.
    pub fn delegate(&self) -> Option<LiveExpression<R>> {
        self.slot.lock().target.clone()
    }

    pub fn expression(&self) -> &LiveExpression<Option<R>> {
        &self.expression
    }

    pub(crate) fn downgrade(&self) -> WeakDelegating<R> {
        WeakDelegating {
            expression: self.expression.downgrade(),
            slot: Arc::downgrade(&self.slot),
        }
    }
}

fn detach<R: LiveValue>(slot: &Mutex<DelegateSlot<R>>) {
    let (target, listener) = {
        let mut slot = slot.lock();
        (slot.target.take(), slot.listener.take())
    };
    if let (Some(target), Some(listener)) = (target, listener) {
        target.remove_listener(listener);
    }
}

impl<R: LiveValue> Default for DelegatingLiveExp<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: LiveValue> Clone for DelegatingLiveExp<R> {
    fn clone(&self) -> Self {
        Self {
            expression: self.expression.clone(),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<R: LiveValue> Deref for DelegatingLiveExp<R> {
    type Target = LiveExpression<Option<R>>;

    fn deref(&self) -> &Self::Target {
        &self.expression
    }
}

/// Non-owning handle, used by listeners that must not keep the node alive.
pub(crate) struct WeakDelegating<R: LiveValue> {
    expression: WeakExpression<Option<R>>,
    slot: Weak<Mutex<DelegateSlot<R>>>,
}

impl<R: LiveValue> WeakDelegating<R> {
    pub(crate) fn upgrade(&self) -> Option<DelegatingLiveExp<R>> {
        Some(DelegatingLiveExp {
            expression: self.expression.upgrade()?,
            slot: self.slot.upgrade()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::LiveVariable;

    #[test]
    fn follows_delegate_and_switches() {
        let a = LiveVariable::new(1);
        let b = LiveVariable::new(100);
        let delegating = DelegatingLiveExp::new();
        assert_eq!(delegating.get_value(), None);

        delegating.set_delegate(Some(a.expression().clone()));
        assert_eq!(delegating.get_value(), Some(1));
        a.set_value(2);
        assert_eq!(delegating.get_value(), Some(2));

        delegating.set_delegate(Some(b.expression().clone()));
        assert_eq!(delegating.get_value(), Some(100));
        assert_eq!(a.listener_count(), 0);

        a.set_value(3);
        assert_eq!(delegating.get_value(), Some(100));

        delegating.set_delegate(None);
        assert_eq!(delegating.get_value(), None);
        assert_eq!(b.listener_count(), 0);
    }

    #[test]
    fn dispose_unsubscribes_without_disposing_delegate() {
        let a = LiveVariable::new(1);
        let delegating = DelegatingLiveExp::new();
        delegating.set_delegate(Some(a.expression().clone()));
        assert_eq!(a.listener_count(), 1);

        delegating.dispose();

        assert_eq!(a.listener_count(), 0);
        assert!(!a.is_disposed());
        assert!(delegating.delegate().is_none());
    }
}
