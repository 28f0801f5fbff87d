//! Composite Nodes
//!
//! A composite node aggregates a growing list of child nodes. Children are
//! wired with `depends_on`, so the aggregate recomputes whenever any child
//! changes and disposing the composite releases every child subscription.
//! Composites are themselves live expressions and can be children of other
//! composites.

mod or;
mod validator;

pub use or::OrExpression;
pub use validator::{CompositeValidator, Severity, ValidationResult};

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::reactive::{LiveExpression, LiveValue};

type Children<C> = Arc<RwLock<SmallVec<[LiveExpression<C>; 4]>>>;

/// A node whose value is an aggregate over an ordered list of children.
///
/// # Example
///
/// ```rust,ignore
/// let total = CompositeExpression::new(0, |children: &[LiveExpression<i32>]| {
///     children.iter().map(|c| c.get_value()).sum()
/// });
/// total.add_child(a.expression().clone());
/// total.add_child(b.expression().clone());
/// ```
pub struct CompositeExpression<C: LiveValue, V: LiveValue> {
    expression: LiveExpression<V>,
    children: Children<C>,
}

impl<C: LiveValue, V: LiveValue> CompositeExpression<C, V> {
    /// Create a composite with no children. `initial` is replaced by
    /// `aggregate(&[])` before this returns.
    pub fn new<F>(initial: V, aggregate: F) -> Self
    where
        F: Fn(&[LiveExpression<C>]) -> V + Send + Sync + 'static,
    {
        let children: Children<C> = Arc::default();
        let compute = {
            let children = Arc::clone(&children);
            move || {
                // Snapshot so the lock is not held while children are read.
                let children = children.read().clone();
                aggregate(&children)
            }
        };

        let composite = Self {
            expression: LiveExpression::new(initial, compute),
            children,
        };
        composite.expression.refresh();
        composite
    }

    /// Append a child. The composite refreshes right away.
    pub fn add_child(&self, child: LiveExpression<C>) -> &Self {
        tracing::trace!(composite = %self.expression.id(), child = %child.id(), "adding child");
        self.children.write().push(child.clone());
        self.expression.depends_on(&child);
        self
    }

    /// The children, in insertion order.
    pub fn children(&self) -> Vec<LiveExpression<C>> {
        self.children.read().to_vec()
    }

    pub fn expression(&self) -> &LiveExpression<V> {
        &self.expression
    }
}

impl<C: LiveValue, V: LiveValue> Clone for CompositeExpression<C, V> {
    fn clone(&self) -> Self {
        Self {
            expression: self.expression.clone(),
            children: Arc::clone(&self.children),
        }
    }
}

impl<C: LiveValue, V: LiveValue> Deref for CompositeExpression<C, V> {
    type Target = LiveExpression<V>;

    fn deref(&self) -> &Self::Target {
        &self.expression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::LiveVariable;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn sum() -> CompositeExpression<i32, i32> {
        CompositeExpression::new(-1, |children: &[LiveExpression<i32>]| {
            children.iter().map(|child| child.get_value()).sum()
        })
    }

    #[test]
    fn aggregate_tracks_children() {
        let a = LiveVariable::new(1);
        let b = LiveVariable::new(2);
        let total = sum();
        assert_eq!(total.get_value(), 0);

        total.add_child(a.expression().clone()).add_child(b.expression().clone());
        assert_eq!(total.get_value(), 3);

        a.set_value(10);
        assert_eq!(total.get_value(), 12);
        assert_eq!(total.children().len(), 2);
    }

    #[test]
    fn composites_nest() {
        let a = LiveVariable::new(1);
        let inner = sum();
        inner.add_child(a.expression().clone());

        let outer = sum();
        outer.add_child(inner.expression().clone());
        outer.add_child(LiveExpression::constant(100));

        let notified = Arc::new(AtomicI32::new(0));
        let notified_clone = notified.clone();
        outer.add_listener(move |_, _| {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        a.set_value(5);
        assert_eq!(outer.get_value(), 105);
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispose_releases_children() {
        let a = LiveVariable::new(1);
        let total = sum();
        total.add_child(a.expression().clone());
        assert_eq!(a.listener_count(), 1);

        total.dispose();
        assert_eq!(a.listener_count(), 0);
        assert!(!a.is_disposed());
    }
}
