//! Set snapshots and the settable set variable.

use std::hash::Hash;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::dispose::{Disposable, OnDispose};
use crate::reactive::{Lane, LiveExpression, Strategy};
use crate::schedule::{AsyncMode, Scheduler};

/// Elements an observable set can hold.
pub trait SetElement: Clone + Eq + Hash + Send + Sync + 'static {}

impl<T> SetElement for T where T: Clone + Eq + Hash + Send + Sync + 'static {}

/// An immutable set snapshot.
///
/// Iteration follows insertion order, but equality ignores order. Clones
/// share the underlying set.
#[derive(Clone)]
pub struct ImmutableSet<T: SetElement> {
    elements: Arc<IndexSet<T>>,
}

impl<T: SetElement> ImmutableSet<T> {
    pub fn empty() -> Self {
        Self::default()
    }
}

impl<T: SetElement> Default for ImmutableSet<T> {
    fn default() -> Self {
        Self {
            elements: Arc::new(IndexSet::new()),
        }
    }
}

impl<T: SetElement> Deref for ImmutableSet<T> {
    type Target = IndexSet<T>;

    fn deref(&self) -> &Self::Target {
        &self.elements
    }
}

impl<T: SetElement> PartialEq for ImmutableSet<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements) || *self.elements == *other.elements
    }
}

impl<T: SetElement> Eq for ImmutableSet<T> {}

impl<T: SetElement> From<IndexSet<T>> for ImmutableSet<T> {
    fn from(elements: IndexSet<T>) -> Self {
        Self {
            elements: Arc::new(elements),
        }
    }
}

impl<T: SetElement> FromIterator<T> for ImmutableSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let elements: IndexSet<T> = iter.into_iter().collect();
        elements.into()
    }
}

impl<'a, T: SetElement> IntoIterator for &'a ImmutableSet<T> {
    type Item = &'a T;
    type IntoIter = indexmap::set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T> std::fmt::Debug for ImmutableSet<T>
where
    T: SetElement + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.elements.iter()).finish()
    }
}

/// A live expression whose value is a set snapshot.
pub type ObservableSet<T> = LiveExpression<ImmutableSet<T>>;

/// A settable observable set.
///
/// Edits are applied to a backing set. Only edits that change membership
/// mark it dirty and refresh; a refresh while clean is skipped without
/// taking a snapshot or counting as a refresh.
///
/// # Example
///
/// ```rust,ignore
/// let apps = LiveSetVariable::new();
/// apps.add_all(["web", "worker"]);
/// assert!(apps.get_value().contains("web"));
/// ```
pub struct LiveSetVariable<T: SetElement> {
    set: ObservableSet<T>,
    backing: Arc<Mutex<IndexSet<T>>>,
    dirty: Arc<AtomicBool>,
}

impl<T: SetElement> LiveSetVariable<T> {
    /// An empty set variable that refreshes synchronously.
    pub fn new() -> Self {
        Self::with_lane(IndexSet::new(), None)
    }

    /// A set variable holding `values`.
    pub fn with_values<I: IntoIterator<Item = T>>(values: I) -> Self {
        Self::with_lane(values.into_iter().collect(), None)
    }

    /// A set variable whose snapshots are taken according to `refresh`.
    /// With `AsyncMode::Async`, a burst of edits within `delay` produces one
    /// snapshot.
    pub fn scheduled(scheduler: Arc<dyn Scheduler>, refresh: AsyncMode, delay: Duration) -> Self {
        Self::with_lane(
            IndexSet::new(),
            Some(Lane::new(scheduler, refresh, AsyncMode::Sync, delay)),
        )
    }

    fn with_lane(values: IndexSet<T>, lane: Option<Lane>) -> Self {
        let initial = ImmutableSet::from(values.clone());
        let backing = Arc::new(Mutex::new(values));
        let dirty = Arc::new(AtomicBool::new(false));

        let compute = {
            let backing = Arc::clone(&backing);
            move || ImmutableSet::from(backing.lock().clone())
        };
        let strategy = Strategy::Dirty {
            dirty: Arc::clone(&dirty),
            compute: Box::new(compute),
        };

        Self {
            set: LiveExpression::from_parts(initial, strategy, lane),
            backing,
            dirty,
        }
    }

    /// Apply `edit` to the backing set; if it reports a change, mark the
    /// set dirty and refresh.
    fn edit<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut IndexSet<T>) -> bool,
    {
        let changed = {
            let mut backing = self.backing.lock();
            let changed = edit(&mut backing);
            if changed {
                self.dirty.store(true, Ordering::Release);
            }
            changed
        };
        if changed {
            self.set.refresh();
        }
        changed
    }

    /// Add an element. Returns `false` if it was already present.
    pub fn add(&self, element: T) -> bool {
        self.edit(|backing| backing.insert(element))
    }

    /// Remove an element. Returns `false` if it was not present.
    pub fn remove(&self, element: &T) -> bool {
        self.edit(|backing| backing.shift_remove(element))
    }

    /// Add every element, then refresh at most once.
    pub fn add_all<I: IntoIterator<Item = T>>(&self, elements: I) -> bool {
        self.edit(|backing| {
            let before = backing.len();
            backing.extend(elements);
            backing.len() != before
        })
    }

    /// Replace the contents, then refresh at most once (not at all if the
    /// new contents equal the old).
    pub fn replace_all<I: IntoIterator<Item = T>>(&self, elements: I) -> bool {
        let replacement: IndexSet<T> = elements.into_iter().collect();
        self.edit(|backing| {
            if *backing == replacement {
                false
            } else {
                *backing = replacement;
                true
            }
        })
    }

    /// Membership in the backing set, including edits not yet snapshotted.
    pub fn contains(&self, element: &T) -> bool {
        self.backing.lock().contains(element)
    }

    /// Whether edits are waiting for a refresh.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn expression(&self) -> &ObservableSet<T> {
        &self.set
    }
}

impl<T: SetElement> Default for LiveSetVariable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SetElement> Clone for LiveSetVariable<T> {
    fn clone(&self) -> Self {
        Self {
            set: self.set.clone(),
            backing: Arc::clone(&self.backing),
            dirty: Arc::clone(&self.dirty),
        }
    }
}

impl<T: SetElement> Deref for LiveSetVariable<T> {
    type Target = ObservableSet<T>;

    fn deref(&self) -> &Self::Target {
        &self.set
    }
}

impl<T: SetElement> Disposable for LiveSetVariable<T> {
    fn dispose(&self) {
        self.set.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.set.is_disposed()
    }
}

impl<T: SetElement> OnDispose for LiveSetVariable<T> {
    fn on_dispose<F>(&self, handler: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        let (backing, dirty) = (Arc::clone(&self.backing), Arc::clone(&self.dirty));
        self.set.on_dispose(move |set| {
            handler(&LiveSetVariable {
                set: set.clone(),
                backing,
                dirty,
            })
        });
    }
}

impl<T> std::fmt::Debug for LiveSetVariable<T>
where
    T: SetElement + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSetVariable")
            .field("id", &self.set.id())
            .field("value", &self.set.get_value())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
