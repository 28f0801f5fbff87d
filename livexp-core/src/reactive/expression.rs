//! Live Expression Implementation
//!
//! A `LiveExpression` is a cached value plus the function that computes it.
//! Interested parties subscribe with a listener and are told whenever the
//! cached value changes.
//!
//! # How Refresh Works
//!
//! 1. `refresh()` runs the compute function, reading whatever inputs it
//!    closes over (usually the values of other live expressions).
//!
//! 2. The result is compared against the cached value. If it differs, it is
//!    stored and the listeners are notified with the node and its new value.
//!
//! 3. Whether or not the value changed, the refresh counter (if anyone asked
//!    for it) is bumped.
//!
//! Dependent nodes are just listeners that call `refresh()` on themselves,
//! so a change cascades depth-first through the graph in subscription order.
//! A dependency is notified only after its own compute and equality check
//! finished, so dependents always read the settled value.
//!
//! # Lifetime
//!
//! A dependency holds its dependents weakly. A derived node stays alive
//! while a handle to it exists or while it has listeners of its own; a
//! derived node nobody can observe is dropped and unhooks itself from its
//! sources. `dispose()` ends every edge regardless.
//!
//! # Locking
//!
//! Each node has its own locks; unrelated nodes never contend. The compute
//! step and the value swap run under the node's refresh lock. Listeners are
//! always called after that lock is released, so a listener may refresh any
//! node, including ones that depend back on the notifying node.
//!
//! # Failure
//!
//! A panic inside the compute function propagates to whoever called
//! `refresh()`. The cached value is left at its last good state and the
//! node stays usable (`parking_lot` locks do not poison). Fallible compute
//! functions installed through the builder log their errors instead.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::builder::Builder;
use super::context::RefreshContext;
use super::listener::{Listener, ListenerId, ListenerList, NodeId};
use super::variable::LiveVariable;
use crate::dispose::{Disposable, DisposeHandlers, OnDispose, Subscription};
use crate::error::BoxError;
use crate::schedule::{AsyncMode, JobSlot, Scheduler, Task};

/// Values a live expression can hold.
///
/// `PartialEq` decides whether a refresh counts as a change. Nullable values
/// are expressed with `Option`.
pub trait LiveValue: Clone + PartialEq + Send + Sync + 'static {}

impl<T> LiveValue for T where T: Clone + PartialEq + Send + Sync + 'static {}

pub(crate) type ComputeFn<V> = Box<dyn Fn() -> V + Send + Sync>;
pub(crate) type TryComputeFn<V> = Box<dyn Fn() -> Result<V, BoxError> + Send + Sync>;
type Release = Box<dyn FnOnce() + Send>;

/// How a node produces its value.
pub(crate) enum Strategy<V> {
    /// Never recomputes. Listeners get one delivery and are not stored.
    Constant,

    /// Plain compute function.
    Compute(ComputeFn<V>),

    /// Compute function whose errors are logged; the old value is kept.
    Fallible(TryComputeFn<V>),

    /// Only computes when the shared dirty flag is set.
    Dirty {
        dirty: Arc<AtomicBool>,
        compute: ComputeFn<V>,
    },
}

enum Outcome<V> {
    /// Nothing to do; does not count as a refresh.
    Skipped,

    /// The computation failed and the previous value stands.
    Kept,

    Computed(V),
}

impl<V> Strategy<V> {
    /// True when a refresh would certainly be skipped.
    fn is_settled(&self) -> bool {
        match self {
            Strategy::Constant => true,
            Strategy::Dirty { dirty, .. } => !dirty.load(Ordering::Acquire),
            Strategy::Compute(_) | Strategy::Fallible(_) => false,
        }
    }

    fn evaluate(&self, node: NodeId) -> Outcome<V> {
        match self {
            Strategy::Constant => Outcome::Skipped,
            Strategy::Compute(compute) => Outcome::Computed(compute()),
            Strategy::Fallible(compute) => match compute() {
                Ok(value) => Outcome::Computed(value),
                Err(error) => {
                    tracing::warn!(%node, %error, "compute failed, keeping previous value");
                    Outcome::Kept
                }
            },
            Strategy::Dirty { dirty, compute } => {
                if dirty.swap(false, Ordering::AcqRel) {
                    let _redirty = Redirty(dirty);
                    Outcome::Computed(compute())
                } else {
                    Outcome::Skipped
                }
            }
        }
    }
}

/// Sets the dirty flag again if the compute function unwinds, so the edit
/// it was snapshotting is picked up by the next refresh.
struct Redirty<'a>(&'a AtomicBool);

impl Drop for Redirty<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.store(true, Ordering::Release);
        }
    }
}

/// Scheduling settings of a node that uses a background lane.
pub(crate) struct Lane {
    scheduler: Arc<dyn Scheduler>,
    refresh: AsyncMode,
    notify: AsyncMode,
    delay: Mutex<Duration>,
    refresh_job: JobSlot,
    notify_job: JobSlot,
}

impl Lane {
    pub(crate) fn new(
        scheduler: Arc<dyn Scheduler>,
        refresh: AsyncMode,
        notify: AsyncMode,
        delay: Duration,
    ) -> Self {
        Self {
            scheduler,
            refresh,
            notify,
            delay: Mutex::new(delay),
            refresh_job: JobSlot::new(),
            notify_job: JobSlot::new(),
        }
    }

    fn delay(&self) -> Duration {
        *self.delay.lock()
    }

    /// Notification gets its own hop only when the refresh itself did not
    /// already run on the lane.
    fn schedules_notify(&self) -> bool {
        self.notify == AsyncMode::Async && self.refresh == AsyncMode::Sync
    }
}

struct Inner<V: LiveValue> {
    id: NodeId,

    /// The last computed value.
    value: RwLock<V>,

    strategy: Strategy<V>,

    /// Serializes compute-and-swap. Never held while listeners run.
    refresh_lock: Mutex<()>,

    /// `None` once disposed.
    listeners: Mutex<Option<ListenerList<V>>>,

    dispose_handlers: DisposeHandlers<LiveExpression<V>>,

    /// Unhooks this node from the nodes it depends on. Run on dispose or
    /// drop, whichever comes first. `None` once run.
    sources: Mutex<Option<SmallVec<[Release; 2]>>>,

    /// Self-reference held while a derived node has listeners.
    pin: Mutex<Option<LiveExpression<V>>>,

    /// Created on first request by `refresh_count()`.
    refresh_count: OnceLock<LiveVariable<u64>>,

    /// Lookup-only back-reference to whatever model owns this node.
    owner: RwLock<Option<Weak<dyn Any + Send + Sync>>>,

    lane: Option<Lane>,
}

impl<V: LiveValue> Drop for Inner<V> {
    fn drop(&mut self) {
        if let Some(releases) = self.sources.get_mut().take() {
            if !releases.is_empty() {
                tracing::trace!(node = %self.id, "dropped derived node, releasing sources");
            }
            for release in releases {
                release();
            }
        }
    }
}

/// A value that keeps itself up to date and tells listeners when it changes.
///
/// Cloning a `LiveExpression` yields another handle to the same node.
///
/// # Example
///
/// ```rust,ignore
/// let celsius = LiveVariable::new(20.0);
/// let fahrenheit = celsius.apply(|c| c * 9.0 / 5.0 + 32.0);
///
/// fahrenheit.add_listener(|_, f| println!("{f}°F"));   // prints 68°F
/// celsius.set_value(100.0);                            // prints 212°F
/// ```
pub struct LiveExpression<V: LiveValue> {
    inner: Arc<Inner<V>>,
}

/// A non-owning handle to a live expression.
pub struct WeakExpression<V: LiveValue> {
    inner: Weak<Inner<V>>,
}

impl<V: LiveValue> WeakExpression<V> {
    pub fn upgrade(&self) -> Option<LiveExpression<V>> {
        self.inner.upgrade().map(|inner| LiveExpression { inner })
    }
}

impl<V: LiveValue> Clone for WeakExpression<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<V: LiveValue> LiveExpression<V> {
    /// Create a node holding `initial` that recomputes with `compute`.
    ///
    /// The compute function does not run until the first `refresh()`,
    /// which usually comes from the first `depends_on` call.
    pub fn new<F>(initial: V, compute: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self::from_parts(initial, Strategy::Compute(Box::new(compute)), None)
    }

    /// A node whose value never changes.
    pub fn constant(value: V) -> Self {
        Self::from_parts(value, Strategy::Constant, None)
    }

    /// Start building a node with scheduling or fallible computation.
    pub fn builder(initial: V) -> Builder<V> {
        Builder::new(initial)
    }

    pub(crate) fn from_parts(initial: V, strategy: Strategy<V>, lane: Option<Lane>) -> Self {
        let expression = Self {
            inner: Arc::new(Inner {
                id: NodeId::new(),
                value: RwLock::new(initial),
                strategy,
                refresh_lock: Mutex::new(()),
                listeners: Mutex::new(Some(ListenerList::new())),
                dispose_handlers: DisposeHandlers::new(),
                sources: Mutex::new(Some(SmallVec::new())),
                pin: Mutex::new(None),
                refresh_count: OnceLock::new(),
                owner: RwLock::new(None),
                lane,
            }),
        };
        tracing::trace!(node = %expression.inner.id, "created live expression");
        expression
    }

    /// Get the node's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The cached value. Never triggers a computation.
    pub fn get_value(&self) -> V {
        self.inner.value.read().clone()
    }

    /// Whether this node was created with `constant`.
    pub fn is_constant(&self) -> bool {
        matches!(self.inner.strategy, Strategy::Constant)
    }

    /// Ask the node to recompute its value from its inputs.
    ///
    /// On a node with an async refresh lane this only (re)schedules the
    /// refresh job. On a disposed node it does nothing.
    pub fn refresh(&self) {
        if self.is_disposed() {
            tracing::trace!(node = %self.inner.id, "ignoring refresh of disposed node");
            return;
        }
        if self.inner.strategy.is_settled() {
            return;
        }
        if let Some(lane) = &self.inner.lane {
            if lane.refresh == AsyncMode::Async {
                lane.refresh_job.trigger(
                    lane.scheduler.as_ref(),
                    lane.delay(),
                    self.job(LiveExpression::refresh_now),
                );
                return;
            }
        }
        self.refresh_now();
    }

    /// The synchronous refresh algorithm, also the body of refresh jobs.
    fn refresh_now(&self) {
        if self.is_disposed() {
            return;
        }
        let _frame = RefreshContext::enter(self.inner.id);

        let changed = {
            let _guard = self.inner.refresh_lock.lock();
            match self.inner.strategy.evaluate(self.inner.id) {
                Outcome::Skipped => return,
                Outcome::Kept => false,
                Outcome::Computed(new_value) => {
                    let mut value = self.inner.value.write();
                    if *value != new_value {
                        *value = new_value;
                        true
                    } else {
                        false
                    }
                }
            }
        };
        tracing::trace!(node = %self.inner.id, changed, "refreshed");

        if changed {
            self.changed();
        }
        if let Some(count) = self.inner.refresh_count.get() {
            count.update(|n| n + 1);
        }
    }

    fn changed(&self) {
        if let Some(lane) = &self.inner.lane {
            if lane.schedules_notify() {
                lane.notify_job.trigger(
                    lane.scheduler.as_ref(),
                    lane.delay(),
                    self.job(LiveExpression::notify_listeners),
                );
                return;
            }
        }
        self.notify_listeners();
    }

    fn notify_listeners(&self) {
        let listeners = match self.inner.listeners.lock().as_ref() {
            Some(list) => list.snapshot(),
            None => return,
        };
        let value = self.get_value();
        for listener in listeners {
            listener(self, &value);
        }
    }

    /// Build a job body that runs `step` on this node if it is still alive.
    fn job(&self, step: fn(&LiveExpression<V>)) -> impl FnOnce() -> Task {
        let target = self.downgrade();
        move || -> Task {
            Box::new(move || {
                if let Some(node) = target.upgrade() {
                    step(&node);
                }
            })
        }
    }

    /// Declare that this node must refresh whenever `other` changes.
    ///
    /// The subscription is removed when this node is disposed or dropped.
    /// Registering it delivers `other`'s current value, so this node
    /// refreshes once right away.
    pub fn depends_on<O: LiveValue>(&self, other: &LiveExpression<O>) -> &Self {
        let listener = other.add_listener(self.refresher());
        self.release_on_teardown(other, listener);
        self
    }

    /// Like `depends_on` for a node whose value was just computed from
    /// `seen`, the current value of `other`. The extra refresh only runs if
    /// `other` moved on in the meantime.
    pub(crate) fn seeded_from<O: LiveValue>(&self, other: &LiveExpression<O>, seen: &O) -> &Self {
        let listener = other.insert_listener(Arc::new(self.refresher()));
        self.release_on_teardown(other, listener);
        if other.get_value() != *seen {
            self.refresh();
        }
        self
    }

    fn refresher<O: LiveValue>(&self) -> impl Fn(&LiveExpression<O>, &O) + Send + Sync + 'static {
        let dependent = self.downgrade();
        move |_, _| {
            if let Some(dependent) = dependent.upgrade() {
                dependent.refresh();
            }
        }
    }

    fn release_on_teardown<O: LiveValue>(&self, other: &LiveExpression<O>, listener: ListenerId) {
        let other = other.clone();
        self.add_source_release(move || other.remove_listener(listener));
    }

    /// Register `release` to run when this node is disposed or dropped, and
    /// mark the node as derived. Runs it now if the node is disposed.
    pub(crate) fn add_source_release<F>(&self, release: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let rejected = match self.inner.sources.lock().as_mut() {
            Some(releases) => {
                releases.push(Box::new(release));
                None
            }
            None => Some(release),
        };
        match rejected {
            Some(release) => release(),
            None => self.repin(),
        }
    }

    /// Hold a self-reference while this node is derived and has listeners,
    /// so that listening on a derived node keeps it running.
    fn repin(&self) {
        let released = {
            let listeners = self.inner.listeners.lock();
            let listened = listeners.as_ref().is_some_and(|list| !list.is_empty());
            let derived = self
                .inner
                .sources
                .lock()
                .as_ref()
                .is_some_and(|releases| !releases.is_empty());
            let mut pin = self.inner.pin.lock();
            if listened && derived {
                if pin.is_none() {
                    *pin = Some(self.clone());
                }
                None
            } else {
                pin.take()
            }
        };
        drop(released);
    }

    /// Subscribe to value changes.
    ///
    /// The listener is called with the current value before this returns,
    /// and again after every change. Listeners added to a disposed node are
    /// dropped without being called.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&LiveExpression<V>, &V) + Send + Sync + 'static,
    {
        let listener: Listener<V> = Arc::new(listener);
        let id = self.insert_listener(Arc::clone(&listener));
        if self.is_disposed() && !self.is_constant() {
            return id;
        }

        let value = self.get_value();
        listener(self, &value);
        id
    }

    /// Store a listener without the initial delivery. Constants and
    /// disposed nodes store nothing.
    fn insert_listener(&self, listener: Listener<V>) -> ListenerId {
        let id = ListenerId::new();
        if self.is_constant() {
            return id;
        }
        let inserted = match self.inner.listeners.lock().as_mut() {
            Some(list) => {
                list.insert(id, listener);
                true
            }
            None => false,
        };
        if inserted {
            self.repin();
        }
        id
    }

    /// Remove a listener. Unknown IDs are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        let removed = self
            .inner
            .listeners
            .lock()
            .as_mut()
            .is_some_and(|list| list.remove(id));
        if removed {
            self.repin();
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .as_ref()
            .map_or(0, |list| list.len())
    }

    /// Add a listener and get back a handle that removes it when disposed.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LiveExpression<V>, &V) + Send + Sync + 'static,
    {
        let id = self.add_listener(listener);
        let target = self.downgrade();
        Subscription::new(move || {
            if let Some(target) = target.upgrade() {
                target.remove_listener(id);
            }
        })
    }

    /// Add a listener that is removed when `owner` is disposed.
    pub fn on_change_owned<O, F>(&self, owner: &O, listener: F)
    where
        O: OnDispose,
        F: Fn(&LiveExpression<V>, &V) + Send + Sync + 'static,
    {
        let id = self.add_listener(listener);
        let target = self.downgrade();
        owner.on_dispose(move |_| {
            if let Some(target) = target.upgrade() {
                target.remove_listener(id);
            }
        });
    }

    /// A node counting completed refreshes of this one, changed or not.
    ///
    /// Depend on it to react to every refresh rather than to value changes.
    pub fn refresh_count(&self) -> LiveExpression<u64> {
        let counter = self.inner.refresh_count.get_or_init(|| {
            let counter = LiveVariable::new(0);
            self.add_disposable_child(counter.clone());
            counter
        });
        counter.expression().clone()
    }

    /// Run `handler` once when this node is disposed, or now if it already
    /// is.
    pub fn on_dispose<F>(&self, handler: F)
    where
        F: FnOnce(&LiveExpression<V>) + Send + 'static,
    {
        self.inner.dispose_handlers.add(self, Box::new(handler));
    }

    /// Tear the node down: run dispose handlers in registration order and
    /// drop all listeners. Later calls do nothing.
    pub fn dispose(&self) {
        let handlers = {
            let mut listeners = self.inner.listeners.lock();
            let handlers = self.inner.dispose_handlers.take();
            if handlers.is_some() {
                *listeners = None;
            }
            handlers
        };

        if let Some(handlers) = handlers {
            tracing::debug!(node = %self.inner.id, handlers = handlers.len(), "disposing live expression");
            let releases = self.inner.sources.lock().take();
            for release in releases.into_iter().flatten() {
                release();
            }
            for handler in handlers {
                handler(self);
            }
            let pin = self.inner.pin.lock().take();
            drop(pin);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.dispose_handlers.is_disposed()
    }

    /// Record the model object this node belongs to. Only a weak reference
    /// is kept.
    pub fn set_owner<O: Any + Send + Sync>(&self, owner: &Arc<O>) {
        let owner: Arc<dyn Any + Send + Sync> = owner.clone();
        *self.inner.owner.write() = Some(Arc::downgrade(&owner));
    }

    pub(crate) fn set_owner_dyn(&self, owner: &Arc<dyn Any + Send + Sync>) {
        *self.inner.owner.write() = Some(Arc::downgrade(owner));
    }

    /// The owner, if one was set and it is still alive.
    pub fn owner(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.inner.owner.read().as_ref().and_then(Weak::upgrade)
    }

    /// The owner, if it is alive and of type `O`.
    pub fn owner_as<O: Any + Send + Sync>(&self) -> Option<Arc<O>> {
        self.owner()?.downcast::<O>().ok()
    }

    /// Debounce window of the scheduling lane (zero for synchronous nodes).
    pub fn refresh_delay(&self) -> Duration {
        self.inner
            .lane
            .as_ref()
            .map_or(Duration::ZERO, Lane::delay)
    }

    /// Change the debounce window for future jobs. A job that is already
    /// pending keeps its deadline. No effect on synchronous nodes.
    pub fn set_refresh_delay(&self, delay: Duration) {
        if let Some(lane) = &self.inner.lane {
            *lane.delay.lock() = delay;
        }
    }

    pub fn downgrade(&self) -> WeakExpression<V> {
        WeakExpression {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<V: LiveValue> Clone for LiveExpression<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Identity comparison, so that nodes can themselves be live values.
impl<V: LiveValue> PartialEq for LiveExpression<V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<V: LiveValue> Eq for LiveExpression<V> {}

impl<V: LiveValue> Disposable for LiveExpression<V> {
    fn dispose(&self) {
        LiveExpression::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        LiveExpression::is_disposed(self)
    }
}

impl<V: LiveValue> OnDispose for LiveExpression<V> {
    fn on_dispose<F>(&self, handler: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        LiveExpression::on_dispose(self, handler)
    }
}

impl<V> std::fmt::Debug for LiveExpression<V>
where
    V: LiveValue + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveExpression")
            .field("id", &self.inner.id)
            .field("value", &self.get_value())
            .field("listener_count", &self.listener_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualScheduler;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counter_node(source: &Arc<AtomicI32>) -> LiveExpression<i32> {
        let source = source.clone();
        LiveExpression::new(0, move || source.load(Ordering::SeqCst))
    }

    fn notifications<V: LiveValue>(node: &LiveExpression<V>) -> Arc<Mutex<Vec<V>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        node.add_listener(move |_, value| seen_clone.lock().push(value.clone()));
        seen
    }

    #[test]
    fn refresh_stores_computed_value() {
        let source = Arc::new(AtomicI32::new(7));
        let node = counter_node(&source);

        assert_eq!(node.get_value(), 0);
        node.refresh();
        assert_eq!(node.get_value(), 7);
    }

    #[test]
    fn unchanged_refresh_does_not_notify_but_counts() {
        let source = Arc::new(AtomicI32::new(1));
        let node = counter_node(&source);
        let count = node.refresh_count();
        let seen = notifications(&node);

        node.refresh();
        node.refresh();

        // initial delivery plus one change
        assert_eq!(*seen.lock(), vec![0, 1]);
        assert_eq!(count.get_value(), 2);
    }

    #[test]
    fn listener_receives_current_value_on_registration() {
        let source = Arc::new(AtomicI32::new(3));
        let node = counter_node(&source);
        node.refresh();

        let seen = notifications(&node);
        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let source = Arc::new(AtomicI32::new(0));
        let node = counter_node(&source);
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order = order.clone();
            node.add_listener(move |_, value| order.lock().push((name, *value)));
        }
        order.lock().clear();

        source.store(1, Ordering::SeqCst);
        node.refresh();

        assert_eq!(
            *order.lock(),
            vec![("first", 1), ("second", 1), ("third", 1)]
        );
    }

    #[test]
    fn removed_listener_is_not_called() {
        let source = Arc::new(AtomicI32::new(0));
        let node = counter_node(&source);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let id = node.add_listener(move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        node.remove_listener(id);

        source.store(5, Ordering::SeqCst);
        node.refresh();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn depends_on_propagates_changes() {
        let source = Arc::new(AtomicI32::new(1));
        let x = counter_node(&source);
        x.refresh();

        let x_clone = x.clone();
        let y = LiveExpression::new(0, move || x_clone.get_value() * 2);
        y.depends_on(&x);
        assert_eq!(y.get_value(), 2);

        source.store(2, Ordering::SeqCst);
        x.refresh();
        assert_eq!(y.get_value(), 4);
    }

    #[test]
    fn dispose_removes_dependency_edge() {
        let source = Arc::new(AtomicI32::new(0));
        let x = counter_node(&source);

        let computed = Arc::new(AtomicI32::new(0));
        let y = {
            let x = x.clone();
            let computed = computed.clone();
            LiveExpression::new(0, move || {
                computed.fetch_add(1, Ordering::SeqCst);
                x.get_value()
            })
        };
        y.depends_on(&x);
        assert_eq!(x.listener_count(), 1);

        y.dispose();
        assert_eq!(x.listener_count(), 0);

        let before = computed.load(Ordering::SeqCst);
        source.store(9, Ordering::SeqCst);
        x.refresh();
        assert_eq!(computed.load(Ordering::SeqCst), before);
    }

    #[test]
    fn dispose_is_idempotent_and_clears_listeners() {
        let node = counter_node(&Arc::new(AtomicI32::new(0)));
        let disposals = Arc::new(AtomicI32::new(0));
        let disposals_clone = disposals.clone();
        node.add_listener(|_, _| {});
        node.on_dispose(move |_| {
            disposals_clone.fetch_add(1, Ordering::SeqCst);
        });

        node.dispose();
        node.dispose();

        assert!(node.is_disposed());
        assert_eq!(node.listener_count(), 0);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_dispose_after_disposal_fires_immediately() {
        let node = LiveExpression::new(0, || 0);
        node.dispose();

        let fired = Arc::new(AtomicI32::new(0));
        let fired_clone = fired.clone();
        node.on_dispose(move |disposed| {
            assert!(disposed.is_disposed());
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refresh_after_dispose_is_noop() {
        let source = Arc::new(AtomicI32::new(0));
        let node = counter_node(&source);
        node.dispose();

        source.store(4, Ordering::SeqCst);
        node.refresh();
        assert_eq!(node.get_value(), 0);
    }

    #[test]
    fn constant_delivers_once_and_keeps_no_listeners() {
        let node = LiveExpression::constant("fixed");
        let seen = notifications(&node);
        node.refresh();

        assert!(node.is_constant());
        assert_eq!(node.listener_count(), 0);
        assert_eq!(*seen.lock(), vec!["fixed"]);
    }

    #[test]
    fn panicking_compute_keeps_last_good_value() {
        let fail = Arc::new(AtomicBool::new(false));
        let source = Arc::new(AtomicI32::new(1));
        let node = {
            let fail = fail.clone();
            let source = source.clone();
            LiveExpression::new(0, move || {
                if fail.load(Ordering::SeqCst) {
                    panic!("input unavailable");
                }
                source.load(Ordering::SeqCst)
            })
        };
        node.refresh();

        fail.store(true, Ordering::SeqCst);
        source.store(2, Ordering::SeqCst);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| node.refresh()));
        assert!(result.is_err());
        assert_eq!(node.get_value(), 1);

        fail.store(false, Ordering::SeqCst);
        node.refresh();
        assert_eq!(node.get_value(), 2);
    }

    #[test]
    fn on_change_subscription_removes_listener() {
        let node = counter_node(&Arc::new(AtomicI32::new(0)));
        let subscription = node.on_change(|_, _| {});
        assert_eq!(node.listener_count(), 1);

        subscription.dispose();
        assert_eq!(node.listener_count(), 0);
    }

    #[test]
    fn owner_is_weak_and_typed() {
        struct Model {
            name: &'static str,
        }

        let node = LiveExpression::constant(1);
        let model = Arc::new(Model { name: "app" });
        node.set_owner(&model);

        assert_eq!(node.owner_as::<Model>().map(|m| m.name), Some("app"));
        assert!(node.owner_as::<String>().is_none());

        drop(model);
        assert!(node.owner().is_none());
    }

    #[test]
    fn async_refresh_coalesces_into_one_compute() {
        let scheduler = Arc::new(ManualScheduler::new());
        let source = Arc::new(AtomicI32::new(0));
        let computed = Arc::new(AtomicI32::new(0));
        let node = {
            let source = source.clone();
            let computed = computed.clone();
            LiveExpression::from_parts(
                0,
                Strategy::Compute(Box::new(move || {
                    computed.fetch_add(1, Ordering::SeqCst);
                    source.load(Ordering::SeqCst)
                })),
                Some(Lane::new(
                    scheduler.clone(),
                    AsyncMode::Async,
                    AsyncMode::Sync,
                    Duration::from_millis(100),
                )),
            )
        };

        for n in 1..=5 {
            source.store(n, Ordering::SeqCst);
            node.refresh();
            scheduler.advance(Duration::from_millis(10));
        }
        assert_eq!(computed.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(computed.load(Ordering::SeqCst), 1);
        assert_eq!(node.get_value(), 5);
    }

    #[test]
    fn async_notify_defers_listeners_only() {
        let scheduler = Arc::new(ManualScheduler::new());
        let source = Arc::new(AtomicI32::new(0));
        let node = {
            let source = source.clone();
            LiveExpression::from_parts(
                0,
                Strategy::Compute(Box::new(move || source.load(Ordering::SeqCst))),
                Some(Lane::new(
                    scheduler.clone(),
                    AsyncMode::Sync,
                    AsyncMode::Async,
                    Duration::ZERO,
                )),
            )
        };
        let seen = notifications(&node);

        source.store(1, Ordering::SeqCst);
        node.refresh();
        source.store(2, Ordering::SeqCst);
        node.refresh();

        assert_eq!(node.get_value(), 2);
        assert_eq!(*seen.lock(), vec![0]);

        scheduler.run_until_idle();
        assert_eq!(*seen.lock(), vec![0, 2]);
    }

    #[test]
    fn delay_change_leaves_pending_job_alone() {
        let scheduler = Arc::new(ManualScheduler::new());
        let node = LiveExpression::from_parts(
            0,
            Strategy::Compute(Box::new(|| 1)),
            Some(Lane::new(
                scheduler.clone(),
                AsyncMode::Async,
                AsyncMode::Sync,
                Duration::from_millis(50),
            )),
        );

        node.refresh();
        node.set_refresh_delay(Duration::from_millis(500));
        assert_eq!(node.refresh_delay(), Duration::from_millis(500));

        scheduler.advance(Duration::from_millis(50));
        assert_eq!(node.get_value(), 1);
    }

    #[test]
    fn async_job_on_disposed_node_is_harmless() {
        let scheduler = Arc::new(ManualScheduler::new());
        let node = LiveExpression::from_parts(
            0,
            Strategy::Compute(Box::new(|| 1)),
            Some(Lane::new(
                scheduler.clone(),
                AsyncMode::Async,
                AsyncMode::Sync,
                Duration::ZERO,
            )),
        );

        node.refresh();
        node.dispose();
        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(node.get_value(), 0);
    }

    #[test]
    fn dropped_derived_nodes_release_their_sources() {
        let x = LiveVariable::new(1);
        for _ in 0..1000 {
            let _ = x.apply(|v| v + 1);
        }
        assert_eq!(x.listener_count(), 0);

        let chained = x.apply(|v| v + 1).apply(|v| v * 2);
        assert_eq!(x.listener_count(), 1);
        drop(chained);
        assert_eq!(x.listener_count(), 0);
    }

    #[test]
    fn listened_derived_node_keeps_running_without_a_handle() {
        let x = LiveVariable::new(1);
        let stored = Arc::new(AtomicI32::new(0));
        {
            let stored = stored.clone();
            x.apply(|v| v * 2)
                .add_listener(move |_, v| stored.store(*v, Ordering::SeqCst));
        }

        x.set_value(5);
        assert_eq!(stored.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn dropping_last_listener_releases_unreferenced_node() {
        let x = LiveVariable::new(1);
        let stored = Arc::new(AtomicI32::new(0));
        let subscription = {
            let stored = stored.clone();
            x.apply(|v| v + 100)
                .on_change(move |_, v| stored.store(*v, Ordering::SeqCst))
        };
        assert_eq!(x.listener_count(), 1);

        x.set_value(2);
        assert_eq!(stored.load(Ordering::SeqCst), 102);

        subscription.dispose();
        assert_eq!(x.listener_count(), 0);
        x.set_value(3);
        assert_eq!(stored.load(Ordering::SeqCst), 102);
    }

    #[test]
    fn dirty_flag_survives_panicking_compute() {
        let dirty = Arc::new(AtomicBool::new(true));
        let fail = Arc::new(AtomicBool::new(true));
        let node = {
            let fail = fail.clone();
            LiveExpression::from_parts(
                0,
                Strategy::Dirty {
                    dirty: dirty.clone(),
                    compute: Box::new(move || {
                        if fail.load(Ordering::SeqCst) {
                            panic!("snapshot failed");
                        }
                        7
                    }),
                },
                None,
            )
        };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| node.refresh()));
        assert!(result.is_err());
        assert!(dirty.load(Ordering::SeqCst));

        fail.store(false, Ordering::SeqCst);
        node.refresh();
        assert_eq!(node.get_value(), 7);
        assert!(!dirty.load(Ordering::SeqCst));
    }

    #[test]
    fn listeners_may_reenter_the_notifying_node() {
        let x = LiveVariable::new(1);
        let y = x.apply(|v| v * 10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let (x_handle, y, seen) = (x.clone(), y.clone(), seen.clone());
            x.add_listener(move |node, value| {
                // No lock of `x` may be held here.
                y.refresh();
                seen.lock().push((*value, y.get_value(), node.listener_count()));
                if *value > 10 {
                    x_handle.set_value(10);
                }
            });
        }
        seen.lock().clear();

        x.set_value(50);

        assert_eq!(x.get_value(), 10);
        assert_eq!(y.get_value(), 100);
        assert_eq!(*seen.lock(), vec![(50, 500, 2), (10, 100, 2)]);
    }

    #[test]
    fn concurrent_updates_settle_on_final_value() {
        let x = LiveVariable::new(0);
        let y = x.apply(|v| v * 2);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let (x, y) = (x.clone(), y.clone());
                scope.spawn(move || {
                    for _ in 0..1000 {
                        x.update(|n| n + 1);
                        y.refresh();
                    }
                });
            }
        });

        assert_eq!(x.get_value(), 8000);
        assert_eq!(y.get_value(), 16000);
    }
}
