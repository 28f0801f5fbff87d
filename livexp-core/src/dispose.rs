//! Disposal and Lifecycle
//!
//! Everything in the engine that holds subscriptions follows the same
//! lifecycle: it is live until `dispose()` is called once, after which it is
//! disposed forever. Dispose handlers registered before that point run at
//! disposal, in registration order. Handlers registered afterwards run
//! immediately, so a late subscriber never misses the event.
//!
//! `DisposeHandlers` is the reusable building block. Live expressions embed
//! one, and `DisposableScope` wraps one for code that just needs an owner to
//! hang children on.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

/// A one-shot handler run when its owner is disposed.
pub type DisposeHandler<T> = Box<dyn FnOnce(&T) + Send + 'static>;

/// Something with a one-way `Live -> Disposed` lifecycle.
pub trait Disposable: Send + Sync {
    /// Dispose this object. Calling it again is a no-op.
    fn dispose(&self);

    /// Whether `dispose` has been called. Once true, always true.
    fn is_disposed(&self) -> bool;
}

/// Objects that announce their disposal.
pub trait OnDispose: Disposable + Sized {
    /// Register a handler run once with `self` at disposal time. If `self`
    /// is already disposed the handler runs right away.
    fn on_dispose<F>(&self, handler: F)
    where
        F: FnOnce(&Self) + Send + 'static;

    /// Make `self` the owner of `child`: disposing `self` disposes `child`.
    ///
    /// Returns `child` so construction can be written inline.
    fn add_disposable_child<C>(&self, child: C) -> C
    where
        C: Disposable + Clone + 'static,
    {
        let owned = child.clone();
        self.on_dispose(move |_| owned.dispose());
        child
    }
}

/// The dispose handler list.
///
/// `None` marks the disposed state: the list is handed off exactly once.
pub struct DisposeHandlers<T> {
    handlers: Mutex<Option<SmallVec<[DisposeHandler<T>; 2]>>>,
}

impl<T> DisposeHandlers<T> {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Some(SmallVec::new())),
        }
    }

    /// Queue `handler`, or run it against `target` if already disposed.
    pub fn add(&self, target: &T, handler: DisposeHandler<T>) {
        let mut handlers = self.handlers.lock();
        match handlers.as_mut() {
            Some(list) => list.push(handler),
            None => {
                // Never run foreign code under the lock.
                drop(handlers);
                handler(target);
            }
        }
    }

    /// Hand off the handler list, switching to the disposed state.
    ///
    /// Returns `None` on every call but the first.
    pub fn take(&self) -> Option<SmallVec<[DisposeHandler<T>; 2]>> {
        self.handlers.lock().take()
    }

    /// Run the disposal sequence. Returns `false` if already disposed.
    pub fn dispose(&self, target: &T) -> bool {
        match self.take() {
            Some(handlers) => {
                for handler in handlers {
                    handler(target);
                }
                true
            }
            None => false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.handlers.lock().is_none()
    }

    /// Number of handlers waiting for disposal.
    pub fn len(&self) -> usize {
        self.handlers.lock().as_ref().map_or(0, |list| list.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for DisposeHandlers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A standalone lifetime owner.
///
/// Useful for models that create several live expressions and want to tear
/// them all down together:
///
/// ```rust,ignore
/// let scope = DisposableScope::new();
/// let name = scope.add_disposable_child(LiveVariable::new(String::new()));
/// let valid = scope.add_disposable_child(name.apply(|n| !n.is_empty()));
/// scope.dispose(); // disposes `valid` and `name`
/// ```
#[derive(Clone, Default)]
pub struct DisposableScope {
    handlers: Arc<DisposeHandlers<DisposableScope>>,
}

impl DisposableScope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Disposable for DisposableScope {
    fn dispose(&self) {
        if self.handlers.dispose(self) {
            tracing::debug!("disposable scope disposed");
        }
    }

    fn is_disposed(&self) -> bool {
        self.handlers.is_disposed()
    }
}

impl OnDispose for DisposableScope {
    fn on_dispose<F>(&self, handler: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        self.handlers.add(self, Box::new(handler));
    }
}

impl std::fmt::Debug for DisposableScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposableScope")
            .field("pending_handlers", &self.handlers.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Handle returned by `LiveExpression::on_change`. Disposing it removes the
/// listener it stands for.
#[derive(Clone)]
pub struct Subscription {
    cancel: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl Subscription {
    pub(crate) fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Arc::new(Mutex::new(Some(Box::new(cancel)))),
        }
    }
}

impl Disposable for Subscription {
    fn dispose(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    fn is_disposed(&self) -> bool {
        self.cancel.lock().is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
