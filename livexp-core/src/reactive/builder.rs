//! Builder for live expressions that need more than `LiveExpression::new`:
//! a background lane, a debounce window, a fallible compute function, or an
//! owner.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use super::expression::{Lane, LiveExpression, LiveValue, Strategy};
use crate::config::EngineConfig;
use crate::error::{BoxError, LiveError};
use crate::schedule::{AsyncMode, Scheduler};

/// Configures and creates a `LiveExpression`.
///
/// # Example
///
/// ```rust,ignore
/// let ports = LiveExpression::builder(Vec::new())
///     .refresh(AsyncMode::Async)
///     .scheduler(lane.clone())
///     .delay(Duration::from_millis(500))
///     .try_compute(move || scan_ports())
///     .build()?;
/// ```
pub struct Builder<V: LiveValue> {
    initial: V,
    strategy: Option<Strategy<V>>,
    refresh: AsyncMode,
    notify: AsyncMode,
    scheduler: Option<Arc<dyn Scheduler>>,
    delay: Duration,
    owner: Option<Arc<dyn Any + Send + Sync>>,
}

impl<V: LiveValue> Builder<V> {
    pub(crate) fn new(initial: V) -> Self {
        Self {
            initial,
            strategy: None,
            refresh: AsyncMode::Sync,
            notify: AsyncMode::Sync,
            scheduler: None,
            delay: Duration::ZERO,
            owner: None,
        }
    }

    /// The compute function. Without one the node recomputes its initial
    /// value.
    pub fn compute<F>(mut self, compute: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        self.strategy = Some(Strategy::Compute(Box::new(compute)));
        self
    }

    /// A compute function that may fail. Failures are logged and the node
    /// keeps its previous value.
    pub fn try_compute<F>(mut self, compute: F) -> Self
    where
        F: Fn() -> Result<V, BoxError> + Send + Sync + 'static,
    {
        self.strategy = Some(Strategy::Fallible(Box::new(compute)));
        self
    }

    /// Where recomputation runs.
    pub fn refresh(mut self, mode: AsyncMode) -> Self {
        self.refresh = mode;
        self
    }

    /// Where change notification runs.
    pub fn notify(mut self, mode: AsyncMode) -> Self {
        self.notify = mode;
        self
    }

    /// The lane used by whichever step is `AsyncMode::Async`.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Debounce window for scheduled steps.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Take the debounce window from an engine config.
    pub fn config(self, config: &EngineConfig) -> Self {
        self.delay(config.refresh_delay())
    }

    /// Record the model object owning the node (kept as a weak reference).
    pub fn owner<O: Any + Send + Sync>(mut self, owner: &Arc<O>) -> Self {
        let owner: Arc<dyn Any + Send + Sync> = owner.clone();
        self.owner = Some(owner);
        self
    }

    /// Create the node. Fails if a step is async but no scheduler was given.
    pub fn build(self) -> Result<LiveExpression<V>, LiveError> {
        let lane = match (self.refresh, self.notify) {
            (AsyncMode::Sync, AsyncMode::Sync) => None,
            _ => {
                let scheduler = self.scheduler.ok_or(if self.refresh == AsyncMode::Async {
                    LiveError::MissingScheduler("refresh")
                } else {
                    LiveError::MissingScheduler("notify")
                })?;
                Some(Lane::new(scheduler, self.refresh, self.notify, self.delay))
            }
        };

        let strategy = match self.strategy {
            Some(strategy) => strategy,
            None => {
                let initial = self.initial.clone();
                Strategy::Compute(Box::new(move || initial.clone()))
            }
        };

        let expression = LiveExpression::from_parts(self.initial, strategy, lane);
        if let Some(owner) = &self.owner {
            expression.set_owner_dyn(owner);
        }
        Ok(expression)
    }
}
