//! Scheduling Lanes
//!
//! Live expressions normally refresh and notify on the caller's thread. A
//! node may instead push either step onto a background lane, supplied by the
//! host as a `Scheduler`. The engine never reaches for a global scheduler:
//! production code hands in a `TokioScheduler`, tests hand in a
//! `ManualScheduler` and step its virtual clock.
//!
//! # Coalescing
//!
//! A scheduler job runs its task once, after a delay. While a job is still
//! waiting, `reschedule` moves its deadline instead of creating a second job.
//! Every node keeps one `JobSlot` per scheduled step, so a burst of
//! `refresh()` calls collapses into one pending job whose body reads the
//! node's state only when it finally runs.

mod job;
mod manual;
mod tokio_lane;

pub use job::JobSlot;
pub use manual::ManualScheduler;
pub use tokio_lane::TokioScheduler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Work handed to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + Sync + 'static>;

/// Identifier of a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(u64);

impl JobHandle {
    /// Generate a new unique job handle.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a step of a node's update runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsyncMode {
    /// On the calling thread, before `refresh()` returns.
    #[default]
    Sync,

    /// As a debounced job on the node's scheduler.
    Async,
}

/// The background execution lane a host provides.
pub trait Scheduler: Send + Sync {
    /// Run `task` once, no sooner than `delay` from now. The task must not
    /// run before this call returns.
    fn schedule(&self, delay: Duration, task: Task) -> JobHandle;

    /// Push a still-waiting job's deadline to `delay` from now.
    ///
    /// Returns `false` when the job already started or finished; the caller
    /// then schedules a fresh one.
    fn reschedule(&self, job: JobHandle, delay: Duration) -> bool;
}
