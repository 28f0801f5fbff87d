//! Per-node job slot.

use std::time::Duration;

use parking_lot::Mutex;

use super::{JobHandle, Scheduler, Task};

/// Remembers the last job a node scheduled so later triggers can coalesce
/// into it.
#[derive(Debug, Default)]
pub struct JobSlot {
    handle: Mutex<Option<JobHandle>>,
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reschedule the pending job, or schedule `task` if there is none.
    ///
    /// `task` is only built when a new job is needed. Returns `true` if the
    /// trigger coalesced into an existing job.
    pub fn trigger<F>(&self, scheduler: &dyn Scheduler, delay: Duration, task: F) -> bool
    where
        F: FnOnce() -> Task,
    {
        let mut handle = self.handle.lock();
        if let Some(job) = *handle {
            if scheduler.reschedule(job, delay) {
                tracing::trace!(job = job.raw(), ?delay, "coalesced into pending job");
                return true;
            }
        }
        let job = scheduler.schedule(delay, task());
        tracing::trace!(job = job.raw(), ?delay, "scheduled job");
        *handle = Some(job);
        false
    }

    /// The most recently scheduled job, pending or not.
    pub fn last_job(&self) -> Option<JobHandle> {
        *self.handle.lock()
    }
}
