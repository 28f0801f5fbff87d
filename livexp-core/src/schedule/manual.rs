//! Manually Stepped Scheduler
//!
//! A deterministic lane driven by a virtual clock. Nothing runs until the
//! owner calls `advance` or `run_until_idle`, which makes debounce behavior
//! testable without sleeping.
//!
//! Due jobs run in deadline order (ties by scheduling order). Jobs scheduled
//! by a running job are picked up in the same call if they are already due.

use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::{JobHandle, Scheduler, Task};

struct ManualJob {
    due: Duration,
    task: Task,
}

/// A scheduler whose time only moves when told to.
#[derive(Default)]
pub struct ManualScheduler {
    /// Virtual time since creation.
    now: Mutex<Duration>,

    /// Jobs that have not started yet, indexed by handle.
    jobs: DashMap<JobHandle, ManualJob>,
}

impl ManualScheduler {
    /// Create a scheduler at virtual time zero with no jobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        *self.now.lock()
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Move the clock forward and run every job that became due.
    ///
    /// Returns the number of jobs that ran.
    pub fn advance(&self, by: Duration) -> usize {
        {
            let mut now = self.now.lock();
            *now += by;
        }
        self.run_due()
    }

    /// Run jobs until none are left, jumping the clock to each deadline.
    ///
    /// Returns the number of jobs that ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some((job, due)) = self.next_job() {
            {
                let mut now = self.now.lock();
                if *now < due {
                    *now = due;
                }
            }
            if self.run_job(job) {
                ran += 1;
            }
        }
        ran
    }

    /// Run every job whose deadline has passed.
    pub fn run_due(&self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.now();
            match self.next_job() {
                Some((job, due)) if due <= now => {
                    if self.run_job(job) {
                        ran += 1;
                    }
                }
                _ => break,
            }
        }
        ran
    }

    /// The earliest job, by deadline then by handle.
    fn next_job(&self) -> Option<(JobHandle, Duration)> {
        self.jobs
            .iter()
            .map(|entry| (*entry.key(), entry.value().due))
            .min_by_key(|(job, due)| (*due, *job))
    }

    fn run_job(&self, job: JobHandle) -> bool {
        // Removing first means a reschedule from inside the task sees the
        // job as started and creates a new one.
        match self.jobs.remove(&job) {
            Some((_, manual)) => {
                tracing::debug!(job = job.raw(), "running manual job");
                (manual.task)();
                true
            }
            None => false,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> JobHandle {
        let job = JobHandle::new();
        let due = self.now() + delay;
        self.jobs.insert(job, ManualJob { due, task });
        job
    }

    fn reschedule(&self, job: JobHandle, delay: Duration) -> bool {
        let due = self.now() + delay;
        match self.jobs.get_mut(&job) {
            Some(mut pending) => {
                pending.due = due;
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}
