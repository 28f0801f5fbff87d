//! Tokio Scheduler
//!
//! The production lane. Each job is a spawned timer task that sleeps until
//! its deadline, re-checks the deadline (it may have been pushed back by
//! `reschedule`), and then claims and runs the job.
//!
//! Claiming removes the job from the table atomically, so a reschedule that
//! loses the race sees the job as started and the caller schedules a new
//! one. Job bodies run on the runtime's worker; they are expected to be
//! short, synchronous recomputations.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::time::Instant;

use super::{JobHandle, Scheduler, Task};
use crate::error::LiveError;

struct TimedJob {
    deadline: Instant,
    task: Task,
}

/// A scheduler backed by a tokio runtime.
#[derive(Clone)]
pub struct TokioScheduler {
    runtime: Handle,
    jobs: Arc<DashMap<JobHandle, TimedJob>>,
}

impl TokioScheduler {
    /// Create a scheduler that spawns onto `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Create a scheduler on the runtime the caller is running in.
    pub fn current() -> Result<Self, LiveError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Number of jobs that have not started yet.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> JobHandle {
        let job = JobHandle::new();
        self.jobs.insert(
            job,
            TimedJob {
                deadline: Instant::now() + delay,
                task,
            },
        );

        let jobs = Arc::clone(&self.jobs);
        self.runtime.spawn(async move {
            loop {
                let deadline = match jobs.get(&job) {
                    Some(pending) => pending.deadline,
                    None => return,
                };
                tokio::time::sleep_until(deadline).await;

                let claimed = jobs.remove_if(&job, |_, pending| pending.deadline <= Instant::now());
                if let Some((_, timed)) = claimed {
                    tracing::debug!(job = job.raw(), "running scheduled job");
                    (timed.task)();
                    return;
                }
            }
        });

        job
    }

    fn reschedule(&self, job: JobHandle, delay: Duration) -> bool {
        match self.jobs.get_mut(&job) {
            Some(mut pending) => {
                pending.deadline = Instant::now() + delay;
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
