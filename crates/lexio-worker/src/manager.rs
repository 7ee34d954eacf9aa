//! Tracking and teardown of running jobs.

use std::{collections::HashMap, num::NonZeroUsize, sync::Arc, thread};

use futures::FutureExt;
use lexio_pool::TaskPool;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{Job, JobContext};

/// Options for a [`JobManager`].
#[derive(Debug, Clone)]
pub struct JobManagerOptions {
    /// The number of jobs that can run concurrently.
    pub concurrent_jobs: NonZeroUsize,
}

impl Default for JobManagerOptions {
    fn default() -> Self {
        Self {
            concurrent_jobs: thread::available_parallelism()
                .unwrap_or_else(|_| NonZeroUsize::new(4).unwrap()),
        }
    }
}

/// How a job exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job ran to completion, including cooperative early return
    /// after cancellation.
    Completed,
    /// The job returned an error or panicked.
    Failed,
}

/// Lifecycle events emitted by a [`JobManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// The job finished and was deregistered. Fires exactly once per
    /// started job, on every exit path.
    Finished {
        /// The finished job's ID.
        id: Uuid,
        /// How the job exited.
        outcome: JobOutcome,
    },
}

struct RunningJob {
    context: JobContext,
}

/// Runs jobs on a shared pool, tracks the outstanding ones, and tears
/// them all down deterministically.
///
/// Cancellation is cooperative: [`destroy`](Self::destroy) sets each
/// tracked job's cancellation token and then waits for the jobs to
/// exit on their own.
pub struct JobManager {
    pool: TaskPool<Uuid, ()>,
    jobs: Arc<Mutex<HashMap<Uuid, RunningJob>>>,
    events: mpsc::UnboundedSender<JobEvent>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.jobs.lock().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Create a manager with the default options, together with the
    /// receiving end of its event stream.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        Self::new_with_options(JobManagerOptions::default())
    }

    /// Create a manager, together with the receiving end of its event
    /// stream.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    #[must_use]
    pub fn new_with_options(options: JobManagerOptions) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (events, events_recv) = mpsc::unbounded_channel();
        (
            Self {
                pool: TaskPool::new(options.concurrent_jobs),
                jobs: Arc::default(),
                events,
            },
            events_recv,
        )
    }

    /// Number of jobs currently tracked.
    #[must_use]
    pub fn running(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Register and start a job, returning its ID.
    ///
    /// Waits while more than the configured number of jobs are already
    /// queued or running. The job is deregistered, and one
    /// [`JobEvent::Finished`] emitted, exactly once when it exits.
    ///
    /// # Panics
    ///
    /// Panics if [`destroy`](Self::destroy) was already called.
    pub async fn start(&self, job: Arc<dyn Job>) -> Uuid {
        let id = Uuid::new_v4();
        let context = JobContext {
            job_id: id,
            cancellation: CancellationToken::new(),
        };

        self.jobs.lock().insert(
            id,
            RunningJob {
                context: context.clone(),
            },
        );

        let jobs = self.jobs.clone();
        let events = self.events.clone();
        let name = job.name();
        tracing::debug!(job = %name, job_id = %id, "job started");

        self.pool
            .submit(id, move |id| {
                async move {
                    // The guard fires on every exit path, including an
                    // unwind, so the job can never stay tracked or
                    // finish without an event.
                    let mut guard = FinishGuard {
                        id,
                        outcome: JobOutcome::Failed,
                        jobs,
                        events,
                    };
                    match job.run(context).await {
                        Ok(()) => {
                            tracing::debug!(job = %name, job_id = %id, "job finished");
                            guard.outcome = JobOutcome::Completed;
                        }
                        Err(error) => {
                            tracing::error!(%error, job = %name, job_id = %id, "job failed");
                        }
                    }
                    Ok(())
                }
                .boxed()
            })
            .await;
        id
    }

    /// Cancel every tracked job and wait until all of them have
    /// exited.
    ///
    /// Idempotent, and returns immediately when nothing is running.
    /// After it returns the tracked set is empty and no further
    /// [`JobEvent`] is emitted.
    pub async fn destroy(&self) {
        for job in self.jobs.lock().values() {
            job.context.cancellation.cancel();
        }
        self.pool.shutdown().await;
    }
}

struct FinishGuard {
    id: Uuid,
    outcome: JobOutcome,
    jobs: Arc<Mutex<HashMap<Uuid, RunningJob>>>,
    events: mpsc::UnboundedSender<JobEvent>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.jobs.lock().remove(&self.id);
        let _ = self.events.send(JobEvent::Finished {
            id: self.id,
            outcome: self.outcome,
        });
    }
}
