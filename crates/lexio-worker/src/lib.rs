//! Cancellable background jobs and their owning manager.

#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::borrow::Cow;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub mod manager;

/// A context that is passed to each job execution.
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: Uuid,
    cancellation: CancellationToken,
}

impl JobContext {
    /// Return the job's ID.
    #[must_use]
    #[inline]
    pub const fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Return whether the job was cancelled.
    ///
    /// Job bodies are expected to poll this at iteration boundaries
    /// and return early once it is set; work that is already in flight
    /// is allowed to finish.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Wait for job cancellation.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }
}

/// A long-running, cooperatively cancellable unit of work.
///
/// A job typically fans out many fine-grained pool tasks internally
/// and reports progress through its own event channel. An error
/// returned from [`run`](Job::run) marks the job as failed and is
/// logged by the manager; it does not propagate further.
#[async_trait]
pub trait Job: Send + Sync {
    /// A short name used in log output.
    fn name(&self) -> Cow<'static, str>;

    /// Execute the job.
    async fn run(&self, context: JobContext) -> eyre::Result<()>;
}

// Not public API, do not use!
#[doc(hidden)]
pub mod _private {
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    use crate::JobContext;

    #[must_use]
    pub fn new_context(job_id: Uuid, cancellation: CancellationToken) -> JobContext {
        JobContext {
            job_id,
            cancellation,
        }
    }
}
