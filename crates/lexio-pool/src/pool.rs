//! Bounded task pool implementation.

use std::{future::Future, num::NonZeroUsize, panic::AssertUnwindSafe, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// The closure form of a submitted task.
type TaskFn<I, O> = Box<dyn FnOnce(I) -> BoxFuture<'static, eyre::Result<O>> + Send>;

/// The record produced by one executed task.
#[derive(Debug)]
pub struct TaskOutput<I, O> {
    /// The input value the task was submitted with.
    pub input: I,
    /// The task's return value; `None` when the task failed or
    /// panicked.
    pub output: Option<O>,
}

/// A fixed-size pool of long-lived workers consuming a shared, bounded
/// task queue.
///
/// The queue capacity equals the worker count, so [`submit`](Self::submit)
/// waits once every worker is busy and the queue is full. Failures
/// inside a task are contained: the error is logged, the output
/// recorded as absent, and the worker keeps taking new tasks.
///
/// Outputs are collected in completion order, which under concurrent
/// execution is not submission order.
#[must_use]
pub struct TaskPool<I, O> {
    inner: Arc<Inner<I, O>>,
}

impl<I, O> Clone for TaskPool<I, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<I, O> std::fmt::Debug for TaskPool<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("pending", &*self.inner.shared.pending.borrow())
            .finish_non_exhaustive()
    }
}

struct Inner<I, O> {
    queue: mpsc::Sender<(I, TaskFn<I, O>)>,
    outputs: Mutex<mpsc::UnboundedReceiver<TaskOutput<I, O>>>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    /// Tasks submitted but not yet recorded in the output channel.
    pending: watch::Sender<usize>,
    shutdown: CancellationToken,
}

impl<I, O> TaskPool<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    /// Create a pool with the given number of workers.
    ///
    /// All workers are spawned immediately and live until
    /// [`shutdown`](Self::shutdown).
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn new(workers: NonZeroUsize) -> Self {
        let count = workers.get();
        let (queue, queue_recv) = mpsc::channel(count);
        let (outputs_send, outputs) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0_usize);

        let shared = Arc::new(Shared {
            pending,
            shutdown: CancellationToken::new(),
        });

        let queue_recv = Arc::new(tokio::sync::Mutex::new(queue_recv));
        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            handles.push(tokio::spawn(worker_loop(
                queue_recv.clone(),
                outputs_send.clone(),
                shared.clone(),
            )));
        }

        Self {
            inner: Arc::new(Inner {
                queue,
                outputs: Mutex::new(outputs),
                shared,
                workers: Mutex::new(handles),
            }),
        }
    }

    /// Submit a task.
    ///
    /// The task is the pair of an input value and a closure turning it
    /// into a future; the worker that dequeues it keeps a copy of the
    /// input for the eventual [`TaskOutput`]. Waits whenever the queue
    /// is full.
    ///
    /// # Panics
    ///
    /// Panics if the pool was already shut down.
    pub async fn submit<F>(&self, input: I, task: F)
    where
        F: FnOnce(I) -> BoxFuture<'static, eyre::Result<O>> + Send + 'static,
    {
        self.inner.shared.pending.send_modify(|pending| *pending += 1);
        if self.inner.queue.send((input, Box::new(task))).await.is_err() {
            self.inner.shared.pending.send_modify(|pending| *pending -= 1);
            panic!("task submitted to a pool that was shut down");
        }
    }

    /// Wait until every submitted task has finished executing and its
    /// output has been recorded.
    ///
    /// # Panics
    ///
    /// Only panics due to bugs.
    pub async fn wait_idle(&self) {
        let mut pending = self.inner.shared.pending.subscribe();
        // The pool itself holds the sender, so this cannot fail.
        pending.wait_for(|pending| *pending == 0).await.unwrap();
    }

    /// Wait for all submitted tasks, then take the outputs collected
    /// since the previous drain.
    ///
    /// Draining twice without submitting in between yields an empty
    /// second batch.
    pub async fn drain(&self) -> Vec<TaskOutput<I, O>> {
        self.wait_idle().await;
        let mut outputs = self.inner.outputs.lock();
        let mut batch = Vec::new();
        while let Ok(output) = outputs.try_recv() {
            batch.push(output);
        }
        batch
    }

    /// Drain the pool, then stop and join every worker.
    ///
    /// Idempotent: repeated calls return whatever outputs were
    /// collected since the previous drain, usually none.
    pub async fn shutdown(&self) -> Vec<TaskOutput<I, O>> {
        let outputs = self.drain().await;
        self.inner.shared.shutdown.cancel();
        let workers = std::mem::take(&mut *self.inner.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
        outputs
    }
}

/// Run `body` against a freshly created pool and shut the pool down on
/// the way out, no matter how `body` exits.
///
/// Returns `body`'s value together with the outputs of every task it
/// submitted, so nothing is dropped even when `body` returns early.
pub async fn scoped<I, O, R, F, Fut>(workers: NonZeroUsize, body: F) -> (R, Vec<TaskOutput<I, O>>)
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    F: FnOnce(TaskPool<I, O>) -> Fut,
    Fut: Future<Output = R>,
{
    let pool = TaskPool::new(workers);
    let result = body(pool.clone()).await;
    let outputs = pool.shutdown().await;
    (result, outputs)
}

async fn worker_loop<I, O>(
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<(I, TaskFn<I, O>)>>>,
    outputs: mpsc::UnboundedSender<TaskOutput<I, O>>,
    shared: Arc<Shared>,
) where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    loop {
        // The queue lock is only held while waiting for the next task,
        // never while executing one.
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                _ = shared.shutdown.cancelled() => None,
                task = queue.recv() => task,
            }
        };
        let Some((input, task)) = next else { break };

        let output = match AssertUnwindSafe(task(input.clone())).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(error)) => {
                tracing::warn!(%error, "task failed");
                None
            }
            Err(_) => {
                tracing::error!("task panicked");
                None
            }
        };

        let _ = outputs.send(TaskOutput { input, output });
        shared.pending.send_modify(|pending| *pending -= 1);
    }
}
