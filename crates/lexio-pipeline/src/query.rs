//! Rate-limited batch word lookups.

use std::{borrow::Cow, num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use lexio_common::{source::QueryApi, word::WordRecord};
use lexio_pool::{scoped, RateLimiter};
use lexio_worker::{Job, JobContext};
use tokio::sync::mpsc;

/// Options for a [`WordQueryJob`].
#[derive(Debug, Clone)]
pub struct WordQueryOptions {
    /// Concurrent lookups.
    pub lookup_workers: NonZeroUsize,
    /// Maximum lookups per rolling minute; `0` disables throttling.
    pub rate_per_minute: u32,
}

impl Default for WordQueryOptions {
    fn default() -> Self {
        Self {
            lookup_workers: NonZeroUsize::new(3).unwrap(),
            rate_per_minute: 60,
        }
    }
}

/// The outcome of one row's lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    /// The caller-supplied row identifier.
    pub row: usize,
    /// The looked-up word.
    pub word: String,
    /// The record, absent when the lookup failed.
    pub record: Option<WordRecord>,
}

/// Progress and result events emitted by a [`WordQueryJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// A row's lookup produced a record.
    RowSuccess {
        /// The caller-supplied row identifier.
        row: usize,
        /// The looked-up word.
        word: String,
        /// The record the provider returned.
        record: WordRecord,
    },
    /// A row's lookup failed or came back empty.
    RowFailed {
        /// The caller-supplied row identifier.
        row: usize,
        /// The looked-up word.
        word: String,
    },
    /// One lookup finished, successfully or not.
    Tick,
    /// The whole batch finished. Not emitted when the job is
    /// cancelled mid-batch.
    BatchDone {
        /// One outcome per submitted row, sorted by row identifier.
        results: Vec<QueryOutcome>,
    },
}

/// Looks up a batch of `(row, word)` pairs against a query API.
///
/// Lookups are paced by a fresh [`RateLimiter`] per run and fanned out
/// over a scoped pool. A failed lookup fails only its own row; the
/// batch always runs to the end unless cancelled.
pub struct WordQueryJob {
    api: Arc<dyn QueryApi>,
    row_words: Vec<(usize, String)>,
    events: mpsc::UnboundedSender<QueryEvent>,
    options: WordQueryOptions,
}

impl WordQueryJob {
    /// Create a job querying the given rows against `api`.
    #[must_use]
    pub fn new(
        api: Arc<dyn QueryApi>,
        row_words: Vec<(usize, String)>,
        events: mpsc::UnboundedSender<QueryEvent>,
    ) -> Self {
        Self::new_with_options(api, row_words, events, WordQueryOptions::default())
    }

    /// Create a job with explicit options.
    #[must_use]
    pub fn new_with_options(
        api: Arc<dyn QueryApi>,
        row_words: Vec<(usize, String)>,
        events: mpsc::UnboundedSender<QueryEvent>,
        options: WordQueryOptions,
    ) -> Self {
        Self {
            api,
            row_words,
            events,
            options,
        }
    }
}

#[async_trait]
impl Job for WordQueryJob {
    fn name(&self) -> Cow<'static, str> {
        "word-query".into()
    }

    async fn run(&self, context: JobContext) -> eyre::Result<()> {
        let mut limiter = RateLimiter::new(self.options.rate_per_minute);
        let ctx = context.clone();

        let (interrupted, outputs) = scoped(self.options.lookup_workers, |pool| async move {
            for (row, word) in &self.row_words {
                if ctx.is_cancelled() {
                    return true;
                }
                limiter.acquire().await;

                let api = Arc::clone(&self.api);
                let events = self.events.clone();
                pool.submit((*row, word.clone()), move |(row, word)| {
                    async move {
                        let record = match api.query(&word).await {
                            Ok(record) => record,
                            Err(error) => {
                                tracing::warn!(%error, row, word = %word, "lookup failed");
                                None
                            }
                        };
                        match &record {
                            Some(record) => {
                                tracing::debug!(row, word = %word, "lookup succeeded");
                                let _ = events.send(QueryEvent::RowSuccess {
                                    row,
                                    word: word.clone(),
                                    record: record.clone(),
                                });
                            }
                            None => {
                                tracing::warn!(row, word = %word, "lookup came back empty");
                                let _ = events.send(QueryEvent::RowFailed {
                                    row,
                                    word: word.clone(),
                                });
                            }
                        }
                        let _ = events.send(QueryEvent::Tick);
                        Ok(record)
                    }
                    .boxed()
                })
                .await;
            }
            false
        })
        .await;

        if interrupted {
            tracing::debug!("word query interrupted");
            return Ok(());
        }

        let mut results: Vec<QueryOutcome> = outputs
            .into_iter()
            .map(|output| {
                let (row, word) = output.input;
                QueryOutcome {
                    row,
                    word,
                    record: output.output.flatten(),
                }
            })
            .collect();
        // Rows are addressed by index downstream, so the aggregate is
        // re-ordered even though per-row events arrived as completed.
        results.sort_unstable_by_key(|outcome| outcome.row);
        let _ = self.events.send(QueryEvent::BatchDone { results });
        Ok(())
    }
}
