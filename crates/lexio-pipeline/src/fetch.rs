//! Remote word-list fetching.

use std::{borrow::Cow, num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use lexio_common::{source::WordSource, word::WordGroup};
use lexio_pool::scoped;
use lexio_worker::{Job, JobContext};
use tokio::sync::mpsc;

/// Options for a [`WordFetchJob`].
#[derive(Debug, Clone)]
pub struct WordFetchOptions {
    /// Concurrent page fetches per group.
    pub page_workers: NonZeroUsize,
}

impl Default for WordFetchOptions {
    fn default() -> Self {
        Self {
            page_workers: NonZeroUsize::new(3).unwrap(),
        }
    }
}

/// Progress and result events emitted by a [`WordFetchJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// A group's page count is known; progress displays should reset
    /// their maximum to `pages`.
    PageCount {
        /// The group about to be fetched.
        group: WordGroup,
        /// Total number of pages in the group.
        pages: usize,
    },
    /// One page was fetched.
    Tick,
    /// All pages of a group were fetched.
    GroupDone {
        /// The fetched group.
        group: WordGroup,
        /// Every word of the group, in completion order of the pages.
        words: Vec<String>,
    },
}

/// Fetches all pages of the requested word-book groups.
///
/// Groups are processed sequentially; the pages of each group are
/// fetched concurrently. Once cancelled, page fetches already in
/// flight finish (and still tick), but nothing new is dispatched and
/// no further group events are emitted.
pub struct WordFetchJob {
    source: Arc<dyn WordSource>,
    groups: Vec<WordGroup>,
    events: mpsc::UnboundedSender<FetchEvent>,
    options: WordFetchOptions,
}

impl WordFetchJob {
    /// Create a job fetching the given groups from `source`.
    #[must_use]
    pub fn new(
        source: Arc<dyn WordSource>,
        groups: Vec<WordGroup>,
        events: mpsc::UnboundedSender<FetchEvent>,
    ) -> Self {
        Self::new_with_options(source, groups, events, WordFetchOptions::default())
    }

    /// Create a job with explicit options.
    #[must_use]
    pub fn new_with_options(
        source: Arc<dyn WordSource>,
        groups: Vec<WordGroup>,
        events: mpsc::UnboundedSender<FetchEvent>,
        options: WordFetchOptions,
    ) -> Self {
        Self {
            source,
            groups,
            events,
            options,
        }
    }
}

#[async_trait]
impl Job for WordFetchJob {
    fn name(&self) -> Cow<'static, str> {
        "word-fetch".into()
    }

    async fn run(&self, context: JobContext) -> eyre::Result<()> {
        for group in &self.groups {
            let pages = match self.source.total_pages(group).await {
                Ok(pages) => pages,
                Err(error) => {
                    tracing::warn!(%error, group = %group.name, "failed to read the page count");
                    0
                }
            };
            let _ = self.events.send(FetchEvent::PageCount {
                group: group.clone(),
                pages,
            });

            let ctx = context.clone();
            let (interrupted, outputs) = scoped(self.options.page_workers, |pool| async move {
                for page in 0..pages {
                    if ctx.is_cancelled() {
                        return true;
                    }
                    let source = Arc::clone(&self.source);
                    let group = group.clone();
                    let events = self.events.clone();
                    pool.submit(page, move |page| {
                        async move {
                            let words = match source.words_on_page(page, &group).await {
                                Ok(words) => words,
                                Err(error) => {
                                    tracing::warn!(
                                        %error,
                                        page,
                                        group = %group.name,
                                        "page fetch failed"
                                    );
                                    Vec::new()
                                }
                            };
                            let _ = events.send(FetchEvent::Tick);
                            Ok(words)
                        }
                        .boxed()
                    })
                    .await;
                }
                false
            })
            .await;

            if interrupted {
                tracing::debug!(group = %group.name, "word fetch interrupted");
                return Ok(());
            }

            let words = outputs
                .into_iter()
                .filter_map(|output| output.output)
                .flatten()
                .collect();
            let _ = self.events.send(FetchEvent::GroupDone {
                group: group.clone(),
                words,
            });
        }
        Ok(())
    }
}
