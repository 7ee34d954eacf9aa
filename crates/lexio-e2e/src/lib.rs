//! Lexio E2E test suite.

use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use lexio::{
    ByteStream, Job, JobContext, MediaError, MediaSource, QueryApi, SentencePair, WordGroup,
    WordRecord, WordSource,
};
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

/// A word source serving predefined pages per group.
#[derive(Debug, Default, Clone)]
pub struct StaticWordSource {
    groups: HashMap<String, Vec<Vec<String>>>,
}

impl StaticWordSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the given pages for `group`.
    #[must_use]
    pub fn with_group(mut self, group: &WordGroup, pages: Vec<Vec<String>>) -> Self {
        self.groups.insert(group.id.clone(), pages);
        self
    }
}

#[async_trait]
impl WordSource for StaticWordSource {
    async fn total_pages(&self, group: &WordGroup) -> eyre::Result<usize> {
        Ok(self.groups.get(&group.id).map_or(0, Vec::len))
    }

    async fn words_on_page(&self, page: usize, group: &WordGroup) -> eyre::Result<Vec<String>> {
        Ok(self
            .groups
            .get(&group.id)
            .and_then(|pages| pages.get(page))
            .cloned()
            .unwrap_or_default())
    }
}

/// A word source that blocks every page fetch on a shared gate and
/// reports each fetch as it starts.
pub struct GatedWordSource {
    pages: usize,
    gate: Arc<Semaphore>,
    started: mpsc::UnboundedSender<usize>,
}

impl GatedWordSource {
    pub fn new(pages: usize, gate: Arc<Semaphore>, started: mpsc::UnboundedSender<usize>) -> Self {
        Self {
            pages,
            gate,
            started,
        }
    }
}

#[async_trait]
impl WordSource for GatedWordSource {
    async fn total_pages(&self, _group: &WordGroup) -> eyre::Result<usize> {
        Ok(self.pages)
    }

    async fn words_on_page(&self, page: usize, _group: &WordGroup) -> eyre::Result<Vec<String>> {
        let _ = self.started.send(page);
        let permit = self.gate.acquire().await?;
        permit.forget();
        Ok(vec![format!("word-{page}")])
    }
}

/// A query API failing for a configured set of words.
#[derive(Debug, Default, Clone)]
pub struct StaticQueryApi {
    failing: HashSet<String>,
}

impl StaticQueryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make lookups of `word` come back empty.
    #[must_use]
    pub fn failing_for(mut self, word: &str) -> Self {
        self.failing.insert(word.to_string());
        self
    }
}

#[async_trait]
impl QueryApi for StaticQueryApi {
    async fn query(&self, word: &str) -> eyre::Result<Option<WordRecord>> {
        if self.failing.contains(word) {
            return Ok(None);
        }
        Ok(Some(WordRecord {
            definition: vec![format!("definition of {word}")],
            sentence: vec![SentencePair {
                text: format!("Nobody expected the {word}."),
                translation: format!("({word})"),
            }],
            us_pron: Some(format!("https://cdn.example/{word}.mp3")),
            ..WordRecord::new(word)
        }))
    }
}

/// A media source serving a fixed payload; URLs containing `"bad"`
/// fail after the first chunk, exercising partial-file cleanup.
#[derive(Debug, Clone)]
pub struct StaticMediaSource {
    payload: Bytes,
}

impl StaticMediaSource {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

#[async_trait]
impl MediaSource for StaticMediaSource {
    async fn fetch(&self, url: &str) -> Result<ByteStream, MediaError> {
        let chunks: Vec<Result<Bytes, std::io::Error>> = if url.contains("bad") {
            vec![
                Ok(self.payload.clone()),
                Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "stream cut short",
                )),
            ]
        } else {
            vec![Ok(self.payload.clone())]
        };
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// A job that reports itself as started and then waits for
/// cancellation.
pub struct WaitingJob {
    started: mpsc::UnboundedSender<Uuid>,
}

impl WaitingJob {
    pub fn new(started: mpsc::UnboundedSender<Uuid>) -> Self {
        Self { started }
    }
}

#[async_trait]
impl Job for WaitingJob {
    fn name(&self) -> Cow<'static, str> {
        "waiting".into()
    }

    async fn run(&self, context: JobContext) -> eyre::Result<()> {
        let _ = self.started.send(context.job_id());
        context.cancelled().await;
        Ok(())
    }
}

/// A job that always fails.
pub struct FailingJob;

#[async_trait]
impl Job for FailingJob {
    fn name(&self) -> Cow<'static, str> {
        "failing".into()
    }

    async fn run(&self, _context: JobContext) -> eyre::Result<()> {
        eyre::bail!("always fails")
    }
}

/// Install a plain subscriber so test failures come with log output.
/// Repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// Serve a fixed JSON body over local HTTP, returning the URL.
pub async fn serve_json(body: &'static str) -> String {
    use axum::{routing::get, Router};

    let app = Router::new().route(
        "/latest",
        get(move || async move {
            (
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                body,
            )
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/latest")
}
