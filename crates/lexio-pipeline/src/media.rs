//! Streamed media fetching.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;

/// A boxed stream of raw body bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// An error produced while starting or reading a download.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The server answered with a non-success status code.
    #[error("unexpected status code: {0}")]
    Status(reqwest::StatusCode),
    /// The request could not be performed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// Reading or writing the stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A source of streamed media bodies, keyed by URL.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Start fetching `url` and return the body as a byte stream.
    async fn fetch(&self, url: &str) -> Result<ByteStream, MediaError>;
}

/// [`MediaSource`] backed by a shared HTTP client.
///
/// The client is injected so that connection pooling and any retry
/// policy stay owned by the composition root.
#[derive(Debug, Clone)]
pub struct HttpMediaSource {
    client: reqwest::Client,
}

impl HttpMediaSource {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn fetch(&self, url: &str) -> Result<ByteStream, MediaError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(MediaError::Status(response.status()));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)))
            .boxed())
    }
}
