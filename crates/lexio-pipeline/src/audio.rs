//! Pronunciation audio downloads.

use std::{
    borrow::Cow,
    env,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use futures::{FutureExt, TryStreamExt};
use lexio_pool::{scoped, RateLimiter};
use lexio_worker::{Job, JobContext};
use tokio::{fs, io::AsyncWriteExt, sync::mpsc};

use crate::media::{MediaError, MediaSource};

/// One file to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioItem {
    /// Destination path.
    pub path: PathBuf,
    /// Source URL.
    pub url: String,
}

/// Per-file completion event emitted by an [`AudioDownloadJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTick {
    /// Destination path of the file.
    pub path: PathBuf,
    /// Source URL of the file.
    pub url: String,
    /// Whether the download succeeded.
    pub ok: bool,
}

/// Options for an [`AudioDownloadJob`].
#[derive(Debug, Clone)]
pub struct AudioDownloadOptions {
    /// Concurrent downloads.
    pub download_workers: NonZeroUsize,
    /// Maximum downloads per rolling minute; `0` disables throttling.
    pub rate_per_minute: u32,
}

impl Default for AudioDownloadOptions {
    fn default() -> Self {
        Self {
            download_workers: NonZeroUsize::new(3).unwrap(),
            rate_per_minute: 60,
        }
    }
}

/// Downloads a batch of pronunciation files.
///
/// Every file reports its own [`AudioTick`]; a failed download is
/// cleaned up from disk and never aborts the rest of the batch. There
/// is no aggregate result event, callers count ticks.
pub struct AudioDownloadJob {
    source: Arc<dyn MediaSource>,
    items: Vec<AudioItem>,
    events: mpsc::UnboundedSender<AudioTick>,
    options: AudioDownloadOptions,
}

impl AudioDownloadJob {
    /// Create a job downloading the given files through `source`.
    #[must_use]
    pub fn new(
        source: Arc<dyn MediaSource>,
        items: Vec<AudioItem>,
        events: mpsc::UnboundedSender<AudioTick>,
    ) -> Self {
        Self::new_with_options(source, items, events, AudioDownloadOptions::default())
    }

    /// Create a job with explicit options.
    #[must_use]
    pub fn new_with_options(
        source: Arc<dyn MediaSource>,
        items: Vec<AudioItem>,
        events: mpsc::UnboundedSender<AudioTick>,
        options: AudioDownloadOptions,
    ) -> Self {
        Self {
            source,
            items,
            events,
            options,
        }
    }
}

#[async_trait]
impl Job for AudioDownloadJob {
    fn name(&self) -> Cow<'static, str> {
        "audio-download".into()
    }

    async fn run(&self, context: JobContext) -> eyre::Result<()> {
        let mut limiter = RateLimiter::new(self.options.rate_per_minute);
        let ctx = context.clone();

        let ((), _outputs) = scoped(self.options.download_workers, |pool| async move {
            for item in &self.items {
                if ctx.is_cancelled() {
                    tracing::debug!("audio download interrupted");
                    return;
                }
                limiter.acquire().await;

                let source = Arc::clone(&self.source);
                let events = self.events.clone();
                pool.submit(item.clone(), move |item| {
                    async move {
                        let ok = match download_file(source.as_ref(), &item.path, &item.url).await
                        {
                            Ok(()) => {
                                tracing::debug!(
                                    path = %item.path.display(),
                                    url = %item.url,
                                    "audio downloaded"
                                );
                                true
                            }
                            Err(error) => {
                                tracing::warn!(
                                    %error,
                                    path = %item.path.display(),
                                    url = %item.url,
                                    "audio download failed"
                                );
                                remove_partial(&item.path).await;
                                false
                            }
                        };
                        let _ = events.send(AudioTick {
                            path: item.path.clone(),
                            url: item.url.clone(),
                            ok,
                        });
                        Ok(ok)
                    }
                    .boxed()
                })
                .await;
            }
        })
        .await;

        Ok(())
    }
}

/// Stream `url` into `path`.
async fn download_file(
    source: &dyn MediaSource,
    path: &Path,
    url: &str,
) -> Result<(), MediaError> {
    let mut body = source.fetch(url).await?;
    let mut file = fs::File::create(path).await?;
    while let Some(chunk) = body.try_next().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Delete a partially written file, if any.
async fn remove_partial(path: &Path) {
    if fs::try_exists(path).await.unwrap_or(false) {
        if let Err(error) = fs::remove_file(path).await {
            tracing::warn!(%error, path = %path.display(), "failed to remove partial file");
        }
    }
}

/// File name for a term's pronunciation audio.
#[must_use]
pub fn audio_file_name(prefix: &str, term: &str) -> String {
    format!("{prefix}_{term}.mp3")
}

/// Directory used for temporarily downloaded audio files.
#[must_use]
pub fn audio_cache_dir() -> PathBuf {
    env::temp_dir().join("lexio").join("audio")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_file_names_are_prefixed() {
        assert_eq!(audio_file_name("us", "abandon"), "us_abandon.mp3");
    }

    #[test]
    fn audio_cache_dir_is_under_the_temp_dir() {
        assert!(audio_cache_dir().starts_with(env::temp_dir()));
    }
}
