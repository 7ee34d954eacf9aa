//! Release update checks.

use std::borrow::Cow;

use async_trait::async_trait;
use lexio_worker::{Job, JobContext};
use serde::Deserialize;
use tokio::sync::mpsc;

/// Endpoint describing the latest published release.
pub const LATEST_RELEASE_API: &str = "https://api.github.com/repos/lexio/lexio/releases/latest";

/// Emitted when a release newer than the running one is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEvent {
    /// Tag of the newer release.
    pub version: String,
    /// Release notes.
    pub changelog: String,
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
    body: String,
}

/// Checks whether a newer release has been published.
///
/// Failures are logged and swallowed; the check never fails the job.
pub struct ReleaseCheckJob {
    client: reqwest::Client,
    endpoint: String,
    current_version: String,
    events: mpsc::UnboundedSender<ReleaseEvent>,
}

impl ReleaseCheckJob {
    /// Create a check against [`LATEST_RELEASE_API`].
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        current_version: impl Into<String>,
        events: mpsc::UnboundedSender<ReleaseEvent>,
    ) -> Self {
        Self::new_with_endpoint(client, LATEST_RELEASE_API, current_version, events)
    }

    /// Create a check against a custom endpoint.
    #[must_use]
    pub fn new_with_endpoint(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        current_version: impl Into<String>,
        events: mpsc::UnboundedSender<ReleaseEvent>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            current_version: current_version.into(),
            events,
        }
    }

    async fn latest(&self) -> Result<LatestRelease, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl Job for ReleaseCheckJob {
    fn name(&self) -> Cow<'static, str> {
        "release-check".into()
    }

    async fn run(&self, context: JobContext) -> eyre::Result<()> {
        if context.is_cancelled() {
            return Ok(());
        }

        match self.latest().await {
            Ok(release) => {
                let version = release.tag_name.trim();
                if version == self.current_version {
                    tracing::debug!(version, "running the latest release");
                } else {
                    tracing::info!(version, "new release available");
                    let _ = self.events.send(ReleaseEvent {
                        version: version.to_string(),
                        changelog: release.body.trim().to_string(),
                    });
                }
            }
            Err(error) => {
                tracing::warn!(%error, "release check failed");
            }
        }
        Ok(())
    }
}
