//! Pacing for repeated calls against rate-limited services.

use std::time::Duration;

use tokio::time::Instant;

/// Grants permits at a configured rate per rolling minute.
///
/// The very first permit is always granted immediately, so a batch
/// never stalls before doing any work. A rate of `0` disables
/// throttling entirely.
///
/// Create one limiter per batch run; the window starts at the first
/// [`acquire`](Self::acquire).
#[derive(Debug)]
#[must_use]
pub struct RateLimiter {
    per_minute: u32,
    started: Option<Instant>,
    issued: u64,
}

impl RateLimiter {
    /// Poll interval while waiting for the next permit.
    const POLL: Duration = Duration::from_secs(1);

    /// Create a limiter granting at most `per_minute` permits per
    /// rolling minute. `0` means unlimited.
    pub fn new(per_minute: u32) -> Self {
        Self {
            per_minute,
            started: None,
            issued: 0,
        }
    }

    /// Obtain the next permit, sleeping until the configured rate
    /// allows it.
    #[allow(clippy::cast_precision_loss)]
    pub async fn acquire(&mut self) {
        if self.per_minute == 0 {
            return;
        }

        let Some(started) = self.started else {
            self.started = Some(Instant::now());
            self.issued = 1;
            return;
        };

        let per_second = f64::from(self.per_minute) / 60.0;
        loop {
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed * per_second > self.issued as f64 {
                self.issued += 1;
                return;
            }
            tokio::time::sleep(Self::POLL).await;
        }
    }
}
