use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_RESEND_BUDGET: Duration = Duration::from_secs(5);

/// Re-sends a message until the reply differs from the last one shown.
///
/// The reply channel carries no request id, so a reply equal to the previous
/// assistant message is taken to be stale.
#[derive(Debug, Clone, Copy)]
pub struct DedupLoop {
    interval: Duration,
    budget: Duration,
}

impl Default for DedupLoop {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RESEND_INTERVAL,
            budget: DEFAULT_RESEND_BUDGET,
        }
    }
}

impl DedupLoop {
    pub fn new(interval: Duration, budget: Duration) -> Self {
        Self { interval, budget }
    }

    /// Call `send` until it yields a reply different from `last_known`.
    ///
    /// Returns `Ok(None)` once the budget is spent without a new reply.
    /// Errors from `send` end the loop immediately.
    pub async fn run<F, Fut, E>(&self, last_known: Option<&str>, mut send: F) -> Result<Option<String>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;
        while started.elapsed() < self.budget {
            attempts += 1;
            let reply = send().await?;
            if last_known != Some(reply.as_str()) {
                debug!("Accepted reply after {} attempt(s)", attempts);
                return Ok(Some(reply));
            }
            tokio::time::sleep(self.interval).await;
        }
        debug!("No new reply after {} attempt(s) in {:?}", attempts, self.budget);
        Ok(None)
    }
}
