use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::AgentError;
use super::service::AgentService;
use super::types::{Run, RunStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

/// Waits for a run to leave the queued/in-progress states.
#[derive(Debug, Clone, Copy)]
pub struct RunPoller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl Default for RunPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(DEFAULT_RUN_TIMEOUT),
        }
    }
}

impl RunPoller {
    /// `timeout: None` polls until the service reports a settled status.
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Poll `run` until it is no longer pending.
    ///
    /// Every iteration sleeps first and then fetches the status, so the
    /// number of status checks equals the number of states observed. A run
    /// that settles in a failure state is returned as-is.
    pub async fn wait_for_completion(
        &self,
        service: &dyn AgentService,
        thread_id: &str,
        run: Run,
        cancel: &CancellationToken,
    ) -> Result<Run, AgentError> {
        let started = Instant::now();
        let run_id = run.id.clone();
        let polling = self.poll_until_settled(service, thread_id, run);

        let outcome = match self.timeout {
            Some(limit) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(AgentError::Cancelled),
                    result = tokio::time::timeout(limit, polling) => match result {
                        Ok(result) => result,
                        Err(_) => Err(AgentError::RunTimedOut {
                            run_id: run_id.clone(),
                            elapsed: started.elapsed(),
                        }),
                    },
                }
            }
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(AgentError::Cancelled),
                    result = polling => result,
                }
            }
        };

        match &outcome {
            Ok(run) if run.status != RunStatus::Completed => {
                warn!(
                    "Run {} on thread {} settled as {:?}: {:?}",
                    run.id, thread_id, run.status, run.last_error
                );
            }
            Ok(run) => debug!("Run {} completed in {:?}", run.id, started.elapsed()),
            Err(e) => warn!("Stopped polling run {}: {}", run_id, e),
        }
        outcome
    }

    async fn poll_until_settled(
        &self,
        service: &dyn AgentService,
        thread_id: &str,
        mut run: Run,
    ) -> Result<Run, AgentError> {
        loop {
            tokio::time::sleep(self.interval).await;
            run = service.get_run(thread_id, &run.id).await?;
            if !run.status.is_pending() {
                return Ok(run);
            }
        }
    }
}
