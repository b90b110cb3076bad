use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::AgentError;
use super::extractor::extract_reply;
use super::poller::RunPoller;
use super::service::{AgentService, HttpAgentService};
use super::types::ThreadId;
use crate::config::AgentServiceConfig;

type ThreadLocks = DashMap<ThreadId, Arc<Mutex<()>>>;

/// Holds a thread's queue entry for one request. Dropping it (on return,
/// cancellation or panic) removes the entry once no other request holds it.
struct ThreadLease<'a> {
    locks: &'a ThreadLocks,
    thread_id: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> ThreadLease<'a> {
    fn acquire(locks: &'a ThreadLocks, thread_id: &'a str) -> Self {
        let lock = locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self {
            locks,
            thread_id,
            lock,
        }
    }
}

impl Drop for ThreadLease<'_> {
    fn drop(&mut self) {
        // Idle when only the map and this lease reference the lock.
        self.locks
            .remove_if(self.thread_id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

/// Conversation front-end for one pre-provisioned agent.
///
/// Built once at startup and shared by every request. Holds no per-request
/// state apart from the optional per-thread queue.
pub struct AgentSession {
    service: Arc<dyn AgentService>,
    agent_id: String,
    default_thread_id: ThreadId,
    poller: RunPoller,
    thread_locks: Option<ThreadLocks>,
}

impl AgentSession {
    pub fn new(
        service: Arc<dyn AgentService>,
        agent_id: impl Into<String>,
        default_thread_id: impl Into<ThreadId>,
    ) -> Self {
        Self {
            service,
            agent_id: agent_id.into(),
            default_thread_id: default_thread_id.into(),
            poller: RunPoller::default(),
            thread_locks: None,
        }
    }

    /// Build the session and its HTTP client from validated configuration.
    pub fn from_config(config: &AgentServiceConfig) -> Result<Self, AgentError> {
        let service = HttpAgentService::from_config(config)?;
        info!("Agent service endpoint: {}", service.base_url());

        let timeout = match config.run_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let session = Self::new(Arc::new(service), &config.agent_id, &config.thread_id)
            .with_poller(RunPoller::new(
                Duration::from_millis(config.poll_interval_ms),
                timeout,
            ))
            .with_thread_serialization(config.serialize_per_thread);
        Ok(session)
    }

    pub fn with_poller(mut self, poller: RunPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Queue concurrent requests for the same thread behind one another.
    pub fn with_thread_serialization(mut self, enabled: bool) -> Self {
        self.thread_locks = enabled.then(DashMap::new);
        self
    }

    /// Threads that currently have a request running or waiting.
    pub fn queued_threads(&self) -> usize {
        self.thread_locks.as_ref().map_or(0, DashMap::len)
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn default_thread_id(&self) -> &str {
        &self.default_thread_id
    }

    /// Ask the service for a fresh conversation thread.
    pub async fn create_thread(&self) -> Result<ThreadId, AgentError> {
        match self.service.create_thread().await {
            Ok(thread) => {
                info!("Created thread {}", thread.id);
                Ok(thread.id)
            }
            Err(e) => {
                warn!("Thread creation failed: {}", e);
                Err(e)
            }
        }
    }

    /// Submit `prompt` and wait for the agent's reply.
    pub async fn get_response(
        &self,
        prompt: &str,
        thread_id: Option<&str>,
    ) -> Result<String, AgentError> {
        self.get_response_with_cancel(prompt, thread_id, &CancellationToken::new())
            .await
    }

    pub async fn get_response_with_cancel(
        &self,
        prompt: &str,
        thread_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        if prompt.trim().is_empty() {
            return Err(AgentError::InvalidInput("Message is required.".to_string()));
        }
        let thread_id = self.resolve_thread(thread_id);

        let result = match &self.thread_locks {
            Some(locks) => {
                let lease = ThreadLease::acquire(locks, &thread_id);
                let _queued = lease.lock.lock().await;
                self.exchange(prompt, &thread_id, cancel).await
            }
            None => self.exchange(prompt, &thread_id, cancel).await,
        };

        if let Err(e) = &result {
            warn!("Request on thread {} failed: {}", thread_id, e);
        }
        result
    }

    fn resolve_thread(&self, requested: Option<&str>) -> ThreadId {
        requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.default_thread_id)
            .to_string()
    }

    async fn exchange(
        &self,
        prompt: &str,
        thread_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        self.service.create_message(thread_id, prompt).await?;
        let run = self.service.create_run(thread_id, &self.agent_id).await?;
        debug!("Started run {} on thread {}", run.id, thread_id);

        self.poller
            .wait_for_completion(self.service.as_ref(), thread_id, run, cancel)
            .await?;

        let messages = self.service.list_messages(thread_id).await?;
        extract_reply(&messages).ok_or(AgentError::NoReply)
    }
}
