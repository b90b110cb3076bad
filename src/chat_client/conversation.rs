use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::api::ChatApiClient;
use super::dedup::DedupLoop;
use super::thread_cache::ThreadCache;
use crate::agent::is_thread_id;

/// How hard to try before giving up on obtaining a usable thread id.
#[derive(Debug, Clone, Copy)]
pub struct ThreadRetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ThreadRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(300),
        }
    }
}

/// Return a usable thread id, from the cache or freshly requested.
///
/// Ids without the thread shape are discarded and a new one is requested,
/// up to `policy.max_attempts` times. The first valid id is cached.
pub async fn acquire_thread(
    client: &ChatApiClient,
    cache: &ThreadCache,
    policy: ThreadRetryPolicy,
) -> Result<String> {
    if let Some(cached) = cache.load()? {
        if is_thread_id(&cached) {
            debug!("Reusing cached thread {}", cached);
            return Ok(cached);
        }
        warn!("Discarding cached thread id with unexpected shape: {}", cached);
    }

    for attempt in 1..=policy.max_attempts {
        match client.create_thread().await {
            Ok(id) if is_thread_id(&id) => {
                cache.store(&id)?;
                return Ok(id);
            }
            Ok(id) => warn!("Attempt {}: server returned unusable thread id {:?}", attempt, id),
            Err(e) => warn!("Attempt {}: thread request failed: {}", attempt, e),
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    anyhow::bail!(
        "Failed to get a valid thread ID from the server after several attempts. Please try refreshing the page."
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayRole {
    User,
    Assistant,
}

/// A message as shown in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayedMessage {
    pub role: DisplayRole,
    pub content: String,
    pub timestamp: String,
}

impl DisplayedMessage {
    fn now(role: DisplayRole, content: String) -> Self {
        Self {
            role,
            content,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// In-memory transcript of one conversation thread.
pub struct Conversation {
    client: ChatApiClient,
    thread_id: Option<String>,
    messages: Vec<DisplayedMessage>,
    dedup: DedupLoop,
}

impl Conversation {
    pub fn new(client: ChatApiClient, thread_id: Option<String>) -> Self {
        Self {
            client,
            thread_id,
            messages: Vec::new(),
            dedup: DedupLoop::default(),
        }
    }

    pub fn with_dedup(mut self, dedup: DedupLoop) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn messages(&self) -> &[DisplayedMessage] {
        &self.messages
    }

    fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == DisplayRole::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Send `input` and append the reply if a new one arrived.
    ///
    /// Blank input or a missing thread does nothing. Returns the appended
    /// assistant message, or `None` when the reply was a repeat of the last
    /// one (or empty).
    pub async fn send(&mut self, input: &str) -> Result<Option<&DisplayedMessage>> {
        let Some(thread_id) = self.thread_id.clone() else {
            return Ok(None);
        };
        if input.trim().is_empty() {
            return Ok(None);
        }

        let last_assistant = self.last_assistant().map(str::to_string);
        self.messages
            .push(DisplayedMessage::now(DisplayRole::User, input.to_string()));

        let client = &self.client;
        let reply = self
            .dedup
            .run(last_assistant.as_deref(), || client.send_message(input, &thread_id))
            .await?;

        match reply {
            Some(text) if !text.is_empty() => {
                self.messages
                    .push(DisplayedMessage::now(DisplayRole::Assistant, text));
                Ok(self.messages.last())
            }
            _ => Ok(None),
        }
    }

    /// Forget the cached thread and the transcript.
    pub fn reset(&mut self, cache: &ThreadCache) -> Result<()> {
        cache.clear()?;
        self.thread_id = None;
        self.messages.clear();
        Ok(())
    }

    /// Start over on `thread_id` after a reset.
    pub fn set_thread(&mut self, thread_id: String) {
        self.thread_id = Some(thread_id);
    }
}
