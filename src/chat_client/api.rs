use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

use crate::agent::is_thread_id;
use crate::handlers::{ChatRequest, ThreadResponse};

/// HTTP client for the chat API exposed by this backend.
#[derive(Debug, Clone)]
pub struct ChatApiClient {
    client: Client,
    base_url: String,
}

impl ChatApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the backend for a new conversation thread.
    pub async fn create_thread(&self) -> Result<String> {
        let url = format!("{}/api/chat/thread", self.base_url);
        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or_default();
            let detail = body.get("error").and_then(|v| v.as_str()).unwrap_or("no detail");
            anyhow::bail!("Thread request failed with {}: {}", status, detail);
        }
        let thread: ThreadResponse = response
            .json()
            .await
            .context("Thread response was not valid JSON")?;
        Ok(thread.thread_id)
    }

    /// Send `message` on `thread_id` and return the reply body.
    pub async fn send_message(&self, message: &str, thread_id: &str) -> Result<String> {
        if !is_thread_id(thread_id) {
            anyhow::bail!("Invalid threadId. Please refresh the page or start a new conversation.");
        }
        let url = format!("{}/api/chat/chat", self.base_url);
        let request = ChatRequest {
            message: Some(message.to_string()),
            thread_id: Some(thread_id.to_string()),
        };
        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Network response was not ok: {}", response.status());
        }
        Ok(response.text().await?)
    }

    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let body: Value = response.json().await?;
        Ok(body.get("status").and_then(|v| v.as_str()) == Some("ok"))
    }
}
