use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::error::AgentError;
use super::types::{MessageList, Run, Thread, ThreadMessage};
use crate::config::AgentServiceConfig;

/// Operations of the remote agent service the session depends on.
#[async_trait]
pub trait AgentService: Send + Sync {
    async fn create_thread(&self) -> Result<Thread, AgentError>;

    /// Append a user message to `thread_id`.
    async fn create_message(&self, thread_id: &str, content: &str)
        -> Result<ThreadMessage, AgentError>;

    /// Start a run of `agent_id` against `thread_id`.
    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, AgentError>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError>;

    /// All messages of `thread_id`, in the order the service returns them.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError>;
}

/// Turn a project connection string into the agents API base URL.
///
/// Accepts either `<host>;<subscription>;<resource_group>;<project>` or a
/// ready-made `http(s)://` URL.
pub fn endpoint_from_connection_string(connection_string: &str) -> Result<String, AgentError> {
    let trimmed = connection_string.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(trimmed.trim_end_matches('/').to_string());
    }

    let parts: Vec<&str> = trimmed.split(';').map(str::trim).collect();
    match parts.as_slice() {
        [host, subscription, resource_group, project]
            if parts.iter().all(|p| !p.is_empty()) =>
        {
            Ok(format!(
                "https://{host}/agents/v1.0/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.MachineLearningServices/workspaces/{project}"
            ))
        }
        _ => Err(AgentError::InvalidInput(format!(
            "connection string must have the form <host>;<subscription>;<resource_group>;<project> (got {} parts)",
            parts.len()
        ))),
    }
}

/// REST client for the hosted agent service.
#[derive(Debug, Clone)]
pub struct HttpAgentService {
    client: Client,
    base_url: String,
    api_version: String,
    access_token: Option<String>,
    api_key: Option<String>,
}

impl HttpAgentService {
    pub fn new(base_url: String, api_version: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_version,
            access_token: None,
            api_key: None,
        }
    }

    pub fn from_config(config: &AgentServiceConfig) -> Result<Self, AgentError> {
        let base_url = endpoint_from_connection_string(&config.connection_string)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AgentError::remote_with_source("build http client", e))?;

        Ok(Self {
            client,
            base_url,
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL extended with `segments`, each percent-encoded as a single
    /// path segment so ids cannot escape into other endpoints.
    fn endpoint(&self, operation: &'static str, segments: &[&str]) -> Result<Url, AgentError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AgentError::remote_with_source(operation, e))?;
        url.path_segments_mut()
            .map_err(|_| {
                AgentError::InvalidInput(format!("{} is not a valid base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request.query(&[("api-version", self.api_version.as_str())]);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }
        request
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, AgentError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| AgentError::remote_with_source(operation, e))?;
        let response = check_status(operation, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AgentError::remote_with_source(operation, e))
    }
}

async fn check_status(operation: &'static str, response: Response) -> Result<Response, AgentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    Err(AgentError::remote(operation, message))
}

#[async_trait]
impl AgentService for HttpAgentService {
    async fn create_thread(&self) -> Result<Thread, AgentError> {
        let url = self.endpoint("create thread", &["threads"])?;
        let thread: Thread = self
            .send("create thread", self.client.post(url).json(&json!({})))
            .await?;
        debug!("Created thread {}", thread.id);
        Ok(thread)
    }

    async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage, AgentError> {
        let url = self.endpoint("create message", &["threads", thread_id, "messages"])?;
        let body = json!({ "role": "user", "content": content });
        self.send("create message", self.client.post(url).json(&body))
            .await
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, AgentError> {
        let url = self.endpoint("create run", &["threads", thread_id, "runs"])?;
        let body = json!({ "assistant_id": agent_id });
        self.send("create run", self.client.post(url).json(&body))
            .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        let url = self.endpoint("get run", &["threads", thread_id, "runs", run_id])?;
        self.send("get run", self.client.get(url)).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        let url = self.endpoint("list messages", &["threads", thread_id, "messages"])?;
        let list: MessageList = self.send("list messages", self.client.get(url)).await?;
        Ok(list.data)
    }
}
