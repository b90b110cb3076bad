#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use agent_chat_backend::agent::{
    AgentError, AgentService, MessageContent, MessageRole, Run, RunStatus, Thread, ThreadMessage,
};

/// Which remote operation should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    CreateThread,
    CreateMessage,
    CreateRun,
    GetRun,
    ListMessages,
}

#[derive(Default)]
struct State {
    threads: HashMap<String, Vec<ThreadMessage>>,
    /// Statuses handed out by successive `get_run` calls.
    statuses: VecDeque<RunStatus>,
    /// Status reported once `statuses` runs dry.
    settled: Option<RunStatus>,
    /// Replies appended by the agent when a run completes.
    replies: VecDeque<String>,
    active_runs: HashMap<String, String>,
    next_id: usize,
    fail_on: Option<FailOn>,
    panic_on_message: bool,
    thread_id_override: Option<String>,
    calls: Vec<&'static str>,
}

/// In-memory agent service driven by a script of run statuses and replies.
///
/// Threads keep messages oldest-first and are listed newest-first, like the
/// hosted service.
#[derive(Default)]
pub struct ScriptedAgentService {
    state: Mutex<State>,
}

impl ScriptedAgentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(self, thread_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .threads
            .insert(thread_id.to_string(), Vec::new());
        self
    }

    pub fn with_statuses(self, statuses: &[RunStatus]) -> Self {
        self.state.lock().unwrap().statuses.extend(statuses.iter().copied());
        self
    }

    /// Status reported after the scripted ones; defaults to `Completed`.
    pub fn settling_as(self, status: RunStatus) -> Self {
        self.state.lock().unwrap().settled = Some(status);
        self
    }

    pub fn with_reply(self, reply: &str) -> Self {
        self.state.lock().unwrap().replies.push_back(reply.to_string());
        self
    }

    pub fn failing_on(self, op: FailOn) -> Self {
        self.state.lock().unwrap().fail_on = Some(op);
        self
    }

    pub fn panicking_on_message(self) -> Self {
        self.state.lock().unwrap().panic_on_message = true;
        self
    }

    pub fn issuing_thread_id(self, id: &str) -> Self {
        self.state.lock().unwrap().thread_id_override = Some(id.to_string());
        self
    }

    pub fn push_agent_message(&self, thread_id: &str, text: &str) {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, "msg");
        state
            .threads
            .entry(thread_id.to_string())
            .or_default()
            .push(message(&id, thread_id, MessageRole::Agent, text));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }

    /// Messages of `thread_id` oldest-first.
    pub fn history(&self, thread_id: &str) -> Vec<ThreadMessage> {
        self.state
            .lock()
            .unwrap()
            .threads
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    fn enter(&self, op: &'static str, fail: FailOn) -> Result<std::sync::MutexGuard<'_, State>, AgentError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op);
        if state.fail_on == Some(fail) {
            return Err(AgentError::remote(op, "503 Service Unavailable"));
        }
        Ok(state)
    }
}

fn next_id(state: &mut State, prefix: &str) -> String {
    state.next_id += 1;
    format!("{}_{}", prefix, state.next_id)
}

pub fn message(id: &str, thread_id: &str, role: MessageRole, text: &str) -> ThreadMessage {
    ThreadMessage {
        id: id.to_string(),
        thread_id: Some(thread_id.to_string()),
        role,
        content: vec![MessageContent::text(text)],
        created_at: None,
    }
}

#[async_trait]
impl AgentService for ScriptedAgentService {
    async fn create_thread(&self) -> Result<Thread, AgentError> {
        let mut state = self.enter("create_thread", FailOn::CreateThread)?;
        let id = match state.thread_id_override.clone() {
            Some(id) => id,
            None => next_id(&mut state, "thread"),
        };
        state.threads.insert(id.clone(), Vec::new());
        Ok(Thread { id })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage, AgentError> {
        let mut state = self.enter("create_message", FailOn::CreateMessage)?;
        if state.panic_on_message {
            drop(state);
            panic!("scripted panic while creating message");
        }
        if !state.threads.contains_key(thread_id) {
            return Err(AgentError::remote("create_message", format!("404 Not Found: no thread {thread_id}")));
        }
        let id = next_id(&mut state, "msg");
        let msg = message(&id, thread_id, MessageRole::User, content);
        state.threads.get_mut(thread_id).unwrap().push(msg.clone());
        Ok(msg)
    }

    async fn create_run(&self, thread_id: &str, _agent_id: &str) -> Result<Run, AgentError> {
        let mut state = self.enter("create_run", FailOn::CreateRun)?;
        let id = next_id(&mut state, "run");
        state.active_runs.insert(id.clone(), thread_id.to_string());
        Ok(Run {
            id,
            thread_id: Some(thread_id.to_string()),
            status: RunStatus::Queued,
            last_error: None,
        })
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        let mut state = self.enter("get_run", FailOn::GetRun)?;
        let status = match state.statuses.pop_front() {
            Some(status) => status,
            None => state.settled.unwrap_or(RunStatus::Completed),
        };
        if status == RunStatus::Completed && state.active_runs.remove(run_id).is_some() {
            if let Some(reply) = state.replies.pop_front() {
                let id = next_id(&mut state, "msg");
                state
                    .threads
                    .entry(thread_id.to_string())
                    .or_default()
                    .push(message(&id, thread_id, MessageRole::Agent, &reply));
            }
        }
        Ok(Run {
            id: run_id.to_string(),
            thread_id: Some(thread_id.to_string()),
            status,
            last_error: None,
        })
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        let state = self.enter("list_messages", FailOn::ListMessages)?;
        let mut messages = state.threads.get(thread_id).cloned().unwrap_or_default();
        messages.reverse();
        Ok(messages)
    }
}

pub fn text_of(message: &ThreadMessage) -> String {
    message.text_segments().collect()
}

/// Send a request through the router and return `(status, headers, body)`.
pub async fn send(
    app: axum::Router,
    request: Request<axum::body::Body>,
) -> (StatusCode, axum::http::HeaderMap, String) {
    let resp = app
        .oneshot(request)
        .await
        .expect("app should handle request");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    let text = String::from_utf8(body.to_vec()).expect("response body must be utf-8");
    (status, headers, text)
}

pub fn post_json(uri: &str, payload: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(payload.to_string()))
        .expect("request build should succeed")
}

pub fn post_empty(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(axum::body::Body::empty())
        .expect("request build should succeed")
}

pub fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .expect("request build should succeed")
}
