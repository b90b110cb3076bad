use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::AgentError;
use crate::state::AppState;

/// Header naming the failure kind when a chat reply is an error string.
pub const AGENT_ERROR_HEADER: HeaderName = HeaderName::from_static("x-agent-error");

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    pub thread_id: String,
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let message = match req.message.as_deref() {
        Some(m) if !m.trim().is_empty() => m,
        _ => return plain_text(StatusCode::BAD_REQUEST, "Message is required.".to_string()),
    };

    let cancel = state.shutdown.child_token();
    match state
        .session
        .get_response_with_cancel(message, req.thread_id.as_deref(), &cancel)
        .await
    {
        Ok(reply) => plain_text(StatusCode::OK, reply),
        Err(AgentError::InvalidInput(reason)) => plain_text(StatusCode::BAD_REQUEST, reason),
        Err(e) => {
            warn!("Chat request answered with error string: {}", e);
            let mut response = plain_text(StatusCode::OK, e.tagged());
            response.headers_mut().insert(
                AGENT_ERROR_HEADER,
                HeaderValue::from_static(e.kind().as_str()),
            );
            response
        }
    }
}

pub async fn create_thread(State(state): State<AppState>) -> Response {
    match state.session.create_thread().await {
        Ok(thread_id) => {
            let thread_id = if thread_id.trim().is_empty() {
                Uuid::new_v4().to_string()
            } else {
                thread_id
            };
            Json(ThreadResponse { thread_id }).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.tagged_with_trace() })),
        )
            .into_response(),
    }
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn root(State(state): State<AppState>) -> &'static str {
    info!("Root endpoint hit: AI Agent API is running!");
    info!("Agent ID: {}", state.session.agent_id());
    info!("Default thread ID: {}", state.session.default_thread_id());
    info!("Listening port: {}", state.config.system_config.port);
    "AI Agent API is running!"
}
