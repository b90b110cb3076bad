use serde::{Deserialize, Serialize};

/// Identifier of a server-side conversation thread.
pub type ThreadId = String;

/// Prefix every thread id issued by the agent service starts with.
pub const THREAD_ID_PREFIX: &str = "thread";

/// Whether `id` has the shape of a service-issued thread id.
pub fn is_thread_id(id: &str) -> bool {
    id.starts_with(THREAD_ID_PREFIX)
}

/// Author of a thread message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    /// The service spells this role `assistant`.
    #[serde(rename = "assistant", alias = "agent")]
    Agent,
}

/// Text payload of a message segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageText {
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<serde_json::Value>,
}

/// One content segment of a message. Only text segments carry a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: MessageText },
    #[serde(other)]
    Other,
}

impl MessageContent {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            text: MessageText {
                value: value.into(),
                annotations: Vec::new(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(&text.value),
            Self::Other => None,
        }
    }
}

/// A message stored on a thread. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl ThreadMessage {
    /// Text segments of this message in order.
    pub fn text_segments(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(MessageContent::as_text)
    }
}

/// Page of messages returned by the list-messages operation.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub data: Vec<ThreadMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
}

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    Incomplete,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Queued and in-progress runs are still being worked on; every other
    /// status ends polling.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One asynchronous execution of the agent against a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}
