use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

/// Prefix legacy callers look for to tell a failure apart from a reply.
pub const ERROR_TAG: &str = "[Error]:";

/// Failure of an agent-session operation.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{operation} failed: {message}")]
    Remote {
        operation: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("No agent reply found for this prompt.")]
    NoReply,

    #[error("Run {run_id} timed out after {}ms", .elapsed.as_millis())]
    RunTimedOut { run_id: String, elapsed: Duration },

    #[error("Request was cancelled")]
    Cancelled,
}

/// Stable, machine-readable category of an [`AgentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Remote,
    NoReply,
    RunTimedOut,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Remote => "remote",
            Self::NoReply => "no_reply",
            Self::RunTimedOut => "run_timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

impl AgentError {
    pub fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Remote {
            operation,
            message: message.into(),
            source: None,
        }
    }

    pub fn remote_with_source(
        operation: &'static str,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Remote {
            operation,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::NoReply => ErrorKind::NoReply,
            Self::RunTimedOut { .. } => ErrorKind::RunTimedOut,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Legacy string form: `[Error]: <message>`.
    pub fn tagged(&self) -> String {
        format!("{ERROR_TAG} {self}")
    }

    /// Legacy string form with the chain of underlying causes appended.
    pub fn tagged_with_trace(&self) -> String {
        let mut causes = Vec::new();
        let mut current = self.source();
        while let Some(cause) = current {
            causes.push(cause.to_string());
            current = cause.source();
        }
        if causes.is_empty() {
            format!("{} | {}", self.tagged(), self.kind().as_str())
        } else {
            format!("{} | {}", self.tagged(), causes.join(" <- "))
        }
    }
}

/// Whether a string returned through the legacy channel is an error.
pub fn is_tagged_error(text: &str) -> bool {
    text.starts_with(ERROR_TAG)
}
