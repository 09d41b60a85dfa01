//! Error types for agent service calls.

use thiserror::Error;

/// Failure of a single call against the agent service.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Transport-level failure (connect, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    ///
    /// `message` is the human-readable text extracted from the response
    /// body and may be empty when the service sent nothing useful.
    #[error("{message}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// Message extracted from the body.
        message: String,
    },

    /// Request or response body did not match the expected schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid base address or other setup problem.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// The failure's message, if it carries a non-empty one.
    pub fn message(&self) -> Option<String> {
        let text = self.to_string();
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// HTTP status code for [`AgentError::Status`] failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result alias for agent service calls.
pub type AgentResult<T> = Result<T, AgentError>;
