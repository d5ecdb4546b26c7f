//! Error types for the repository access layer and the session controller.
//!
//! Access failures are recoverable inside a conversation: the controller
//! turns them into failed tool results. Session errors end the current query.

use thiserror::Error;

/// Errors raised by the repository access layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Credential missing, invalid, or lacking access (401, plain 403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Owner, repository, path, or raw reference does not exist (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote throttled the request (429, or 403 with no quota left).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// File content is not valid UTF-8.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Any other non-2xx status.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Transport(String),

    /// A 2xx response whose body did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AccessError {
    /// Map a non-success HTTP status to the matching failure kind.
    pub fn from_status(status: u16, quota_exhausted: bool, message: String) -> Self {
        match status {
            401 => AccessError::Unauthorized(message),
            403 if quota_exhausted => AccessError::RateLimited(message),
            403 => AccessError::Unauthorized(message),
            404 => AccessError::NotFound(message),
            429 => AccessError::RateLimited(message),
            _ => AccessError::Http { status, message },
        }
    }
}

impl From<reqwest::Error> for AccessError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AccessError::InvalidResponse(err.to_string())
        } else {
            AccessError::Transport(err.to_string())
        }
    }
}

/// Errors raised while talking to the chat model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Cannot connect to model endpoint at {0}")]
    Connection(String),

    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("Model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by a tool handler.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The repository call failed; reported back to the model.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Arguments did not fit the handler after validation.
    #[error("{0}")]
    Arguments(String),

    /// The handler's result could not be encoded as JSON.
    #[error("Failed to encode tool result: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors that abort a single `submit_query` call.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The model asked for a tool that is not registered.
    #[error("Model requested unknown tool: {0}")]
    UnknownTool(String),

    /// The model's arguments do not satisfy the tool's schema.
    #[error("Malformed invocation of {tool}: {reason}")]
    MalformedInvocation { tool: String, reason: String },

    /// The model could not be reached or answered garbage.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model kept requesting tools past the configured limit.
    #[error("Model requested tools for more than {0} rounds without answering")]
    RoundLimitExceeded(usize),
}
