//! Error types for the client.
//!
//! Only hard failures surface here. Expected outcomes (a missing document,
//! an idle long-poll, a refused account creation) are mapped to values by
//! the operation itself and never reach this type.

use std::fmt;
use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateUser,
    Authorize,
    Index,
    Get,
    Post,
    BulkPost,
    Delete,
    Changes,
    All,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateUser => "create",
            Action::Authorize => "authorize",
            Action::Index => "index",
            Action::Get => "get",
            Action::Post => "post",
            Action::BulkPost => "bulk_post",
            Action::Delete => "delete",
            Action::Changes => "changes",
            Action::All => "all",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure below the HTTP status layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    /// The connection could not be set up for a reason other than a refusal,
    /// such as DNS resolution or the TLS handshake.
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// True for the failures a long-poll is expected to hit routinely.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout
                | TransportError::ConnectionRefused(_)
                | TransportError::ConnectionReset(_)
        )
    }
}

/// Errors surfaced by client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The service answered with a non-success status.
    #[error("{action} failed with HTTP {status}: {body}")]
    Status {
        action: Action,
        status: u16,
        body: String,
    },

    /// The request never produced a response.
    #[error("{action} failed: {source}")]
    Transport {
        action: Action,
        #[source]
        source: TransportError,
    },

    /// The response body was not the JSON shape the operation requires.
    #[error("{action} returned a malformed body: {source}")]
    Decode {
        action: Action,
        #[source]
        source: serde_json::Error,
    },

    /// A required field was absent from an otherwise valid response.
    #[error("{action} response is missing `{field}`")]
    MissingField { action: Action, field: &'static str },

    /// The service returned a body where none was expected.
    #[error("{action} returned an unexpected body: {body}")]
    UnexpectedBody { action: Action, body: String },

    /// The HTTP client could not be constructed.
    #[error("transport setup failed: {0}")]
    Setup(#[source] TransportError),
}

impl Error {
    /// The failed operation, if the error came from one.
    pub fn action(&self) -> Option<Action> {
        match self {
            Error::Status { action, .. }
            | Error::Transport { action, .. }
            | Error::Decode { action, .. }
            | Error::MissingField { action, .. }
            | Error::UnexpectedBody { action, .. } => Some(*action),
            Error::Setup(_) => None,
        }
    }

    /// The HTTP status code, if the service responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for an optimistic-concurrency rejection (409/412).
    pub fn is_conflict(&self) -> bool {
        matches!(self.status(), Some(409) | Some(412))
    }
}
