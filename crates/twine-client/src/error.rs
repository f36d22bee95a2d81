//! Error types for client operations

use thiserror::Error;
use twine_json_rpc::{CodecError, ErrorKind, RpcError};

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with a JSON-RPC error
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Valid JSON that cannot be read as a reply
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The proxy was used in a way that cannot produce a request
    #[error("Usage error: {0}")]
    Usage(String),
}

/// Failures of the underlying HTTP exchange
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server answered with HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::ConnectionFailed(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// The JSON-RPC error the server sent, if that is what this is
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc(error) => Some(error),
            _ => None,
        }
    }

    /// Whether the server answered with an error of the given kind
    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.rpc_error().is_some_and(|error| error.is(kind))
    }

    /// Whether retrying the same call might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::ConnectionFailed(_) | TransportError::Timeout)
        )
    }
}
