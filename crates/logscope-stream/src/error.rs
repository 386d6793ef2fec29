//! Error taxonomy for the log stream
//!
//! `AuthError` ends the current attempt, `TransportError` feeds the reconnect
//! path, and `ParseError` (from `logscope-logs`) only costs the offending frame.

pub use logscope_logs::ParseError;

/// Credential fetch or validation failure
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("credential endpoint {url} unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("credential endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("malformed credential response: {0}")]
    Malformed(String),

    #[error("log service rejected the credential")]
    Rejected,
}

/// Failure opening, writing to, or closing the streaming transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to log service: {0}")]
    Connect(String),

    #[error("log service rejected the credential (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("failed to send to log service: {0}")]
    Send(String),

    #[error("failed to close log service connection: {0}")]
    Close(String),
}

/// Anything a stream command can fail with
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no container selected")]
    NoContainer,

    #[error("connection manager has shut down")]
    ManagerGone,
}
