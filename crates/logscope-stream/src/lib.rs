//! Container log streaming for logscope
//!
//! This crate fetches stream credentials, keeps a WebSocket log stream alive
//! with bounded reconnects, and exposes the result to a display layer through
//! [`ContainerLogs`].

pub mod error;
mod manager;
mod reconnect;
mod token;
mod transport;
mod view;
mod websocket;

pub use error::{AuthError, ParseError, StreamError, TransportError};
pub use manager::{ConnectionHandle, ConnectionManager, USER_STOP_REASON};
pub use reconnect::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MULTIPLIER, ReconnectPolicy,
};
pub use token::{HttpTokenProvider, TokenProvider};
pub use transport::{Connection, Transport, TransportEvent, TransportSink};
pub use view::{ContainerLogs, RenderedEntry};
pub use websocket::WebSocketTransport;

// Re-export types used in our public API
pub use logscope_types::{CloseInfo, ConnectionSnapshot, ConnectionState, ControlMessage, Token};
