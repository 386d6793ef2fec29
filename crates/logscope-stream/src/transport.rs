use async_trait::async_trait;
use tokio::sync::mpsc;

use logscope_types::{CloseInfo, ControlMessage, Token};

use crate::error::TransportError;

/// Something the server pushed, or the end of the connection
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// Text frame
    Frame(String),
    /// Binary frame
    Binary(Vec<u8>),
    /// Connection closed; always the last event on a connection
    Closed(CloseInfo),
}

/// Write half of an open connection
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError>;

    /// Close with the given code and reason
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}

/// An open connection: a sink for control messages and a queue of inbound events
pub struct Connection {
    pub sink: Box<dyn TransportSink>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl Connection {
    pub fn new(sink: Box<dyn TransportSink>, events: mpsc::Receiver<TransportEvent>) -> Self {
        Self { sink, events }
    }
}

/// Opens streaming connections addressed by a credential
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, token: &Token) -> Result<Connection, TransportError>;
}
