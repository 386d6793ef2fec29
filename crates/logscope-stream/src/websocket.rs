use std::borrow::Cow;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use logscope_types::{CloseInfo, ControlMessage, Token};

use crate::error::TransportError;
use crate::transport::{Connection, Transport, TransportEvent, TransportSink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code for a close frame that carried no status
const NO_STATUS_CLOSE: u16 = 1005;

/// Inbound events buffered per connection before the reader waits
const EVENT_QUEUE: usize = 1024;

/// WebSocket transport for the log service, addressed as `{base}/ws/logs/{token}`
pub struct WebSocketTransport {
    base_url: String,
}

impl WebSocketTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, token: &Token) -> String {
        format!("{}/ws/logs/{}", self.base_url.trim_end_matches('/'), token.value)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, token: &Token) -> Result<Connection, TransportError> {
        let url = self.url_for(token);
        debug!(base = %self.base_url, "opening log stream websocket");

        let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| match e {
                WsError::Http(response)
                    if matches!(response.status().as_u16(), 401 | 403) =>
                {
                    TransportError::Unauthorized {
                        status: response.status().as_u16(),
                    }
                }
                other => TransportError::Connect(other.to_string()),
            })?;

        info!(base = %self.base_url, "log stream websocket connected");

        let (sink, stream) = ws.split();
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        let reader = tokio::spawn(read_frames(stream, tx));

        Ok(Connection::new(Box::new(WsSink { sink, reader }), rx))
    }
}

/// Forward inbound frames until the socket ends, then report how it ended
async fn read_frames(mut stream: SplitStream<WsStream>, tx: mpsc::Sender<TransportEvent>) {
    let closed = loop {
        let event = match stream.next().await {
            Some(Ok(Message::Text(text))) => TransportEvent::Frame(text.to_string()),
            Some(Ok(Message::Binary(data))) => TransportEvent::Binary(data.to_vec()),
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason.to_string()),
                    None => CloseInfo::new(NO_STATUS_CLOSE, ""),
                };
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => break CloseInfo::abnormal(e.to_string()),
            None => break CloseInfo::abnormal("connection reset"),
        };

        if tx.send(event).await.is_err() {
            return;
        }
    };

    debug!(code = closed.code, reason = %closed.reason, "log stream websocket closed");
    let _ = tx.send(TransportEvent::Closed(closed)).await;
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
    reader: tokio::task::JoinHandle<()>,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(message.to_json()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Close(e.to_string()))?;
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}

impl Drop for WsSink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_url_for_token() {
        let transport = WebSocketTransport::new("ws://localhost:8004/");
        assert_eq!(
            transport.url_for(&Token::new("jwt")),
            "ws://localhost:8004/ws/logs/jwt"
        );
    }

    /// Accept one connection, push a frame, read the client's control message, then close
    async fn one_shot_server(close_code: u16) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut received = Vec::new();

            if let Some(Ok(Message::Text(text))) = ws.next().await {
                received.push(text.to_string());
            }
            ws.send(Message::Text(r#"{"type":"log_line","message":"hello"}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Close(Some(CloseFrame {
                code: CloseCode::from(close_code),
                reason: Cow::Borrowed("bye"),
            })))
            .await
            .unwrap();
            received
        });

        (format!("ws://{}", addr), server)
    }

    #[tokio::test]
    async fn test_frames_then_close() {
        let (url, server) = one_shot_server(1011).await;
        let transport = WebSocketTransport::new(url);

        let mut conn = transport.open(&Token::new("t")).await.unwrap();
        conn.sink
            .send(&ControlMessage::StartLogs {
                container_name: "api".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            conn.events.recv().await,
            Some(TransportEvent::Frame(
                r#"{"type":"log_line","message":"hello"}"#.to_string()
            ))
        );
        assert_eq!(
            conn.events.recv().await,
            Some(TransportEvent::Closed(CloseInfo::new(1011, "bye")))
        );

        let received = server.await.unwrap();
        assert_eq!(received, vec![r#"{"type":"start_logs","container_name":"api"}"#]);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WebSocketTransport::new(format!("ws://{}", addr));
        let err = transport.open(&Token::new("t")).await.err().unwrap();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
