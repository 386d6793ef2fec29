use super::*;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use logscope_types::EntryKind;

use crate::transport::TransportSink;

// ============================================================================
// Mocks
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
enum Sent {
    Control(ControlMessage),
    Close(u16, String),
}

/// What the next `open` call does; an empty script means `Open`
#[derive(Clone, Copy, Debug)]
enum Outcome {
    Open,
    Fail,
    Unauthorized,
    Hang,
}

/// Test side of an opened connection
struct MockLink {
    events: mpsc::Sender<TransportEvent>,
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl MockLink {
    async fn frame(&self, raw: &str) {
        self.events
            .send(TransportEvent::Frame(raw.to_string()))
            .await
            .unwrap();
    }

    async fn close(&self, code: u16, reason: &str) {
        self.events
            .send(TransportEvent::Closed(CloseInfo::new(code, reason)))
            .await
            .unwrap();
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

struct MockSink {
    sent: Arc<Mutex<Vec<Sent>>>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError> {
        self.sent.lock().push(Sent::Control(message.clone()));
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        self.sent.lock().push(Sent::Close(code, reason.to_string()));
        Ok(())
    }
}

struct MockTransport {
    script: Mutex<VecDeque<Outcome>>,
    opens: AtomicUsize,
    links: mpsc::UnboundedSender<MockLink>,
}

impl MockTransport {
    fn script(&self, outcomes: &[Outcome]) {
        self.script.lock().extend(outcomes.iter().copied());
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _token: &Token) -> Result<Connection, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().pop_front().unwrap_or(Outcome::Open);

        match outcome {
            Outcome::Open => {
                let (tx, rx) = mpsc::channel(16);
                let sent = Arc::new(Mutex::new(Vec::new()));
                let _ = self.links.send(MockLink {
                    events: tx,
                    sent: Arc::clone(&sent),
                });
                Ok(Connection::new(Box::new(MockSink { sent }), rx))
            }
            Outcome::Fail => Err(TransportError::Connect("connection refused".to_string())),
            Outcome::Unauthorized => Err(TransportError::Unauthorized { status: 403 }),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
struct MockTokens {
    fail: AtomicBool,
    hang: AtomicBool,
    fetches: AtomicUsize,
}

impl MockTokens {
    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for MockTokens {
    async fn fetch(&self) -> Result<Token, AuthError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::HttpStatus { status: 500 });
        }
        Ok(Token::new(format!("tok-{}", n)))
    }
}

struct Harness {
    handle: ConnectionHandle,
    buffer: LogBuffer,
    transport: Arc<MockTransport>,
    tokens: Arc<MockTokens>,
    links: mpsc::UnboundedReceiver<MockLink>,
}

impl Harness {
    fn new() -> Self {
        let (links_tx, links) = mpsc::unbounded_channel();
        let transport = Arc::new(MockTransport {
            script: Mutex::new(VecDeque::new()),
            opens: AtomicUsize::new(0),
            links: links_tx,
        });
        let tokens = Arc::new(MockTokens::default());
        let buffer = LogBuffer::new(100);

        let handle = ConnectionManager::spawn(
            transport.clone(),
            tokens.clone(),
            buffer.clone(),
            ReconnectPolicy::default(),
        );

        Self {
            handle,
            buffer,
            transport,
            tokens,
            links,
        }
    }

    /// Start `container` and hand back the connection it opened
    async fn streaming(&mut self, container: &str) -> MockLink {
        self.handle.start(container).await.unwrap();
        self.links.recv().await.unwrap()
    }

    fn state(&self) -> ConnectionState {
        self.handle.snapshot().state
    }

    fn entries(&self) -> Vec<(EntryKind, String)> {
        self.buffer
            .all()
            .iter()
            .map(|e| (e.kind, e.message.clone()))
            .collect()
    }

    fn last(&self) -> (EntryKind, String) {
        self.entries().pop().unwrap()
    }

    fn count(&self, kind: EntryKind) -> usize {
        self.entries().iter().filter(|(k, _)| *k == kind).count()
    }
}

/// Let the driver catch up with everything already queued
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn start_logs(container: &str) -> Sent {
    Sent::Control(ControlMessage::StartLogs {
        container_name: container.to_string(),
    })
}

// ============================================================================
// Start
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_streams_and_records_entries() {
    let mut h = Harness::new();
    let status = h.handle.subscribe();

    let link = h.streaming("api").await;
    assert_eq!(h.state(), ConnectionState::Streaming);
    assert_eq!(h.handle.snapshot().container.as_deref(), Some("api"));
    assert!(status.has_changed().unwrap());
    assert_eq!(link.sent(), vec![start_logs("api")]);

    link.frame(r#"{"type":"log_line","message":"hello"}"#).await;
    settle().await;

    assert_eq!(
        h.entries(),
        vec![
            (EntryKind::System, "Connecting to logs for api...".to_string()),
            (EntryKind::StreamStarted, "Log streaming started for api".to_string()),
            (EntryKind::LogLine, "hello".to_string()),
        ]
    );
    assert_eq!(h.tokens.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_container_is_rejected() {
    let h = Harness::new();
    assert!(matches!(
        h.handle.start("  ").await,
        Err(StreamError::NoContainer)
    ));
    assert_eq!(h.state(), ConnectionState::Idle);
    assert_eq!(h.transport.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_same_container_while_streaming_is_noop() {
    let mut h = Harness::new();
    let _link = h.streaming("api").await;
    let before = h.entries();

    h.handle.start("api").await.unwrap();
    settle().await;

    assert_eq!(h.transport.opens(), 1);
    assert_eq!(h.entries(), before);
    assert_eq!(h.state(), ConnectionState::Streaming);
}

#[tokio::test(start_paused = true)]
async fn test_binary_frames_are_decoded() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;

    link.events
        .send(TransportEvent::Binary(
            br#"{"type":"log_error","message":"oops"}"#.to_vec(),
        ))
        .await
        .unwrap();
    settle().await;

    assert_eq!(h.last(), (EntryKind::LogStderr, "oops".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_reported_and_stream_continues() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;

    link.frame("not json").await;
    settle().await;

    let (kind, message) = h.last();
    assert_eq!(kind, EntryKind::Error);
    assert!(message.starts_with("Failed to parse log message"));
    assert_eq!(h.count(EntryKind::Error), 1);
    assert_eq!(h.state(), ConnectionState::Streaming);
    assert!(h.handle.snapshot().last_error.is_some());

    link.frame(r#"{"type":"log_line","message":"still here"}"#).await;
    settle().await;
    assert_eq!(h.last(), (EntryKind::LogLine, "still here".to_string()));
}

// ============================================================================
// Closure and reconnect
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_clean_close_stops_without_reconnect() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;

    link.close(NORMAL_CLOSE, "done").await;
    settle().await;

    assert_eq!(h.state(), ConnectionState::Stopped);
    let (kind, message) = h.last();
    assert_eq!(kind, EntryKind::StreamStopped);
    assert!(message.contains("ended by server"));
    assert!(message.contains("1000 - done"));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.opens(), 1);
    assert_eq!(h.state(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_schedules_one_reconnect() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;

    link.close(1006, "").await;
    settle().await;

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Reconnecting);
    assert_eq!(snapshot.attempt, 1);
    assert!(h.entries().contains(&(
        EntryKind::Error,
        "Connection closed unexpectedly (1006 - No reason provided)".to_string()
    )));
    assert_eq!(
        h.last(),
        (
            EntryKind::System,
            "Connection lost. Reconnecting in 2 seconds... (Attempt 1/5)".to_string()
        )
    );

    tokio::time::sleep(Duration::from_millis(1900)).await;
    assert_eq!(h.transport.opens(), 1);

    let relink = h.links.recv().await.unwrap();
    settle().await;
    assert_eq!(h.transport.opens(), 2);
    assert_eq!(relink.sent(), vec![start_logs("api")]);

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Streaming);
    assert_eq!(snapshot.attempt, 0);
    assert_eq!(h.tokens.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_connection_counts_as_abnormal() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;

    drop(link);
    settle().await;

    assert_eq!(h.state(), ConnectionState::Reconnecting);
    assert_eq!(h.handle.snapshot().attempt, 1);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;
    h.transport.script(&[Outcome::Fail; 10]);

    link.close(1011, "server restart").await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    // initial open plus five reconnects
    assert_eq!(h.transport.opens(), 6);
    assert_eq!(h.state(), ConnectionState::Stopped);
    assert_eq!(
        h.last(),
        (
            EntryKind::Error,
            "Failed to reconnect after 5 attempts".to_string()
        )
    );

    let retries: Vec<String> = h
        .entries()
        .into_iter()
        .filter(|(k, m)| *k == EntryKind::System && m.starts_with("Connection lost"))
        .map(|(_, m)| m)
        .collect();
    assert_eq!(retries.len(), 5);
    assert!(retries[0].contains("in 2 seconds... (Attempt 1/5)"));
    assert!(retries[1].contains("in 3 seconds... (Attempt 2/5)"));
    assert!(retries[4].contains("(Attempt 5/5)"));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.transport.opens(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_start_while_reconnecting_restarts_fresh() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;
    link.close(1006, "").await;
    settle().await;
    assert_eq!(h.state(), ConnectionState::Reconnecting);

    let relink = h.streaming("api").await;
    assert_eq!(relink.sent(), vec![start_logs("api")]);
    assert_eq!(h.handle.snapshot().attempt, 0);
    assert_eq!(h.state(), ConnectionState::Streaming);

    // the old timer must not open a third connection
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.opens(), 2);
}

// ============================================================================
// Stop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_while_streaming_sends_stop_and_closes_cleanly() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;

    h.handle.stop().await.unwrap();

    assert_eq!(
        link.sent(),
        vec![
            start_logs("api"),
            Sent::Control(ControlMessage::StopLogs),
            Sent::Close(NORMAL_CLOSE, USER_STOP_REASON.to_string()),
        ]
    );
    assert_eq!(h.state(), ConnectionState::Stopped);
    assert_eq!(
        h.last(),
        (EntryKind::StreamStopped, "Log streaming stopped".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let mut h = Harness::new();

    h.handle.stop().await.unwrap();
    assert_eq!(h.state(), ConnectionState::Idle);
    assert!(h.entries().is_empty());

    let _link = h.streaming("api").await;
    h.handle.stop().await.unwrap();
    let after_first = h.entries();

    h.handle.stop().await.unwrap();
    assert_eq!(h.entries(), after_first);
    assert_eq!(h.count(EntryKind::StreamStopped), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_reconnecting_cancels_timer() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;

    link.close(1011, "boom").await;
    settle().await;
    assert_eq!(h.state(), ConnectionState::Reconnecting);

    h.handle.stop().await.unwrap();
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Stopped);
    assert_eq!(snapshot.attempt, 0);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.opens(), 1);
    assert_eq!(h.state(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_pending_open() {
    let h = Harness::new();
    h.transport.script(&[Outcome::Hang]);

    let handle = h.handle.clone();
    let starting = tokio::spawn(async move { handle.start("api").await });
    settle().await;
    assert_eq!(h.state(), ConnectionState::Connecting);

    h.handle.stop().await.unwrap();
    assert!(starting.await.unwrap().is_ok());
    assert_eq!(h.state(), ConnectionState::Stopped);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.opens(), 1);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_token_failure_stops_without_connecting() {
    let h = Harness::new();
    h.tokens.fail.store(true, Ordering::SeqCst);

    let err = h.handle.start("api").await.unwrap_err();
    assert!(matches!(err, StreamError::Auth(AuthError::HttpStatus { status: 500 })));

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Stopped);
    assert!(
        snapshot
            .last_error
            .unwrap()
            .starts_with("Failed to authenticate")
    );
    assert_eq!(h.transport.opens(), 0);
    assert_eq!(h.count(EntryKind::Error), 1);

    // no automatic retry of the fetch
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.tokens.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_is_refetched_on_next_start() {
    let mut h = Harness::new();
    h.transport.script(&[Outcome::Unauthorized]);

    h.handle.start("api").await.unwrap();
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Stopped);
    assert!(snapshot.last_error.unwrap().contains("rejected"));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.opens(), 1);

    let _link = h.streaming("api").await;
    assert_eq!(h.tokens.fetches(), 2);
    assert_eq!(h.state(), ConnectionState::Streaming);
    assert!(h.handle.snapshot().last_error.is_none());
}

// ============================================================================
// Container switch, clear, shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_switching_container_replaces_session() {
    let mut h = Harness::new();
    let api = h.streaming("api").await;
    api.frame(r#"{"type":"log_line","message":"from api"}"#).await;
    api.frame("garbage").await;
    settle().await;
    assert!(h.handle.snapshot().last_error.is_some());

    let web = h.streaming("web").await;

    assert_eq!(
        api.sent(),
        vec![
            start_logs("api"),
            Sent::Control(ControlMessage::StopLogs),
            Sent::Close(NORMAL_CLOSE, USER_STOP_REASON.to_string()),
        ]
    );
    assert_eq!(web.sent(), vec![start_logs("web")]);

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.container.as_deref(), Some("web"));
    assert_eq!(snapshot.state, ConnectionState::Streaming);
    assert!(snapshot.last_error.is_none());

    assert!(h.entries().iter().all(|(_, m)| !m.contains("api")));
    assert_eq!(
        h.entries()[0],
        (EntryKind::System, "Connecting to logs for web...".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_clear_keeps_streaming() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;

    h.handle.clear().await.unwrap();
    assert!(h.entries().is_empty());
    assert_eq!(h.state(), ConnectionState::Streaming);

    link.frame(r#"{"type":"log_line","message":"after clear"}"#).await;
    settle().await;
    assert_eq!(h.entries(), vec![(EntryKind::LogLine, "after clear".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_and_ends_driver() {
    let mut h = Harness::new();
    let link = h.streaming("api").await;

    h.handle.shutdown();
    settle().await;

    assert!(link.sent().contains(&Sent::Close(
        NORMAL_CLOSE,
        USER_STOP_REASON.to_string()
    )));
    assert!(matches!(
        h.handle.start("api").await,
        Err(StreamError::ManagerGone)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_token_fetch_does_not_fetch_again() {
    let h = Harness::new();
    h.tokens.hang.store(true, Ordering::SeqCst);

    let handle = h.handle.clone();
    let starting = tokio::spawn(async move { handle.start("api").await });
    settle().await;
    assert_eq!(h.state(), ConnectionState::AwaitingToken);
    assert_eq!(h.tokens.fetches(), 1);

    h.handle.stop().await.unwrap();
    assert!(starting.await.unwrap().is_ok());

    assert_eq!(h.tokens.fetches(), 1);
    assert_eq!(h.transport.opens(), 0);
    assert_eq!(h.state(), ConnectionState::Stopped);
    assert_eq!(h.count(EntryKind::System), 0);
}
