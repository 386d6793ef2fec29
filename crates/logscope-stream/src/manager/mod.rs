//! Connection lifecycle for one log stream
//!
//! A single driver task owns the transport, the reconnect timer and the
//! attempt counter, and applies every transition in order:
//!
//! ```text
//! Idle ──start──► AwaitingToken ──token──► Connecting ──open──► Streaming
//!                      │                     ▲      │             │
//!                      └─auth error─► Stopped│      │open failed  │unclean close
//!                                            │      ▼             ▼
//!                                            └── Reconnecting ◄───┘
//!                                                   │ attempts exhausted
//!                                                   ▼
//!                                                Stopped
//! ```
//!
//! `ConnectionHandle` is the only way in. Commands are processed ahead of
//! transport events and timer expiry, and `stop()` cancels the session token
//! before the command is even queued, so nothing already in flight can bring a
//! stopped stream back.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Sleep, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logscope_logs::{LogBuffer, MessageClassifier};
use logscope_types::{
    CloseInfo, ConnectionSnapshot, ConnectionState, ControlMessage, LogEntry, NORMAL_CLOSE, Token,
};

use crate::error::{AuthError, StreamError, TransportError};
use crate::reconnect::ReconnectPolicy;
use crate::token::TokenProvider;
use crate::transport::{Connection, Transport, TransportEvent};

#[cfg(test)]
mod tests;

/// Reason sent with the close frame when the user stops streaming
pub const USER_STOP_REASON: &str = "User stopped logging";

enum Command {
    Start {
        container: String,
        ack: oneshot::Sender<Result<(), StreamError>>,
    },
    Stop {
        ack: oneshot::Sender<()>,
    },
    Clear {
        ack: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Spawns connection drivers
pub struct ConnectionManager;

impl ConnectionManager {
    /// Spawn a driver writing into `buffer` and return its handle
    ///
    /// The driver exits on `shutdown()` or once every handle is dropped.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        buffer: LogBuffer,
        policy: ReconnectPolicy,
    ) -> ConnectionHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionSnapshot::default());
        let session_cancel = Arc::new(Mutex::new(CancellationToken::new()));

        let driver = Driver {
            transport,
            tokens,
            buffer,
            policy,
            commands: command_rx,
            status: status_tx,
            session_cancel: Arc::clone(&session_cancel),
            token: None,
            session: None,
            link: None,
            retry: None,
        };
        tokio::spawn(driver.run());

        ConnectionHandle {
            commands: command_tx,
            status: status_rx,
            session_cancel,
        }
    }
}

/// Cloneable control surface for a connection driver
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionSnapshot>,
    session_cancel: Arc<Mutex<CancellationToken>>,
}

impl ConnectionHandle {
    /// Start streaming `container`, replacing any stream for another container
    ///
    /// Resolves after the first connection attempt has finished, failed or been
    /// cancelled. Only a missing container, a credential failure or a gone
    /// driver are returned as errors; connection failures are reported as log
    /// entries and handled by the reconnect path.
    pub async fn start(&self, container: &str) -> Result<(), StreamError> {
        let container = container.trim();
        if container.is_empty() {
            return Err(StreamError::NoContainer);
        }

        if self.status.borrow().container.as_deref() != Some(container) {
            self.session_cancel.lock().cancel();
        }

        let (ack, done) = oneshot::channel();
        self.send(Command::Start {
            container: container.to_string(),
            ack,
        })?;
        done.await.map_err(|_| StreamError::ManagerGone)?
    }

    /// Stop streaming; a no-op when nothing is active
    pub async fn stop(&self) -> Result<(), StreamError> {
        self.session_cancel.lock().cancel();

        let (ack, done) = oneshot::channel();
        self.send(Command::Stop { ack })?;
        done.await.map_err(|_| StreamError::ManagerGone)
    }

    /// Drop every buffered entry
    pub async fn clear(&self) -> Result<(), StreamError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Clear { ack })?;
        done.await.map_err(|_| StreamError::ManagerGone)
    }

    /// Stop any stream and end the driver task
    pub fn shutdown(&self) {
        self.session_cancel.lock().cancel();
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Current connection state
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.status.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.status.clone()
    }

    fn send(&self, command: Command) -> Result<(), StreamError> {
        self.commands
            .send(command)
            .map_err(|_| StreamError::ManagerGone)
    }
}

/// Per-container state, replaced wholesale when the container changes
struct Session {
    container: String,
    state: ConnectionState,
    attempt: u32,
    cancel: CancellationToken,
    last_error: Option<String>,
}

struct Driver {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    buffer: LogBuffer,
    policy: ReconnectPolicy,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ConnectionSnapshot>,
    session_cancel: Arc<Mutex<CancellationToken>>,

    /// Last credential fetched; dropped when the transport rejects it
    token: Option<Token>,
    session: Option<Session>,
    /// Open connection, only while streaming
    link: Option<Connection>,
    /// Pending reconnect, only while reconnecting
    retry: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },

                event = next_event(&mut self.link) => self.handle_event(event).await,

                _ = retry_elapsed(&mut self.retry) => self.handle_retry().await,
            }
        }

        self.stop().await;
        debug!("connection driver exited");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { container, ack } => {
                let result = self.start(container).await;
                let _ = ack.send(result);
            }
            Command::Stop { ack } => {
                self.stop().await;
                let _ = ack.send(());
            }
            Command::Clear { ack } => {
                self.buffer.clear();
                debug!("log buffer cleared");
                let _ = ack.send(());
            }
            Command::Shutdown => {}
        }
    }

    async fn start(&mut self, container: String) -> Result<(), StreamError> {
        if let Some(session) = &self.session {
            let same = session.container == container;
            if same
                && matches!(
                    session.state,
                    ConnectionState::AwaitingToken
                        | ConnectionState::Connecting
                        | ConnectionState::Streaming
                )
            {
                debug!(container = %container, "already streaming, ignoring start");
                return Ok(());
            }

            self.stop().await;
            if !same {
                self.buffer.clear();
            }
        }

        let cancel = CancellationToken::new();
        *self.session_cancel.lock() = cancel.clone();
        self.session = Some(Session {
            container,
            state: ConnectionState::Idle,
            attempt: 0,
            cancel,
            last_error: None,
        });

        if self.ensure_token().await?.is_none() {
            debug!("start cancelled while fetching a token");
            return Ok(());
        }
        self.connect().await;
        Ok(())
    }

    /// Fetch a credential unless one is held; failure ends the session
    async fn ensure_token(&mut self) -> Result<Option<Token>, StreamError> {
        if let Some(token) = &self.token {
            return Ok(Some(token.clone()));
        }

        let Some(cancel) = self.session.as_ref().map(|s| s.cancel.clone()) else {
            return Ok(None);
        };
        self.set_state(ConnectionState::AwaitingToken);

        let tokens = Arc::clone(&self.tokens);
        let fetched = tokio::select! {
            fetched = tokens.fetch() => fetched,
            _ = cancel.cancelled() => return Ok(None),
        };

        match fetched {
            Ok(token) => {
                self.token = Some(token.clone());
                Ok(Some(token))
            }
            Err(e) => {
                warn!(error = %e, "failed to get log stream token");
                self.fail(format!("Failed to authenticate for log streaming: {}", e));
                Err(e.into())
            }
        }
    }

    /// Enter Connecting and try to open the transport
    async fn connect(&mut self) {
        let Some(token) = self.ensure_token().await.ok().flatten() else {
            return;
        };
        let Some((container, cancel)) = self
            .session
            .as_ref()
            .map(|s| (s.container.clone(), s.cancel.clone()))
        else {
            return;
        };
        if cancel.is_cancelled() {
            return;
        }

        self.set_state(ConnectionState::Connecting);
        self.emit(MessageClassifier::system(format!(
            "Connecting to logs for {}...",
            container
        )));

        let transport = Arc::clone(&self.transport);
        let opened = tokio::select! {
            opened = transport.open(&token) => opened,
            _ = cancel.cancelled() => return,
        };

        match opened {
            Ok(mut link) => {
                info!(container = %container, "log stream connected");
                if let Some(session) = self.session.as_mut() {
                    session.attempt = 0;
                }
                self.set_state(ConnectionState::Streaming);

                let start = ControlMessage::StartLogs {
                    container_name: container.clone(),
                };
                match link.sink.send(&start).await {
                    Ok(()) => {
                        debug!(container = %container, "sent start_logs");
                        self.emit(MessageClassifier::started(format!(
                            "Log streaming started for {}",
                            container
                        )));
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to send start_logs");
                        self.record_error(format!("Failed to start logs: {}", e));
                    }
                }
                self.link = Some(link);
            }
            Err(TransportError::Unauthorized { status }) => {
                warn!(status, "log service rejected the token");
                self.token = None;
                self.fail(format!(
                    "Failed to authenticate for log streaming: {}",
                    AuthError::Rejected
                ));
            }
            Err(e) => {
                warn!(error = %e, "failed to open log stream");
                self.record_error(format!("Connection failed: {}", e));
                self.schedule_reconnect();
            }
        }
    }

    async fn handle_event(&mut self, event: Option<TransportEvent>) {
        let received_at = Utc::now();
        let parsed = match event {
            Some(TransportEvent::Frame(text)) => MessageClassifier::classify(&text, received_at),
            Some(TransportEvent::Binary(data)) => {
                MessageClassifier::classify_bytes(&data, received_at)
            }
            Some(TransportEvent::Closed(info)) => return self.handle_close(info),
            None => return self.handle_close(CloseInfo::abnormal("connection lost")),
        };

        match parsed {
            Ok(entry) => self.emit(entry),
            Err(e) => {
                debug!(error = %e, "dropping malformed frame");
                self.record_error(format!("Failed to parse log message: {}", e));
            }
        }
    }

    fn handle_close(&mut self, info: CloseInfo) {
        self.link = None;
        if self.state() != ConnectionState::Streaming {
            return;
        }

        if info.is_clean() {
            info!(close = %info, "log stream closed by server");
            self.set_state(ConnectionState::Stopped);
            self.emit(MessageClassifier::stopped(format!(
                "Log streaming ended by server ({})",
                info
            )));
            return;
        }

        warn!(close = %info, "log stream closed unexpectedly");
        self.record_error(format!("Connection closed unexpectedly ({})", info));
        self.schedule_reconnect();
    }

    /// Arm the reconnect timer, or give up once attempts are spent
    fn schedule_reconnect(&mut self) {
        let policy = self.policy;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if policy.should_give_up(session.attempt) {
            warn!(attempts = session.attempt, "giving up on log stream");
            self.retry = None;
            self.fail(format!(
                "Failed to reconnect after {} attempts",
                policy.max_attempts()
            ));
            return;
        }

        session.attempt += 1;
        let attempt = session.attempt;
        let delay = policy.next_delay(attempt);
        info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");

        self.retry = Some(Box::pin(sleep(delay)));
        self.set_state(ConnectionState::Reconnecting);
        self.emit(MessageClassifier::system(format!(
            "Connection lost. Reconnecting in {} seconds... (Attempt {}/{})",
            delay.as_secs_f64().round(),
            attempt,
            policy.max_attempts()
        )));
    }

    async fn handle_retry(&mut self) {
        self.retry = None;
        let live = self
            .session
            .as_ref()
            .is_some_and(|s| s.state == ConnectionState::Reconnecting && !s.cancel.is_cancelled());
        if live {
            self.connect().await;
        }
    }

    /// Stop the current session, if it is doing anything
    async fn stop(&mut self) {
        self.retry = None;
        let state = self.state();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.cancel.cancel();
        if !state.is_active() {
            return;
        }
        session.attempt = 0;

        if let Some(mut link) = self.link.take() {
            if state == ConnectionState::Streaming {
                match link.sink.send(&ControlMessage::StopLogs).await {
                    Ok(()) => debug!("sent stop_logs"),
                    Err(e) => debug!(error = %e, "failed to send stop_logs"),
                }
            }
            if let Err(e) = link.sink.close(NORMAL_CLOSE, USER_STOP_REASON).await {
                debug!(error = %e, "error closing log stream");
            }
        }

        info!("log streaming stopped by user");
        self.set_state(ConnectionState::Stopped);
        self.emit(MessageClassifier::stopped("Log streaming stopped"));
    }

    /// Terminal failure: surface the error and stop
    fn fail(&mut self, message: String) {
        self.link = None;
        self.retry = None;
        if let Some(session) = self.session.as_mut() {
            session.attempt = 0;
        }
        self.record_error(message);
        self.set_state(ConnectionState::Stopped);
    }

    fn record_error(&mut self, message: String) {
        if let Some(session) = self.session.as_mut() {
            session.last_error = Some(message.clone());
        }
        self.emit(MessageClassifier::error(message));
        self.publish();
    }

    fn emit(&self, entry: LogEntry) {
        self.buffer.push(entry);
    }

    fn state(&self) -> ConnectionState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(ConnectionState::Idle)
    }

    fn set_state(&mut self, state: ConnectionState) {
        if let Some(session) = self.session.as_mut() {
            if session.state != state {
                debug!(container = %session.container, from = %session.state, to = %state, "state change");
            }
            session.state = state;
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = match &self.session {
            Some(s) => ConnectionSnapshot {
                container: Some(s.container.clone()),
                state: s.state,
                attempt: s.attempt,
                last_error: s.last_error.clone(),
            },
            None => ConnectionSnapshot::default(),
        };
        self.status.send_replace(snapshot);
    }
}

async fn next_event(link: &mut Option<Connection>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.events.recv().await,
        None => pending().await,
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}
