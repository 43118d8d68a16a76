//! Session channel manager
//!
//! A [`SessionChannel`] handle drives a single actor task that owns every
//! piece of session state: the transport, the heartbeat ticker and the
//! reconnect deadline. Commands from handles, inbound frames, heartbeat
//! ticks and retry deadlines are all serialized through one event loop,
//! so at most one live transport, one heartbeat ticker and one pending
//! reconnect timer can exist at any instant.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tracing::{debug, error, info, warn};

use crate::config::ChannelConfig;
use crate::protocol::{ChannelError, Frame};

use super::backoff::ReconnectPolicy;
use super::heartbeat::Heartbeat;
use super::router::{self, Dispatch};
use super::stats::{ChannelStats, StatsSnapshot};

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state of the session channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Disconnected with a retry pending.
    Reconnecting { attempt: u32 },
    /// Terminal until a fresh `connect`: the retry budget is spent.
    ReconnectExhausted,
    /// Terminal until a fresh `connect`: the server revoked this session.
    ForcedLogout,
}

/// Events surfaced to observers, in emission order.
#[derive(Debug, Clone)]
pub enum ChannelNotice {
    /// One delivered inbound frame, in arrival order.
    Message(Frame),
    /// A non-terminal failure (open, send or decode) was recorded.
    Error { message: String },
    /// The server revoked this session; re-authentication is required.
    ForcedLogout { userid: String },
    /// The retry budget is spent; a fresh `connect` is required.
    ReconnectExhausted { attempts: u32 },
}

/// One inbound frame together with its arrival time.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub frame: Frame,
    pub received_at: DateTime<Utc>,
}

/// Commands accepted by the channel actor.
#[derive(Debug)]
enum Command {
    Connect { address: String, identity: String },
    Close,
    SendLogin { identity: String },
    SendForceOffline { userid: String },
}

/// Handle to a session channel actor.
///
/// Cloneable; concurrent callers are serialized by the actor. Dropping
/// every handle terminates the actor and closes the transport.
#[derive(Clone)]
pub struct SessionChannel {
    command_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
    messages: Arc<RwLock<Vec<ReceivedFrame>>>,
    stats: Arc<ChannelStats>,
}

impl SessionChannel {
    /// Spawn the channel actor. Returns the handle and the notice stream.
    pub fn new(config: ChannelConfig) -> (Self, mpsc::UnboundedReceiver<ChannelNotice>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let messages = Arc::new(RwLock::new(Vec::new()));
        let stats = Arc::new(ChannelStats::new());

        let actor = ChannelActor {
            heartbeat: Heartbeat::new(config.heartbeat_interval()),
            reconnect: ReconnectPolicy::from_config(&config),
            command_rx,
            status_tx,
            notice_tx,
            messages: messages.clone(),
            stats: stats.clone(),
            session: None,
            transport: None,
        };
        tokio::spawn(actor.run());

        (
            Self {
                command_tx,
                status_rx,
                messages,
                stats,
            },
            notice_rx,
        )
    }

    /// Open (or re-open) the channel to `address` as `identity`.
    ///
    /// Returns immediately; the open proceeds in the actor and completion
    /// is reported through the status observable. Any prior connection is
    /// torn down first.
    pub fn connect(&self, address: impl Into<String>, identity: impl Into<String>) -> Result<()> {
        self.command(Command::Connect {
            address: address.into(),
            identity: identity.into(),
        })
    }

    /// Deliberately close the channel and suppress reconnection.
    pub fn close(&self) -> Result<()> {
        self.command(Command::Close)
    }

    /// Re-announce an identity on the current connection.
    pub fn send_login(&self, identity: impl Into<String>) -> Result<()> {
        self.command(Command::SendLogin {
            identity: identity.into(),
        })
    }

    /// Ask the server to revoke another user's session.
    pub fn send_force_offline(&self, userid: impl Into<String>) -> Result<()> {
        self.command(Command::SendForceOffline {
            userid: userid.into(),
        })
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch receiver for connection status transitions.
    pub fn status_stream(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.status(), ConnectionStatus::Connected)
    }

    /// Snapshot of the append-only received-message sequence.
    pub fn messages(&self) -> Vec<ReceivedFrame> {
        match self.messages.read() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Snapshot of the channel counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| anyhow::anyhow!("channel actor is gone: {}", e))
    }
}

/// Target and identity of the current logical session.
#[derive(Debug)]
struct Session {
    address: String,
    identity: String,
    /// Set by `close` and by forced logout; suppresses reconnection until
    /// the next `connect` replaces the session.
    explicit_close: bool,
    last_error: Option<String>,
}

impl Session {
    fn new(address: String, identity: String) -> Self {
        Self {
            address,
            identity,
            explicit_close: false,
            last_error: None,
        }
    }
}

struct ChannelActor {
    command_rx: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<ConnectionStatus>,
    notice_tx: mpsc::UnboundedSender<ChannelNotice>,
    messages: Arc<RwLock<Vec<ReceivedFrame>>>,
    stats: Arc<ChannelStats>,
    session: Option<Session>,
    transport: Option<Transport>,
    heartbeat: Heartbeat,
    reconnect: ReconnectPolicy,
}

/// Next inbound transport message; pends forever while disconnected.
async fn next_inbound(
    transport: &mut Option<Transport>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match transport.as_mut() {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

impl ChannelActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        // Every handle is gone; tear down and exit.
                        None => break,
                    }
                }
                inbound = next_inbound(&mut self.transport) => {
                    self.handle_inbound(inbound).await;
                }
                _ = self.heartbeat.tick() => {
                    self.on_heartbeat().await;
                }
                _ = self.reconnect.due() => {
                    self.on_reconnect_due().await;
                }
            }
        }

        self.teardown_connection().await;
        debug!("channel actor terminated");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { address, identity } => {
                self.teardown_connection().await;
                info!("connecting to {} as {}", address, identity);
                self.session = Some(Session::new(address, identity));
                self.reconnect.reset();
                self.try_open().await;
            }
            Command::Close => self.handle_close().await,
            Command::SendLogin { identity } => {
                if let Err(e) = self.send_frame(&Frame::login(&identity)).await {
                    warn!("login send failed: {}", e);
                    self.record_error(e);
                }
            }
            Command::SendForceOffline { userid } => {
                match self.send_frame(&Frame::force_offline(&userid)).await {
                    Ok(()) => info!("requested revocation of session {}", userid),
                    Err(e) => {
                        warn!("force offline send failed: {}", e);
                        self.record_error(e);
                    }
                }
            }
        }
    }

    /// Deliberate close: stop timers, drop the transport, keep the actor
    /// alive for a future `connect`.
    async fn handle_close(&mut self) {
        if let Some(session) = &mut self.session {
            session.explicit_close = true;
        }
        self.teardown_connection().await;
        self.reconnect.reset();
        self.set_status(ConnectionStatus::Disconnected);
        info!("channel closed");
    }

    /// Open the transport for the current session and run the login
    /// handshake. Failures are recorded and fed to the reconnect policy,
    /// never returned.
    async fn try_open(&mut self) {
        let (address, identity) = match &self.session {
            Some(session) => (session.address.clone(), session.identity.clone()),
            None => return,
        };

        self.set_status(ConnectionStatus::Connecting);
        match connect_async(&address).await {
            Ok((ws, _)) => {
                self.transport = Some(ws);
                self.reconnect.reset();
                self.set_status(ConnectionStatus::Connected);
                info!("connected to {}", address);

                // Heartbeat starts only once the login frame is on the wire.
                match self.send_frame(&Frame::login(&identity)).await {
                    Ok(()) => {
                        debug!("login sent for {}", identity);
                        self.heartbeat.start();
                    }
                    Err(e) => {
                        warn!("login send failed: {}", e);
                        self.record_error(e);
                    }
                }
            }
            Err(e) => {
                warn!("failed to open transport to {}: {}", address, e);
                self.record_error(ChannelError::OpenFailed(e.to_string()));
                self.set_status(ConnectionStatus::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    async fn handle_inbound(
        &mut self,
        inbound: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) {
        match inbound {
            Some(Ok(Message::Text(text))) => self.on_frame(&text).await,
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                debug!("transport-level ping/pong");
            }
            Some(Ok(Message::Close(_))) => {
                info!("server closed the connection");
                self.on_transport_closed(None).await;
            }
            Some(Ok(other)) => {
                debug!("ignoring non-text transport message: {:?}", other);
            }
            Some(Err(e)) => {
                self.on_transport_closed(Some(e.to_string())).await;
            }
            None => {
                self.on_transport_closed(None).await;
            }
        }
    }

    /// One inbound text frame: decode, append, dispatch.
    async fn on_frame(&mut self, text: &str) {
        let frame = match router::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping inbound frame: {}", e);
                self.stats.record_decode_failure();
                return;
            }
        };

        self.stats.record_received();
        self.append_message(frame.clone());
        self.emit(ChannelNotice::Message(frame.clone()));

        let dispatch = match &self.session {
            Some(session) => router::dispatch(&frame, &session.identity),
            None => Dispatch::Deliver,
        };
        if let Dispatch::ForcedLogout { userid } = dispatch {
            self.on_forced_logout(userid).await;
        }
    }

    /// Server-initiated terminal teardown. Reconnection stays suppressed
    /// until the caller issues a fresh `connect`.
    async fn on_forced_logout(&mut self, userid: String) {
        warn!("server revoked the session of {}", userid);
        self.emit(ChannelNotice::ForcedLogout { userid });
        if let Some(session) = &mut self.session {
            session.explicit_close = true;
        }
        self.teardown_connection().await;
        self.reconnect.reset();
        self.set_status(ConnectionStatus::ForcedLogout);
    }

    /// The transport dropped out from under us (or failed to stay up).
    async fn on_transport_closed(&mut self, error: Option<String>) {
        self.transport = None;
        self.heartbeat.stop();
        match error {
            Some(message) => {
                warn!("connection lost: {}", message);
                self.record_error(ChannelError::UnexpectedClose(message));
            }
            None => info!("connection closed"),
        }
        self.set_status(ConnectionStatus::Disconnected);
        self.schedule_reconnect();
    }

    async fn on_heartbeat(&mut self) {
        if self.transport.is_none() {
            debug!("heartbeat tick while disconnected, ignoring");
            return;
        }
        match self.send_frame(&Frame::ping()).await {
            Ok(()) => self.stats.record_ping(),
            Err(e) => {
                warn!("heartbeat send failed: {}", e);
                self.record_error(e);
            }
        }
    }

    async fn on_reconnect_due(&mut self) {
        self.reconnect.cancel();
        info!(
            "reconnect attempt {}/{}",
            self.reconnect.attempts(),
            self.reconnect.max_attempts()
        );
        self.try_open().await;
    }

    /// Arm the retry deadline after an unexpected close, or surface the
    /// terminal exhausted condition once the budget is spent.
    fn schedule_reconnect(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        if session.explicit_close {
            debug!("close was deliberate, not reconnecting");
            return;
        }

        match self.reconnect.schedule() {
            Some(wait) => {
                let attempt = self.reconnect.attempts();
                info!(
                    "scheduling reconnect attempt {}/{} in {:?}",
                    attempt,
                    self.reconnect.max_attempts(),
                    wait
                );
                self.stats.record_reconnect_attempt();
                self.set_status(ConnectionStatus::Reconnecting { attempt });
            }
            None => {
                let attempts = self.reconnect.attempts();
                let last_error = self
                    .session
                    .as_ref()
                    .and_then(|session| session.last_error.clone());
                error!(
                    "giving up after {} reconnect attempts (last error: {:?})",
                    attempts, last_error
                );
                self.set_status(ConnectionStatus::ReconnectExhausted);
                self.emit(ChannelNotice::ReconnectExhausted { attempts });
            }
        }
    }

    /// Stop timers and close the transport, in that order. Idempotent.
    async fn teardown_connection(&mut self) {
        self.heartbeat.stop();
        self.reconnect.cancel();
        if let Some(mut ws) = self.transport.take() {
            if let Err(e) = ws.close(None).await {
                debug!("error closing transport: {}", e);
            }
        }
    }

    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ChannelError> {
        let ws = self
            .transport
            .as_mut()
            .ok_or_else(|| ChannelError::SendFailed("not connected".to_string()))?;
        let text =
            serde_json::to_string(frame).map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        ws.send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        self.stats.record_sent();
        Ok(())
    }

    fn append_message(&self, frame: Frame) {
        let entry = ReceivedFrame {
            frame,
            received_at: Utc::now(),
        };
        match self.messages.write() {
            Ok(mut log) => log.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    fn record_error(&mut self, error: ChannelError) {
        let message = error.to_string();
        if let Some(session) = &mut self.session {
            session.last_error = Some(message.clone());
        }
        self.emit(ChannelNotice::Error { message });
    }

    fn emit(&self, notice: ChannelNotice) {
        if self.notice_tx.send(notice).is_err() {
            debug!("notice receiver dropped");
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                debug!("connection status: {:?} -> {:?}", current, status);
                *current = status;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> ChannelConfig {
        ChannelConfig {
            url: "ws://127.0.0.1:9".to_string(),
            heartbeat_interval_ms: 100,
            reconnect_base_ms: 50,
            reconnect_cap_ms: 200,
            max_reconnect_attempts: 2,
        }
    }

    #[tokio::test]
    async fn test_initial_status_is_disconnected() {
        let (channel, _notices) = SessionChannel::new(test_config());
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);
        assert!(!channel.is_connected());
        assert!(channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_close_before_connect_is_a_safe_noop() {
        let (channel, _notices) = SessionChannel::new(test_config());
        channel.close().unwrap();
        channel.close().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_surfaces_send_failure() {
        let (channel, mut notices) = SessionChannel::new(test_config());
        channel.send_force_offline("u2").unwrap();

        let notice = tokio::time::timeout(Duration::from_secs(1), notices.recv())
            .await
            .expect("timed out waiting for notice")
            .expect("notice channel closed");
        match notice {
            ChannelNotice::Error { message } => assert!(message.contains("not connected")),
            other => panic!("unexpected notice: {:?}", other),
        }
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);
    }
}
