use crate::connection::Backoff;
use crate::event::DeckEvent;
use anyhow::Context;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Event source connection configuration
#[derive(Clone, Debug, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
    /// Capacity of the channel between the socket and the reducer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_url() -> String {
    std::env::var("COMMANDDECK_WS_URL").unwrap_or_else(|_| "ws://localhost:8765/ws".to_string())
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_growth_factor() -> f64 {
    1.5
}

fn default_event_buffer() -> usize {
    1024
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            growth_factor: default_growth_factor(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ConnectionConfig {
    /// Fresh backoff schedule for this configuration
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.growth_factor,
        )
    }
}

/// Counters exposed on the status endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub frames_received: u64,
    /// Malformed or invalid inbound frames
    pub frames_dropped: u64,
    /// Sends refused while disconnected or invalid
    pub sends_dropped: u64,
    pub reconnect_attempts: u64,
}

/// State shared between the manager handle and its supervisor task
struct Shared {
    config: ConnectionConfig,
    connected: AtomicBool,
    /// Writer for the live socket; None while disconnected
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    last_event: RwLock<Option<DeckEvent>>,
    events_tx: mpsc::Sender<DeckEvent>,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    sends_dropped: AtomicU64,
    reconnect_attempts: AtomicU64,
}

/// A running supervisor and the switch that stops it
struct Session {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Session {
    async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Connection supervisor ended abnormally");
        }
    }
}

/// Why a live session ended
#[derive(Debug, PartialEq)]
enum SessionEnd {
    /// Socket closed or errored; reconnect
    Lost,
    /// Shutdown or reconnect requested by the owner
    Stopped,
    /// Reducer channel closed; nothing left to deliver to
    ReducerGone,
}

/// Connection manager owns the single logical connection to the event source.
///
/// Inbound frames are parsed into [`DeckEvent`]s and forwarded, in arrival
/// order, over the channel given at construction. Connection loss triggers a
/// reconnect after a capped exponential backoff; no caller-side retry is
/// needed.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, events_tx: mpsc::Sender<DeckEvent>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                connected: AtomicBool::new(false),
                outbound: Mutex::new(None),
                last_event: RwLock::new(None),
                events_tx,
                frames_received: AtomicU64::new(0),
                frames_dropped: AtomicU64::new(0),
                sends_dropped: AtomicU64::new(0),
                reconnect_attempts: AtomicU64::new(0),
            }),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Start (or restart) the connection.
    ///
    /// Idempotent: any existing connection is closed and its supervisor
    /// awaited before a new one is started.
    pub async fn connect(&self) {
        let mut session = self.session.lock().await;

        if let Some(previous) = session.take() {
            info!("Closing existing connection before reconnecting");
            previous.stop().await;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(supervise(Arc::clone(&self.shared), stop_rx));

        *session = Some(Session {
            stop: stop_tx,
            handle,
        });
    }

    /// Cancel any pending reconnect, close the live socket, and stop for good
    pub async fn shutdown(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.stop().await;
            info!("Connection manager shut down");
        }
    }

    /// Send an event to the source.
    ///
    /// Returns true when the frame was handed to the live socket. While
    /// disconnected the event is dropped (and logged), never queued.
    pub fn send(&self, mut event: DeckEvent) -> bool {
        if !self.is_connected() {
            self.shared.sends_dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                kind = ?event.kind,
                agent_id = %event.agent_id,
                "Cannot send event - not connected"
            );
            return false;
        }

        if let Err(e) = event.validate_and_prepare() {
            self.shared.sends_dropped.fetch_add(1, Ordering::Relaxed);
            warn!(agent_id = %event.agent_id, error = %e, "Refusing to send invalid event");
            return false;
        }

        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                self.shared.sends_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Failed to serialize outbound event");
                return false;
            }
        };

        let sent = self
            .shared
            .outbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|tx| tx.send(payload).is_ok());

        if sent {
            debug!(kind = ?event.kind, agent_id = %event.agent_id, "Event queued for send");
        } else {
            self.shared.sends_dropped.fetch_add(1, Ordering::Relaxed);
            warn!(agent_id = %event.agent_id, "Connection lost before send, dropping event");
        }

        sent
    }

    /// Connectivity flag; never blocks
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Most recent valid event received from the source
    pub fn last_event(&self) -> Option<DeckEvent> {
        self.shared
            .last_event
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn url(&self) -> &str {
        &self.shared.config.url
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            frames_received: self.shared.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.shared.frames_dropped.load(Ordering::Relaxed),
            sends_dropped: self.shared.sends_dropped.load(Ordering::Relaxed),
            reconnect_attempts: self.shared.reconnect_attempts.load(Ordering::Relaxed),
        }
    }
}

impl Shared {
    fn mark_connected(&self, outbound: mpsc::UnboundedSender<String>) {
        *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = Some(outbound);
        self.connected.store(true, Ordering::SeqCst);
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Parse one text frame and hand it to the reducer.
    ///
    /// Malformed or invalid frames are dropped without touching the
    /// connection. Returns false only when the reducer channel is closed.
    async fn deliver(&self, text: &str) -> bool {
        self.frames_received.fetch_add(1, Ordering::Relaxed);

        let event: DeckEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Failed to parse event frame, dropping");
                return true;
            }
        };

        if let Err(e) = event.validate() {
            self.frames_dropped.fetch_add(1, Ordering::Relaxed);
            warn!(agent_id = %event.agent_id, error = %e, "Invalid event, dropping");
            return true;
        }

        debug!(kind = ?event.kind, agent_id = %event.agent_id, "Event received");
        *self.last_event.write().unwrap_or_else(|e| e.into_inner()) = Some(event.clone());

        self.events_tx.send(event).await.is_ok()
    }
}

/// Dial, run the session, and on loss wait out the backoff before redialing.
///
/// Dial failures take the same backoff path as a dropped connection.
async fn supervise(shared: Arc<Shared>, mut stop: watch::Receiver<bool>) {
    let mut backoff = shared.config.backoff();

    loop {
        info!(url = %shared.config.url, "Connecting to event source");

        let attempt = tokio::select! {
            result = connect_async(shared.config.url.as_str()) => {
                result.context("Failed to connect to event source")
            }
            _ = stop.changed() => break,
        };

        match attempt {
            Ok((socket, _response)) => {
                backoff.reset();
                match run_session(&shared, socket, &mut stop).await {
                    SessionEnd::Lost => {}
                    SessionEnd::Stopped => break,
                    SessionEnd::ReducerGone => {
                        warn!("Event channel closed, stopping connection");
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Connection attempt failed");
            }
        }

        let delay = backoff.next_delay();
        shared.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
        info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.changed() => break,
        }
    }

    shared.mark_disconnected();
    debug!("Connection supervisor stopped");
}

async fn run_session(
    shared: &Shared,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    stop: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    shared.mark_connected(out_tx);
    info!("Connected to event source");

    let end = loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !shared.deliver(text.as_str()).await {
                        break SessionEnd::ReducerGone;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Event source closed the connection");
                    break SessionEnd::Lost;
                }
                Some(Ok(_)) => {
                    // Binary, ping, pong
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    break SessionEnd::Lost;
                }
                None => break SessionEnd::Lost,
            },

            Some(payload) = out_rx.recv() => {
                if let Err(e) = ws_tx.send(Message::text(payload)).await {
                    warn!(error = %e, "Failed to write outbound frame");
                    break SessionEnd::Lost;
                }
            }

            _ = stop.changed() => {
                let _ = ws_tx.close().await;
                break SessionEnd::Stopped;
            }
        }
    };

    shared.mark_disconnected();
    info!("Disconnected from event source");
    end
}
