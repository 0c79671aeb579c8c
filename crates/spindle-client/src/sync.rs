//! Live state synchronization.
//!
//! One [`StateSync`] owns one logical connection to the controller: it
//! merges incremental deltas into the mirrored state, forwards log
//! entries, watches the session identifier for controller restarts and
//! reports connection transitions. Collaborators read the mirrored state
//! and react to [`SyncEvent`]s; only the sync task writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::sync::{RwLock, RwLockReadGuard, broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use spindle_core::{
    ConnectionState, Frame, ResyncAction, SessionTracker, classify, merge, viewer3d_allowed,
};

use crate::config::SyncConfig;

/// Notification emitted by the sync task.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Connection state changed.
    Status(ConnectionState),
    /// A delta was merged; the mirrored state is current.
    Updated,
    /// Log entry forwarded from the controller, verbatim.
    Log(Value),
    /// The controller restarted; this scope is dead and the embedder
    /// must recover as directed.
    Resync(ResyncAction),
}

struct SyncInner {
    config: SyncConfig,
    state: RwLock<Map<String, Value>>,
    status: std::sync::Mutex<ConnectionState>,
    events: broadcast::Sender<SyncEvent>,
    session: std::sync::Mutex<SessionTracker>,
    outbound: std::sync::Mutex<Option<mpsc::UnboundedSender<Message>>>,
    viewer3d: AtomicBool,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// How one websocket session ended.
enum SessionEnd {
    /// Transport closed; reconnect.
    Closed,
    /// Controller restarted; the scope is dead.
    Resync,
}

/// The state synchronization client.
///
/// Cheap to clone; clones share the connection scope. Created once per
/// logical connection and discarded wholesale on a hard resync.
#[derive(Clone)]
pub struct StateSync {
    inner: Arc<SyncInner>,
}

impl StateSync {
    pub fn new(config: SyncConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        let viewer3d = config.viewer3d;
        Self {
            inner: Arc::new(SyncInner {
                config,
                state: RwLock::new(Map::new()),
                status: std::sync::Mutex::new(ConnectionState::Connecting),
                events,
                session: std::sync::Mutex::new(SessionTracker::new()),
                outbound: std::sync::Mutex::new(None),
                viewer3d: AtomicBool::new(viewer3d),
            }),
        }
    }

    /// Spawn the connection task.
    ///
    /// Returns immediately; all progress is reported through events. The
    /// task reconnects after every transport close and only exits on a
    /// hard resync.
    pub fn connect(&self) -> tokio::task::JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(run(inner))
    }

    /// Subscribe to sync notifications.
    ///
    /// Subscribe before calling [`connect`](StateSync::connect) to
    /// observe the first transition.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Read access to the mirrored state. Only the sync task writes.
    pub async fn read(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.inner.state.read().await
    }

    pub fn status(&self) -> ConnectionState {
        *self.inner.status.lock().unwrap()
    }

    /// Whether the 3D viewer capability is still enabled. Starts from the
    /// embedder-detected value and is revoked when a local panel reports
    /// a low-power head.
    pub fn viewer3d_supported(&self) -> bool {
        self.inner.viewer3d.load(Ordering::Relaxed)
    }

    /// Record the hostname announced on the out-of-band channel; used to
    /// decide between redirect and reload on a hard resync.
    pub fn set_hostname(&self, hostname: impl Into<String>) {
        self.inner.session.lock().unwrap().set_hostname(hostname);
    }

    /// Send a message to the controller.
    ///
    /// Silently dropped unless connected; nothing is ever queued across
    /// a disconnect.
    pub fn send(&self, message: &Value) {
        if self.status() != ConnectionState::Connected {
            tracing::debug!("dropping outbound message while disconnected");
            return;
        }
        if let Some(tx) = self.inner.outbound.lock().unwrap().as_ref() {
            let _ = tx.send(Message::Text(message.to_string().into()));
        }
    }
}

impl SyncInner {
    fn set_status(&self, status: ConnectionState) {
        let changed = {
            let mut current = self.status.lock().unwrap();
            let changed = *current != status;
            *current = status;
            changed
        };
        if changed {
            tracing::debug!(?status, "connection state");
            let _ = self.events.send(SyncEvent::Status(status));
        }
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }

    /// Revoke the 3D viewer capability when a local panel reports a
    /// low-power head. Never re-grants.
    fn apply_render_policy(&self, state: &Map<String, Value>) {
        let model = state.get("rpi_model").and_then(Value::as_str);
        if !viewer3d_allowed(self.config.host(), model) {
            self.viewer3d.store(false, Ordering::Relaxed);
        }
    }
}

async fn run(inner: Arc<SyncInner>) {
    loop {
        inner.set_status(ConnectionState::Connecting);

        match tokio_tungstenite::connect_async(inner.config.endpoint.as_str()).await {
            Ok((ws, _)) => {
                let (sink, stream) = ws.split();
                let (tx, rx) = mpsc::unbounded_channel();
                *inner.outbound.lock().unwrap() = Some(tx);
                inner.set_status(ConnectionState::Connected);

                let end = pump(&inner, sink, stream, rx).await;

                inner.outbound.lock().unwrap().take();
                inner.set_status(ConnectionState::Disconnected);

                if matches!(end, SessionEnd::Resync) {
                    return;
                }
            }
            Err(e) => {
                // Not a transport close; no state transition.
                tracing::warn!("connect to {} failed: {e}", inner.config.endpoint);
            }
        }

        tokio::time::sleep(inner.config.reconnect_delay()).await;
    }
}

/// Pump one websocket session until it closes or a resync fires.
async fn pump(
    inner: &Arc<SyncInner>,
    mut sink: WsSink,
    mut stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) -> SessionEnd {
    loop {
        tokio::select! {
            outgoing = outbound.recv() => {
                let Some(message) = outgoing else {
                    return SessionEnd::Closed;
                };
                if sink.send(message).await.is_err() {
                    return SessionEnd::Closed;
                }
            }

            incoming = stream.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        tracing::debug!("websocket error: {e}");
                        return SessionEnd::Closed;
                    }
                    None => return SessionEnd::Closed,
                };

                match message {
                    Message::Text(text) => {
                        let value: Value = match serde_json::from_str(&text) {
                            Ok(value) => value,
                            Err(e) => {
                                tracing::warn!("unparseable message: {e}");
                                continue;
                            }
                        };
                        if let Some(end) = handle_message(inner, value).await {
                            return end;
                        }
                    }
                    Message::Close(_) => return SessionEnd::Closed,
                    _ => {}
                }
            }
        }
    }
}

/// Apply one inbound message: forward log, check session, merge delta.
///
/// A session mismatch aborts before the delta of that message is merged.
async fn handle_message(inner: &Arc<SyncInner>, message: Value) -> Option<SessionEnd> {
    for frame in classify(message) {
        match frame {
            Frame::Log(entry) => inner.emit(SyncEvent::Log(entry)),

            Frame::Session(sid) => {
                let action = inner
                    .session
                    .lock()
                    .unwrap()
                    .observe(&sid, inner.config.host());
                if let Some(action) = action {
                    tracing::warn!("controller session changed, forcing resync");
                    inner.emit(SyncEvent::Resync(action));
                    return Some(SessionEnd::Resync);
                }
            }

            Frame::Delta(delta) => {
                {
                    let mut state = inner.state.write().await;
                    merge(&mut state, &delta);
                    inner.apply_render_policy(&state);
                }
                inner.emit(SyncEvent::Updated);
            }
        }
    }
    None
}
