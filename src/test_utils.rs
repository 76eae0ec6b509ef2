//! Test utilities: an in-memory transport and payload fixtures
//!
//! [`ScriptedTransport`] stands in for the feed server. Every `open()` creates a
//! session whose server side is exposed as a [`ServerHandle`], so a test can push
//! messages, inject errors, drop the connection and inspect what the client sent.

#![cfg(any(test, feature = "test-utils"))]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::transport::{InboundMessage, Transport, TransportSession};
use crate::{FeedError, Result};

enum ScriptEvent {
    Message(InboundMessage),
    Error(String),
    Disconnect,
}

struct ScriptState {
    endpoint: String,
    opens: AtomicUsize,
    failing_opens: AtomicUsize,
    open_delay: Mutex<Duration>,
    sessions: Mutex<Vec<ServerHandle>>,
    opened_tx: mpsc::UnboundedSender<ServerHandle>,
    opened_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerHandle>>,
}

/// In-memory transport driven by the test.
#[derive(Clone)]
pub struct ScriptedTransport {
    state: Arc<ScriptState>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        let (opened_tx, opened_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(ScriptState {
                endpoint: "scripted://feed".to_string(),
                opens: AtomicUsize::new(0),
                failing_opens: AtomicUsize::new(0),
                open_delay: Mutex::new(Duration::ZERO),
                sessions: Mutex::new(Vec::new()),
                opened_tx,
                opened_rx: tokio::sync::Mutex::new(opened_rx),
            }),
        }
    }

    /// Number of `open()` calls so far, failed ones included.
    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Make the next `count` opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.state.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Delay every open by `delay`, to observe the `Connecting` state.
    pub fn set_open_delay(&self, delay: Duration) {
        *self.state.open_delay.lock() = delay;
    }

    /// Wait for the next successfully opened session.
    pub async fn next_session(&self) -> ServerHandle {
        self.state.opened_rx.lock().await.recv().await.expect("transport state outlives its receiver")
    }

    /// Most recently opened session, if any.
    pub fn latest_session(&self) -> Option<ServerHandle> {
        self.state.sessions.lock().last().cloned()
    }

    /// Number of sessions opened successfully.
    pub fn session_count(&self) -> usize {
        self.state.sessions.lock().len()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    type Session = ScriptedSession;

    async fn open(&self) -> Result<Self::Session> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.open_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self.state.failing_opens.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_opens.store(failing - 1, Ordering::SeqCst);
            return Err(FeedError::connection_failed(&self.state.endpoint, "scripted open failure"));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let server = ServerHandle {
            events: events_tx,
            pending: Arc::new(pending),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed_by_client: Arc::new(AtomicBool::new(false)),
        };

        let session = ScriptedSession {
            events: events_rx,
            pending: Arc::clone(&server.pending),
            sent: Arc::clone(&server.sent),
            closed_by_client: Arc::clone(&server.closed_by_client),
            awaiting_ack: false,
            closed: false,
        };

        self.state.sessions.lock().push(server.clone());
        let _ = self.state.opened_tx.send(server);
        Ok(session)
    }

    fn endpoint(&self) -> &str {
        &self.state.endpoint
    }
}

/// Server side of one scripted session.
#[derive(Clone)]
pub struct ServerHandle {
    events: mpsc::UnboundedSender<ScriptEvent>,
    pending: Arc<watch::Sender<usize>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed_by_client: Arc<AtomicBool>,
}

impl ServerHandle {
    fn push(&self, event: ScriptEvent) {
        self.pending.send_modify(|n| *n += 1);
        if self.events.send(event).is_err() {
            self.pending.send_modify(|n| *n -= 1);
        }
    }

    pub fn push_text(&self, text: &str) {
        self.push(ScriptEvent::Message(InboundMessage::Text(text.to_string())));
    }

    pub fn push_binary(&self, bytes: &[u8]) {
        self.push(ScriptEvent::Message(InboundMessage::Binary(bytes.to_vec())));
    }

    /// Report a transport error without closing the session.
    pub fn push_error(&self, reason: &str) {
        self.push(ScriptEvent::Error(reason.to_string()));
    }

    /// Close the session from the server side.
    pub fn disconnect(&self) {
        let _ = self.events.send(ScriptEvent::Disconnect);
    }

    /// Wait until the client has fully processed every pushed message.
    ///
    /// A message counts as processed once the client asks for the next one, so
    /// every listener has returned by the time this resolves.
    pub async fn flush(&self) {
        let mut pending = self.pending.subscribe();
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    /// Text frames the client sent on this session.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Whether the client closed this session.
    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }
}

/// Client side of one scripted session.
pub struct ScriptedSession {
    events: mpsc::UnboundedReceiver<ScriptEvent>,
    pending: Arc<watch::Sender<usize>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed_by_client: Arc<AtomicBool>,
    awaiting_ack: bool,
    closed: bool,
}

impl ScriptedSession {
    fn ack(&mut self) {
        if std::mem::take(&mut self.awaiting_ack) {
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
        }
    }
}

#[async_trait::async_trait]
impl TransportSession for ScriptedSession {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>> {
        self.ack();
        if self.closed {
            return Ok(None);
        }

        match self.events.recv().await {
            Some(ScriptEvent::Message(message)) => {
                self.awaiting_ack = true;
                Ok(Some(message))
            }
            Some(ScriptEvent::Error(reason)) => {
                self.awaiting_ack = true;
                Err(FeedError::transport("scripted transport error", reason.into()))
            }
            Some(ScriptEvent::Disconnect) | None => {
                self.closed = true;
                Ok(None)
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(FeedError::not_connected("send on a closed scripted session"));
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.ack();
        self.closed = true;
        self.closed_by_client.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Raw message carrying only `stats`.
pub fn stats_message(stats: Value) -> String {
    json!({ "stats": stats }).to_string()
}

/// Raw message with snapshot-wide class counts and the server total.
pub fn vehicle_stats_message(car: u64, bus: u64, truck: u64, total: u64) -> String {
    stats_message(json!({
        "ActiveVehicleCounts": { "Car": car, "Bus": bus, "Truck": truck },
        "TotalActiveVehicles": total,
    }))
}

/// Raw message carrying only a base64 frame.
pub fn frame_envelope(encoded: &[u8]) -> String {
    json!({ "frame": STANDARD.encode(encoded) }).to_string()
}

/// A valid 4x4 JPEG.
pub fn tiny_jpeg() -> Vec<u8> {
    let image = image::RgbImage::from_fn(4, 4, |x, y| image::Rgb([(x * 60) as u8, (y * 60) as u8, 128]));
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut bytes).encode_image(&image).expect("4x4 RGB encodes as JPEG");
    bytes
}
