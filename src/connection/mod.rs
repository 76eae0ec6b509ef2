//! Shared connection to the traffic feed
//!
//! One [`ConnectionManager`] holds the single persistent connection that every
//! dashboard consumer shares. Consumers never open their own connection; they
//! register listeners (or mount projectors) and receive each decoded envelope.
//!
//! ## Lifecycle
//!
//! ```text
//! Disconnected --connect()--> Connecting --open--> Open
//! Open --closed by peer--> Reconnecting --delay--> Connecting
//! Connecting --open failed--> Reconnecting
//! any --close()--> Disconnected
//! ```
//!
//! Each `connect()` from an idle state spawns one driver task that owns the
//! transport session and performs reconnects. The task holds a
//! [`CancellationToken`]; `close()` cancels it under the same lock that guards
//! state transitions, so a stopped driver never writes state again and no
//! reconnect timer survives a `close()`.

mod driver;


use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::FeedConfig;
use crate::projectors::{MountedView, Projector};
use crate::registry::{ListenerHandle, SubscriberRegistry};
use crate::transport::{InboundMessage, Transport};
use crate::transports::WebSocketTransport;
use crate::types::{ConnectionState, Envelope};
use crate::{FeedError, Result};

/// Delay before reconnecting after the transport closes.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Point-in-time copy of the feed counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FeedStats {
    /// Envelopes decoded and handed to the registry.
    pub envelopes_delivered: u64,
    /// Inbound messages dropped because they did not decode.
    pub decode_errors: u64,
    /// Listener invocations that panicked.
    pub listener_failures: u64,
    /// Reconnect attempts started after a close or failed open.
    pub reconnect_attempts: u64,
    /// Outbound messages written to the transport.
    pub messages_sent: u64,
    /// Outbound messages discarded (not open, serialization or write failure).
    pub messages_dropped: u64,
}

#[derive(Default)]
struct Counters {
    envelopes_delivered: AtomicU64,
    decode_errors: AtomicU64,
    listener_failures: AtomicU64,
    reconnect_attempts: AtomicU64,
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> FeedStats {
        FeedStats {
            envelopes_delivered: self.envelopes_delivered.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Mutable connection state guarded by one lock.
#[derive(Default)]
struct Control {
    /// Token of the running driver, if any.
    cancel: Option<CancellationToken>,

    /// Outbound queue into the open session. Only set while `Open`.
    outbound: Option<mpsc::UnboundedSender<String>>,
}

/// State shared between manager handles and the driver task.
pub(crate) struct Shared<T: Transport> {
    transport: T,
    reconnect_delay: Duration,
    registry: Arc<SubscriberRegistry>,
    control: Mutex<Control>,
    state: watch::Sender<ConnectionState>,
    counters: Counters,
}

impl<T: Transport> Shared<T> {
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!(endpoint = %self.transport.endpoint(), state = %next, "Connection state changed");
        }
    }

    /// Move to `next` on behalf of the driver owning `token`.
    ///
    /// Returns `false`, writing nothing, once the token is cancelled.
    pub(crate) fn transition(&self, token: &CancellationToken, next: ConnectionState) -> bool {
        let mut control = self.control.lock();
        if token.is_cancelled() {
            return false;
        }
        if next != ConnectionState::Open {
            control.outbound = None;
        }
        self.set_state(next);
        true
    }

    /// Install the outbound queue and move to `Open`.
    pub(crate) fn mark_open(&self, token: &CancellationToken, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut control = self.control.lock();
        if token.is_cancelled() {
            return false;
        }
        control.outbound = Some(outbound);
        self.set_state(ConnectionState::Open);
        true
    }

    /// Decode one inbound message and fan it out.
    pub(crate) fn dispatch(&self, message: &InboundMessage) {
        let envelope = match Envelope::decode(message.as_bytes()) {
            Ok(envelope) => envelope,
            Err(e) => {
                Counters::bump(&self.counters.decode_errors, 1);
                warn!(error = %e, bytes = message.len(), "Dropping undecodable message");
                return;
            }
        };

        if envelope.is_inert() {
            trace!("Inert envelope");
        }

        let report = self.registry.deliver(&envelope);
        Counters::bump(&self.counters.envelopes_delivered, 1);
        if report.failed > 0 {
            Counters::bump(&self.counters.listener_failures, report.failed as u64);
        }
    }

    pub(crate) fn record_reconnect_attempt(&self) -> u64 {
        self.counters.reconnect_attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_sent(&self) {
        Counters::bump(&self.counters.messages_sent, 1);
    }

    pub(crate) fn record_dropped(&self) {
        Counters::bump(&self.counters.messages_dropped, 1);
    }

    /// Cancel the running driver and go to `Disconnected`.
    fn shutdown(&self) {
        let mut control = self.control.lock();
        if let Some(token) = control.cancel.take() {
            token.cancel();
        }
        control.outbound = None;
        self.set_state(ConnectionState::Disconnected);
    }
}

/// Closes the connection when the last manager handle goes away.
struct Owner<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Drop for Owner<T> {
    fn drop(&mut self) {
        debug!(endpoint = %self.shared.transport.endpoint(), "Dropping connection manager");
        self.shared.shutdown();
    }
}

/// Shared handle to the feed connection.
///
/// Cloning is cheap and every clone controls the same connection. When the last
/// clone is dropped the connection closes.
pub struct ConnectionManager<T: Transport> {
    owner: Arc<Owner<T>>,
}

impl<T: Transport> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self { owner: Arc::clone(&self.owner) }
    }
}

impl<T: Transport> fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.shared().transport.endpoint())
            .field("state", &self.state())
            .field("listeners", &self.shared().registry.len())
            .finish()
    }
}

impl ConnectionManager<WebSocketTransport> {
    /// Build a WebSocket-backed manager from configuration.
    ///
    /// Does not connect; call [`connect`](Self::connect).
    pub fn websocket(config: &FeedConfig) -> Result<Self> {
        config.validate()?;
        let transport = WebSocketTransport::new(config.endpoint.clone())?;
        Ok(Self::new(transport, config.reconnect_delay()))
    }
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager in the `Disconnected` state.
    pub fn new(transport: T, reconnect_delay: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            transport,
            reconnect_delay,
            registry: Arc::new(SubscriberRegistry::new()),
            control: Mutex::new(Control::default()),
            state,
            counters: Counters::default(),
        });
        Self { owner: Arc::new(Owner { shared }) }
    }

    fn shared(&self) -> &Arc<Shared<T>> {
        &self.owner.shared
    }

    /// Open the connection.
    ///
    /// Does nothing while `Open` or `Connecting`. While `Reconnecting` the
    /// pending retry is abandoned and a fresh attempt starts immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let shared = self.shared();
        let token = {
            let mut control = shared.control.lock();
            let state = *shared.state.borrow();
            if state.is_active() {
                debug!(%state, "connect() ignored, already active");
                return;
            }
            if let Some(previous) = control.cancel.take() {
                // Only a driver waiting out its reconnect delay can be left here.
                debug!("connect() during reconnect delay, retrying now");
                previous.cancel();
            }

            let token = CancellationToken::new();
            control.cancel = Some(token.clone());
            control.outbound = None;
            shared.set_state(ConnectionState::Connecting);
            token
        };

        info!(endpoint = %shared.transport.endpoint(), "Connecting");
        tokio::spawn(driver::run(Arc::clone(shared), token));
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn close(&self) {
        info!(endpoint = %self.shared().transport.endpoint(), "Closing connection");
        self.shared().shutdown();
    }

    /// Register a listener. Allowed in every state.
    pub fn add_listener(&self, handle: ListenerHandle) {
        self.shared().registry.add(handle);
    }

    /// Unregister every occurrence of a listener. Returns how many were removed.
    pub fn remove_listener(&self, handle: &ListenerHandle) -> usize {
        self.shared().registry.remove(handle)
    }

    /// Number of registered listener entries, duplicates included.
    pub fn listener_count(&self) -> usize {
        self.shared().registry.len()
    }

    /// Serialize `message` as JSON and send it on the open transport.
    ///
    /// Returns `false` and discards the message when the transport is not open.
    /// Nothing is queued for a later connection.
    pub fn send_message<M: Serialize + ?Sized>(&self, message: &M) -> bool {
        let shared = self.shared();
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                shared.record_dropped();
                warn!(error = %e, "Dropping outbound message that failed to serialize");
                return false;
            }
        };

        let control = shared.control.lock();
        let state = *shared.state.borrow();
        let queued = match (&control.outbound, state) {
            (Some(outbound), ConnectionState::Open) => outbound.send(text).is_ok(),
            _ => false,
        };
        drop(control);

        if !queued {
            shared.record_dropped();
            warn!(%state, "Transport not open, dropping outbound message");
        }
        queued
    }

    /// Mount a projector: wrap it in a listener, register it, and return the
    /// view handle. Dropping the handle unregisters the listener.
    pub fn mount<P: Projector>(&self, projector: P) -> MountedView<P> {
        MountedView::mount(Arc::clone(&self.shared().registry), projector)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared().state.borrow()
    }

    /// Receiver for connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared().state.subscribe()
    }

    /// Connection state as a stream, starting with the current state.
    pub fn state_updates(&self) -> WatchStream<ConnectionState> {
        WatchStream::new(self.subscribe_state())
    }

    /// Wait until the state equals `target`, up to `timeout`.
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> Result<()> {
        let mut states = self.subscribe_state();
        match tokio::time::timeout(timeout, states.wait_for(|state| *state == target)).await {
            Ok(Ok(_)) => Ok(()),
            // The sender lives in `Shared`, which `self` keeps alive.
            Ok(Err(_)) => Err(FeedError::not_connected("wait for connection state")),
            Err(_) => Err(FeedError::Timeout { duration: timeout }),
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> FeedStats {
        self.shared().counters.snapshot()
    }

    /// Endpoint of the underlying transport.
    pub fn endpoint(&self) -> &str {
        self.shared().transport.endpoint()
    }

    /// Configured delay between a close and the next attempt.
    pub fn reconnect_delay(&self) -> Duration {
        self.shared().reconnect_delay
    }
}
