//! Transport trait for message sources

use crate::Result;

/// One raw message read from a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl InboundMessage {
    /// Raw payload bytes, whatever the frame type.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            InboundMessage::Text(text) => text.as_bytes(),
            InboundMessage::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Factory for sessions to a single endpoint.
///
/// The connection manager calls [`Transport::open`] once per connection attempt:
/// on the first `connect()` and again for every scheduled reconnect. A transport
/// must therefore be reusable; all per-connection state lives in the session.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    type Session: TransportSession;

    /// Open a new session.
    ///
    /// An error here is treated as a failed attempt followed by a close, so the
    /// reconnection policy applies.
    async fn open(&self) -> Result<Self::Session>;

    /// Endpoint this transport connects to, for logging.
    fn endpoint(&self) -> &str;
}

/// One open connection.
#[async_trait::async_trait]
pub trait TransportSession: Send + 'static {
    /// Wait for the next inbound message
    ///
    /// Returns:
    /// - `Ok(Some(message))` - Message received
    /// - `Ok(None)` - Peer closed the session (normal termination)
    /// - `Err(e)` - Transport error; the session may still be usable
    async fn next_message(&mut self) -> Result<Option<InboundMessage>>;

    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the session. Errors are ignored by callers; the session is
    /// dropped afterwards either way.
    async fn close(&mut self) -> Result<()>;
}
