//! WebSocket transport built on tokio-tungstenite

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};
use url::Url;

use crate::transport::{InboundMessage, Transport, TransportSession};
use crate::{FeedError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to a `ws://` or `wss://` endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    endpoint: String,
}

impl WebSocketTransport {
    /// Create a transport for `endpoint`.
    ///
    /// The URL is validated here so a typo fails fast instead of surfacing as an
    /// endless series of reconnect attempts.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        validate_endpoint(&endpoint)?;
        Ok(Self { endpoint })
    }
}

/// Check that `endpoint` is an absolute `ws`/`wss` URL with a host.
pub(crate) fn validate_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| FeedError::invalid_endpoint(endpoint, e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(FeedError::invalid_endpoint(
                endpoint,
                format!("unsupported scheme '{}', expected ws or wss", other),
            ));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(FeedError::invalid_endpoint(endpoint, "missing host"));
    }

    Ok(url)
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    type Session = WebSocketSession;

    async fn open(&self) -> Result<Self::Session> {
        debug!(endpoint = %self.endpoint, "Opening WebSocket");

        let (stream, response) = tokio_tungstenite::connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| {
                FeedError::connection_failed_with_source(&self.endpoint, "WebSocket handshake failed", Box::new(e))
            })?;

        info!(endpoint = %self.endpoint, status = %response.status(), "WebSocket open");
        Ok(WebSocketSession { stream, finished: false })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// An open WebSocket connection.
pub struct WebSocketSession {
    stream: WsStream,

    /// Set after a close frame or a fatal error; later reads report a close.
    finished: bool,
}

#[async_trait::async_trait]
impl TransportSession for WebSocketSession {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(InboundMessage::Text(text.to_string()))),
                Some(Ok(Message::Binary(data))) => return Ok(Some(InboundMessage::Binary(data.to_vec()))),
                // tungstenite answers pings itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                    trace!("Control frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Close frame received");
                    self.finished = true;
                    return Ok(None);
                }
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) | None => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    // A broken socket keeps failing; report once, then close.
                    self.finished = true;
                    return Err(FeedError::transport("WebSocket read failed", Box::new(e)));
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| FeedError::transport("WebSocket send failed", Box::new(e)))
    }

    async fn close(&mut self) -> Result<()> {
        self.finished = true;
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(FeedError::transport("WebSocket close failed", Box::new(e))),
        }
    }
}
