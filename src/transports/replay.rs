//! Replay transport for recorded feeds
//!
//! A capture is a JSON-lines file: one raw server message per line, exactly as it
//! arrived on the wire. Each session replays the capture from the start at a fixed
//! pace and closes at the end, so under the connection manager's reconnect policy
//! playback loops with the reconnect delay as the gap between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::transport::{InboundMessage, Transport, TransportSession};
use crate::{FeedError, Result};

/// Default pace between replayed messages (10 messages per second).
pub const DEFAULT_REPLAY_INTERVAL: Duration = Duration::from_millis(100);

/// Transport that replays a recorded capture.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    /// Non-empty capture lines
    messages: Arc<[String]>,

    /// Pace between messages
    pace: Duration,

    /// Shown as the endpoint in logs
    label: String,
}

impl ReplayTransport {
    /// Build from in-memory lines. Blank lines are skipped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages: Vec<String> =
            lines.into_iter().map(Into::into).filter(|line| !line.trim().is_empty()).collect();

        Self { messages: messages.into(), pace: DEFAULT_REPLAY_INTERVAL, label: "replay://memory".to_string() }
    }

    /// Load a JSON-lines capture from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| FeedError::file_error(PathBuf::from(path), e))?;

        let mut transport = Self::from_lines(contents.lines());
        transport.label = format!("replay://{}", path.display());
        info!(path = %path.display(), messages = transport.messages.len(), "Loaded feed capture");
        Ok(transport)
    }

    /// Set the pace between replayed messages. A zero pace replays as fast as
    /// the consumer reads.
    pub fn with_interval(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Number of messages one session replays.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait::async_trait]
impl Transport for ReplayTransport {
    type Session = ReplaySession;

    async fn open(&self) -> Result<Self::Session> {
        debug!(endpoint = %self.label, messages = self.messages.len(), "Starting replay");

        let pacing = (!self.pace.is_zero()).then(|| {
            let mut ticker = interval(self.pace);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        Ok(ReplaySession { messages: Arc::clone(&self.messages), position: 0, pacing, closed: false })
    }

    fn endpoint(&self) -> &str {
        &self.label
    }
}

/// One pass over a capture.
pub struct ReplaySession {
    messages: Arc<[String]>,
    position: usize,
    pacing: Option<Interval>,
    closed: bool,
}

#[async_trait::async_trait]
impl TransportSession for ReplaySession {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>> {
        if self.closed {
            return Ok(None);
        }

        let Some(message) = self.messages.get(self.position) else {
            debug!(replayed = self.position, "Replay finished");
            return Ok(None);
        };

        if let Some(pacing) = self.pacing.as_mut() {
            pacing.tick().await;
        }

        self.position += 1;
        trace!(position = self.position, bytes = message.len(), "Replaying message");
        Ok(Some(InboundMessage::Text(message.clone())))
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        // Nothing listens on the other end of a capture.
        trace!(bytes = text.len(), "Discarding message sent to replay");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
