//! Connection lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the shared feed connection.
///
/// ```text
/// Disconnected --connect()--> Connecting --on open--> Open
/// Open --on close (not explicit)--> Reconnecting --timer fires--> Connecting
/// Open/Connecting/Reconnecting --close()--> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ConnectionState {
    /// Initial state, and the state after an explicit `close()`.
    #[default]
    Disconnected,
    /// Transport open in progress.
    Connecting,
    /// Transport open; envelopes are flowing.
    Open,
    /// Transport closed unexpectedly; a retry is scheduled.
    Reconnecting,
}

impl ConnectionState {
    /// `connect()` is a no-op in these states.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Connecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}
