//! Transport implementations

pub mod replay;
pub mod websocket;

pub use replay::{ReplaySession, ReplayTransport};
pub use websocket::{WebSocketSession, WebSocketTransport};
