//! Error types for the live feed client.
//!
//! Every fallible operation in trafficwatch returns [`FeedError`]. Errors carry
//! structured context and can be classified for retry:
//!
//! ```rust
//! use trafficwatch::FeedError;
//!
//! let error = FeedError::connection_failed("ws://localhost:8080", "connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```
//!
//! ## Error Categories
//!
//! - **Connection / Transport**: the endpoint could not be reached or the link dropped
//! - **Decode**: an inbound message was not a valid envelope
//! - **Frame decode**: the image codec rejected a frame's bytes
//! - **Config / InvalidEndpoint / File**: setup problems detected before connecting
//! - **NotConnected / Timeout**: caller-facing lifecycle failures
//!
//! Note that the connection manager never returns transport, decode or send errors to
//! its listeners. Those are reported through `tracing` where they occur; `FeedError`
//! surfaces only on explicit setup calls and on the transport trait boundary.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for feed operations.
pub type Result<T, E = FeedError> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for feed operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FeedError {
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connection {
        endpoint: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Frame decode failed: {details}")]
    FrameDecode { details: String },

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot {operation}: transport is not open")]
    NotConnected { operation: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl FeedError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Connection { .. } => true,
            FeedError::Transport { .. } => true,
            FeedError::NotConnected { .. } => true,
            FeedError::Timeout { .. } => true,
            FeedError::Decode { .. } => false,
            FeedError::FrameDecode { .. } => false,
            FeedError::InvalidEndpoint { .. } => false,
            FeedError::Config { .. } => false,
            FeedError::File { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            FeedError::Connection { .. } => vec![
                "Check that the traffic feed server is running",
                "Verify the endpoint host and port",
                "Wait for the automatic reconnection attempt",
            ],
            FeedError::Transport { .. } => vec![
                "Check network connectivity to the feed server",
                "Wait for the automatic reconnection attempt",
            ],
            FeedError::Decode { .. } => vec![
                "Check that the server sends JSON envelopes",
                "Compare the payload against the known stats variants",
            ],
            FeedError::FrameDecode { .. } => vec![
                "Verify the server encodes frames as base64 JPEG",
                "Inspect the frame bytes for truncation",
            ],
            FeedError::InvalidEndpoint { .. } => vec![
                "Use a ws:// or wss:// URL",
                "Include host and port, e.g. ws://localhost:8080",
            ],
            FeedError::Config { .. } => vec![
                "Review the configuration file or TRAFFICWATCH_ environment variables",
                "Remove the offending key to fall back to its default",
            ],
            FeedError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            FeedError::NotConnected { .. } => vec![
                "Call connect() before sending",
                "Wait for the connection state to become Open",
            ],
            FeedError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Check that the feed server is responding",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        FeedError::Connection { endpoint: endpoint.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        endpoint: impl Into<String>,
        reason: impl Into<String>,
        source: BoxError,
    ) -> Self {
        FeedError::Connection { endpoint: endpoint.into(), reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport(reason: impl Into<String>, source: BoxError) -> Self {
        FeedError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for decode errors.
    pub fn decode(context: impl Into<String>, details: impl Into<String>) -> Self {
        FeedError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for frame decode errors.
    pub fn frame_decode(details: impl Into<String>) -> Self {
        FeedError::FrameDecode { details: details.into() }
    }

    /// Helper constructor for invalid endpoint errors.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        FeedError::InvalidEndpoint { endpoint: endpoint.into(), reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        FeedError::Config { reason: reason.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        FeedError::File { path, source }
    }

    /// Helper constructor for not-connected errors.
    pub fn not_connected(operation: impl Into<String>) -> Self {
        FeedError::NotConnected { operation: operation.into() }
    }
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        FeedError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Decode { context: "JSON".to_string(), details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                endpoint in "ws://[a-z]{1,12}:[0-9]{2,5}",
                reason in ".*",
                details in ".*",
                millis in 1u64..60_000u64
            ) {
                let connection = FeedError::connection_failed(endpoint.clone(), reason.clone());
                let decode = FeedError::decode("envelope", details.clone());
                let timeout = FeedError::Timeout { duration: Duration::from_millis(millis) };

                let connection_msg = connection.to_string();
                prop_assert!(connection_msg.contains(&endpoint));
                prop_assert!(connection_msg.contains(&reason));
                prop_assert!(decode.to_string().contains(&details));
                prop_assert!(!timeout.to_string().is_empty());
            }

            #[test]
            fn source_chain_reaches_the_root_cause(
                base_message in "[a-z ]{1,40}",
                layers in 1usize..5usize
            ) {
                let mut current: BoxError = Box::new(std::io::Error::other(base_message.clone()));
                for i in 0..layers {
                    current = Box::new(FeedError::transport(format!("layer {}", i), current));
                }

                let mut depth = 0;
                let mut found = false;
                let mut cursor = std::error::Error::source(current.as_ref());
                while let Some(source) = cursor {
                    depth += 1;
                    if source.to_string().contains(&base_message) {
                        found = true;
                    }
                    cursor = std::error::Error::source(source);
                }

                prop_assert_eq!(depth, layers);
                prop_assert!(found);
            }
        }
    }

    #[test]
    fn retry_classification() {
        assert!(FeedError::connection_failed("ws://x:1", "refused").is_retryable());
        assert!(FeedError::not_connected("send").is_retryable());
        assert!(!FeedError::decode("envelope", "bad json").is_retryable());
        assert!(!FeedError::invalid_endpoint("http://x", "bad scheme").is_retryable());
        assert!(!FeedError::config("reconnect_delay_ms must be positive").is_retryable());
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = vec![
            FeedError::connection_failed("ws://x:1", "refused"),
            FeedError::transport("reset", Box::new(std::io::Error::other("reset"))),
            FeedError::decode("envelope", "eof"),
            FeedError::frame_decode("truncated"),
            FeedError::invalid_endpoint("x", "relative URL"),
            FeedError::config("bad"),
            FeedError::file_error(PathBuf::from("/tmp/x"), std::io::Error::other("gone")),
            FeedError::not_connected("send"),
            FeedError::Timeout { duration: Duration::from_secs(1) },
        ];

        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "no suggestions for {:?}", error);
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn from_conversions_work() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "capture.jsonl");
        match FeedError::from(io_err) {
            FeedError::File { source, .. } => assert_eq!(source.to_string(), "capture.jsonl"),
            other => panic!("Expected File error, got {:?}", other),
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(FeedError::from(json_err), FeedError::Decode { .. }));
    }

    #[test]
    fn error_is_send_sync_static() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<FeedError>();
    }
}
