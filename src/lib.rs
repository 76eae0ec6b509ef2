//! Shared live-feed client for traffic monitoring dashboards.
//!
//! Trafficwatch holds one persistent connection to a traffic-camera feed server
//! and fans every decoded message out to any number of dashboard panels. Panels
//! never open their own connection; they subscribe to the shared one and keep
//! their last-known values while it reconnects.
//!
//! # Features
//!
//! - **One connection, many consumers**: [`ConnectionManager`] is a cloneable handle
//!   with ordered, panic-isolated fan-out
//! - **Fixed-delay reconnect**: every unexpected close schedules exactly one retry;
//!   `close()` cancels it
//! - **Tolerant decoding**: flat, region-nested and mixed `stats` payloads normalize
//!   into one [`StatisticsSnapshot`]; a bad field never drops the whole message
//! - **Ready-made panels**: vehicle-type, directional-flow and video frame
//!   [projectors](projectors), mountable with RAII unmount
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trafficwatch::{Dashboard, FeedConfig, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> trafficwatch::Result<()> {
//!     let config = FeedConfig::from_env()?;
//!     trafficwatch::logging::init_tracing(&config.log_filter);
//!
//!     let dashboard = Dashboard::connect(&config)?;
//!     if let Some(panel) = dashboard.vehicles() {
//!         let mut updates = panel.updates(UpdateRate::Max(4));
//!         while let Some(view) = updates.next().await {
//!             println!("{} vehicles, {} cars", view.total_active_vehicles, view.counts.car);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Custom listeners
//!
//! ```rust,no_run
//! use trafficwatch::{ConnectionManager, Envelope, FeedConfig, ListenerHandle};
//!
//! # fn run() -> trafficwatch::Result<()> {
//! let manager = ConnectionManager::websocket(&FeedConfig::new("ws://localhost:8080"))?;
//! let listener = ListenerHandle::new(|envelope: &Envelope| {
//!     if let Some(stats) = &envelope.stats {
//!         println!("total: {}", stats.total_vehicles);
//!     }
//! });
//! manager.add_listener(listener.clone());
//! manager.connect();
//! // ...
//! manager.remove_listener(&listener);
//! manager.close();
//! # Ok(())
//! # }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod logging;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

// Connection and transports
pub mod connection;
pub mod transport;
pub mod transports;

// Consumers
pub mod dashboard;
pub mod projectors;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

pub use config::FeedConfig;
pub use connection::{ConnectionManager, DEFAULT_RECONNECT_DELAY, FeedStats};
pub use dashboard::Dashboard;
pub use projectors::{
    DirectionalFlowProjector, DirectionalFlowView, FlowRow, FrameProjector, FrameView, ImageDecoder, JpegDecoder,
    MountedView, PixelSurface, Projector, VehicleTypeProjector, VehicleTypeView,
};
pub use registry::{DeliveryReport, Listener, ListenerHandle, SubscriberRegistry};
pub use transport::{InboundMessage, Transport, TransportSession};
pub use transports::{ReplayTransport, WebSocketTransport};
