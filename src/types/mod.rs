//! Core types for the live traffic feed.
//!
//! ## Data model
//!
//! - [`Envelope`] is one decoded server push: an optional [`EncodedFrame`] and/or an
//!   optional [`StatisticsSnapshot`]
//! - [`StatisticsSnapshot`] is the canonical form of the loosely-shaped `stats`
//!   payload, produced by a single normalization step
//! - [`RegionCode`] / [`RegionSet`] name the directional buckets a deployment reports
//! - [`VehicleClass`] / [`ClassCounts`] hold the per-class counts
//! - [`ConnectionState`] is the observable lifecycle of the shared connection
//!
//! ## Usage Example
//!
//! ```rust
//! use trafficwatch::types::{Envelope, RegionCode};
//!
//! let envelope = Envelope::decode(
//!     br#"{"stats":{"DirectionCounts":{"NE":{"Car":3,"Bus":1}},"TotalVehicles":4}}"#,
//! )
//! .unwrap();
//!
//! let stats = envelope.stats.unwrap();
//! assert_eq!(stats.region(RegionCode::NE).sum(), 4);
//! assert_eq!(stats.region(RegionCode::SW).sum(), 0);
//! ```

mod envelope;
mod region;
mod snapshot;
mod state;
mod update_rate;
mod vehicle;

pub use envelope::{EncodedFrame, Envelope};
pub use region::{RegionCode, RegionSet};
pub use snapshot::{PEAK_HOUR_UNKNOWN, StatisticsSnapshot, StatsShape};
pub use state::ConnectionState;
pub use update_rate::UpdateRate;
pub use vehicle::{ClassCounts, VehicleClass};
