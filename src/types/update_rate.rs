//! Update rate control for view streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a consumer wants to see view updates.
///
/// Frames can arrive at camera rate; a table that repaints at 2Hz is usually
/// enough for the statistics panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every change, as it is delivered.
    #[default]
    Native,

    /// At most this many updates per second, latest value wins.
    /// `Max(0)` is treated as `Native`.
    Max(u32),
}

impl UpdateRate {
    /// Minimum spacing between updates, `None` when unthrottled.
    pub fn interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
