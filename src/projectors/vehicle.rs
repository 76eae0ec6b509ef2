//! Vehicle-type panel projector

use serde::Serialize;

use super::Projector;
use crate::types::{ClassCounts, Envelope, PEAK_HOUR_UNKNOWN, StatisticsSnapshot};

/// Snapshot-wide counts per vehicle class plus the headline figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct VehicleTypeView {
    pub counts: ClassCounts,

    /// Server-reported total. Deliberately not `counts.sum()`.
    pub total_active_vehicles: u64,

    pub avg_speed: f64,

    pub peak_hour: String,
}

impl Default for VehicleTypeView {
    fn default() -> Self {
        Self {
            counts: ClassCounts::default(),
            total_active_vehicles: 0,
            avg_speed: 0.0,
            peak_hour: PEAK_HOUR_UNKNOWN.to_string(),
        }
    }
}

impl VehicleTypeView {
    pub fn from_snapshot(stats: &StatisticsSnapshot) -> Self {
        Self {
            counts: stats.vehicle_counts,
            total_active_vehicles: stats.total_vehicles,
            avg_speed: stats.avg_speed,
            peak_hour: stats.peak_hour_display().to_string(),
        }
    }
}

/// Projects `ActiveVehicleCounts` / `TotalActiveVehicles` into a [`VehicleTypeView`].
#[derive(Debug, Default)]
pub struct VehicleTypeProjector {
    view: VehicleTypeView,
}

impl VehicleTypeProjector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Projector for VehicleTypeProjector {
    type View = VehicleTypeView;

    fn apply(&mut self, envelope: &Envelope) -> bool {
        let Some(stats) = envelope.stats.as_deref() else {
            return false;
        };

        let next = VehicleTypeView::from_snapshot(stats);
        if next == self.view {
            return false;
        }
        self.view = next;
        true
    }

    fn view(&self) -> &VehicleTypeView {
        &self.view
    }
}
