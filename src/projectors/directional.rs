//! Directional-flow table projector

use serde::Serialize;

use super::Projector;
use crate::types::{ClassCounts, Envelope, PEAK_HOUR_UNKNOWN, RegionCode, RegionSet, StatisticsSnapshot};

/// One table row: the counts for a single region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FlowRow {
    pub region: RegionCode,
    pub cars: u64,
    pub buses: u64,
    pub trucks: u64,
    /// Sum of this row's three classes.
    pub total: u64,
}

impl FlowRow {
    fn new(region: RegionCode, counts: ClassCounts) -> Self {
        Self { region, cars: counts.car, buses: counts.bus, trucks: counts.truck, total: counts.sum() }
    }

    fn empty(region: RegionCode) -> Self {
        Self::new(region, ClassCounts::default())
    }
}

/// Per-region table plus the headline figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DirectionalFlowView {
    /// Exactly one row per configured region, in configured order.
    pub rows: Vec<FlowRow>,

    /// Server-reported snapshot total, independent of the rows.
    pub total_vehicles: u64,

    /// Configured regions whose row total is non-zero.
    pub active_regions: usize,

    pub avg_speed: f64,

    pub peak_hour: String,
}

impl DirectionalFlowView {
    /// All-zero table for `regions`.
    pub fn empty(regions: RegionSet) -> Self {
        Self {
            rows: regions.codes().iter().copied().map(FlowRow::empty).collect(),
            total_vehicles: 0,
            active_regions: 0,
            avg_speed: 0.0,
            peak_hour: PEAK_HOUR_UNKNOWN.to_string(),
        }
    }

    /// Build the table for `regions` from a snapshot. Regions the snapshot does
    /// not mention get a zero row.
    pub fn from_snapshot(regions: RegionSet, stats: &StatisticsSnapshot) -> Self {
        let rows: Vec<FlowRow> =
            regions.codes().iter().map(|&region| FlowRow::new(region, stats.region(region))).collect();
        let active_regions = rows.iter().filter(|row| row.total > 0).count();

        Self {
            rows,
            total_vehicles: stats.total_vehicles,
            active_regions,
            avg_speed: stats.avg_speed,
            peak_hour: stats.peak_hour_display().to_string(),
        }
    }

    pub fn row(&self, region: RegionCode) -> Option<&FlowRow> {
        self.rows.iter().find(|row| row.region == region)
    }
}

/// Projects per-region counts into a [`DirectionalFlowView`].
#[derive(Debug)]
pub struct DirectionalFlowProjector {
    regions: RegionSet,
    view: DirectionalFlowView,
}

impl DirectionalFlowProjector {
    pub fn new(regions: RegionSet) -> Self {
        Self { regions, view: DirectionalFlowView::empty(regions) }
    }

    pub fn regions(&self) -> RegionSet {
        self.regions
    }
}

impl Default for DirectionalFlowProjector {
    fn default() -> Self {
        Self::new(RegionSet::default())
    }
}

impl Projector for DirectionalFlowProjector {
    type View = DirectionalFlowView;

    fn apply(&mut self, envelope: &Envelope) -> bool {
        let Some(stats) = envelope.stats.as_deref() else {
            return false;
        };

        let next = DirectionalFlowView::from_snapshot(self.regions, stats);
        if next == self.view {
            return false;
        }
        self.view = next;
        true
    }

    fn view(&self) -> &DirectionalFlowView {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn envelope(stats: serde_json::Value) -> Envelope {
        Envelope::from_value(&json!({ "stats": stats })).unwrap()
    }

    #[test]
    fn nested_region_row_and_missing_region() {
        let mut projector = DirectionalFlowProjector::new(RegionSet::Full);
        projector.apply(&envelope(json!({
            "DirectionCounts": { "NE": { "Car": 3, "Bus": 1 } },
            "TotalVehicles": 4
        })));

        let view = projector.view();
        assert_eq!(view.rows.len(), 16);
        assert_eq!(
            view.row(RegionCode::NE),
            Some(&FlowRow { region: RegionCode::NE, cars: 3, buses: 1, trucks: 0, total: 4 })
        );
        assert_eq!(view.row(RegionCode::SW), Some(&FlowRow::empty(RegionCode::SW)));
        assert_eq!(view.active_regions, 1);
        assert_eq!(view.total_vehicles, 4);
    }

    #[test]
    fn rows_follow_configured_order() {
        let projector = DirectionalFlowProjector::new(RegionSet::Diagonal);
        let regions: Vec<RegionCode> = projector.view().rows.iter().map(|row| row.region).collect();
        assert_eq!(regions, RegionCode::DIAGONAL.to_vec());
    }

    #[test]
    fn diagonal_set_ignores_other_regions() {
        let mut projector = DirectionalFlowProjector::new(RegionSet::Diagonal);
        projector.apply(&envelope(json!({
            "N": { "Car": 10 },
            "SE": { "Truck": 2 },
            "TotalActiveVehicles": 50
        })));

        let view = projector.view();
        assert_eq!(view.rows.len(), 6);
        assert!(view.row(RegionCode::N).is_none());
        assert_eq!(view.row(RegionCode::SE).map(|row| row.total), Some(2));
        assert_eq!(view.active_regions, 1);
        assert_eq!(view.total_vehicles, 50);
    }

    #[test]
    fn total_is_not_recomputed_from_rows() {
        let mut projector = DirectionalFlowProjector::default();
        projector.apply(&envelope(json!({
            "RegionCounts": { "E": { "Car": 2 }, "W": { "Car": 2 } },
            "TotalVehicles": 1
        })));

        let view = projector.view();
        assert_eq!(view.rows.iter().map(|row| row.total).sum::<u64>(), 4);
        assert_eq!(view.total_vehicles, 1);
    }

    #[test]
    fn keeps_last_table_on_frame_only_envelope() {
        let mut projector = DirectionalFlowProjector::default();
        projector.apply(&envelope(json!({ "Regions": { "WE": { "Bus": 7 } } })));
        assert!(!projector.apply(&Envelope::decode(br#"{"frame":"AQID"}"#).unwrap()));
        assert_eq!(projector.view().row(RegionCode::WE).map(|row| row.buses), Some(7));
    }

    proptest! {
        #[test]
        fn every_configured_region_has_exactly_one_row(
            counts in prop::collection::btree_map(0usize..16, (0u64..1000, 0u64..1000, 0u64..1000), 0..16),
            diagonal in any::<bool>(),
        ) {
            let regions = if diagonal { RegionSet::Diagonal } else { RegionSet::Full };
            let mut container = serde_json::Map::new();
            for (index, (car, bus, truck)) in &counts {
                container.insert(
                    RegionCode::ALL[*index].as_str().to_string(),
                    json!({ "Car": car, "Bus": bus, "Truck": truck }),
                );
            }

            let mut projector = DirectionalFlowProjector::new(regions);
            projector.apply(&envelope(json!({ "DirectionCounts": container })));
            let view = projector.view();

            prop_assert_eq!(view.rows.len(), regions.codes().len());
            for (row, code) in view.rows.iter().zip(regions.codes()) {
                prop_assert_eq!(row.region, *code);
                prop_assert_eq!(row.total, row.cars + row.buses + row.trucks);
            }
            prop_assert_eq!(view.active_regions, view.rows.iter().filter(|row| row.total > 0).count());
        }
    }
}
