//! Statistics snapshot and stats-payload normalization.
//!
//! Deployments disagree on the layout of the `stats` object. Observed variants:
//!
//! ```text
//! // flat vehicle-type counts
//! { "ActiveVehicleCounts": { "Car": 5, "Bus": 0, "Truck": 2 }, "TotalActiveVehicles": 9 }
//! // legacy names
//! { "VehicleCounts": { "Car": 5 }, "TotalVehicles": 9 }
//! // nested by region under a container key
//! { "DirectionCounts": { "NE": { "Car": 3, "Bus": 1 } }, "TotalVehicles": 4 }
//! // region codes directly on the stats object
//! { "NE": { "Car": 3 }, "SW": { "Truck": 1 } }
//! ```
//!
//! [`StatisticsSnapshot::from_json`] classifies the payload into a [`StatsShape`] and
//! resolves every missing or malformed field to its documented default here, so
//! projectors never see raw JSON.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::region::RegionCode;
use super::vehicle::{ClassCounts, VehicleClass};
use crate::{FeedError, Result};

/// Keys holding the snapshot-wide per-class counts, in order of preference.
const VEHICLE_COUNT_KEYS: &[&str] = &["ActiveVehicleCounts", "VehicleCounts"];

/// Keys holding per-region counts, in order of preference.
const REGION_CONTAINER_KEYS: &[&str] = &["DirectionCounts", "RegionCounts", "Regions"];

/// Keys holding the authoritative total, in order of preference.
const TOTAL_KEYS: &[&str] = &["TotalActiveVehicles", "TotalVehicles"];

const AVG_SPEED_KEYS: &[&str] = &["AvgSpeed", "AverageSpeed"];

const PEAK_HOUR_KEYS: &[&str] = &["PeakHour"];

/// Placeholder shown when the server did not report a peak hour.
pub const PEAK_HOUR_UNKNOWN: &str = "N/A";

/// Layout the server used for a stats payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StatsShape {
    /// Only snapshot-wide vehicle-type counts.
    Flat,
    /// Only per-region counts.
    Nested,
    /// Both vehicle-type and per-region counts.
    Mixed,
    /// Neither; scalars only, or an empty object.
    #[default]
    Empty,
}

/// Canonical statistics snapshot.
///
/// A snapshot fully replaces its predecessor; nothing is merged across envelopes.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StatisticsSnapshot {
    /// Snapshot-wide per-class counts (zero when the server omitted them).
    pub vehicle_counts: ClassCounts,

    /// Per-region counts for the regions the server reported.
    pub regions: BTreeMap<RegionCode, ClassCounts>,

    /// Server-reported total. Independent of `vehicle_counts` and `regions`:
    /// the server may aggregate it over a different window.
    pub total_vehicles: u64,

    /// Average speed in km/h, 0 when absent.
    pub avg_speed: f64,

    /// Peak hour label, if reported.
    pub peak_hour: Option<String>,

    /// Layout the payload arrived in.
    pub shape: StatsShape,
}

impl StatisticsSnapshot {
    /// Normalize a raw `stats` value.
    ///
    /// Fails only when `stats` is not a JSON object. Individual fields never fail
    /// the snapshot; they fall back to their defaults.
    pub fn from_json(stats: &Value) -> Result<Self> {
        let object = stats.as_object().ok_or_else(|| {
            FeedError::decode("stats", format!("expected an object, found {}", json_kind(stats)))
        })?;

        let vehicle_counts = lookup_with(object, VEHICLE_COUNT_KEYS, Value::as_object);

        let mut regions = BTreeMap::new();
        if let Some(container) = lookup_with(object, REGION_CONTAINER_KEYS, Value::as_object) {
            collect_regions(container, &mut regions);
        }
        // Region codes placed directly on the stats object; the container wins on conflict.
        let mut flat_regions = BTreeMap::new();
        collect_regions(object, &mut flat_regions);
        for (code, counts) in flat_regions {
            regions.entry(code).or_insert(counts);
        }

        let shape = match (vehicle_counts.is_some(), !regions.is_empty()) {
            (true, true) => StatsShape::Mixed,
            (true, false) => StatsShape::Flat,
            (false, true) => StatsShape::Nested,
            (false, false) => StatsShape::Empty,
        };

        let snapshot = Self {
            vehicle_counts: vehicle_counts.map(class_counts).unwrap_or_default(),
            regions,
            total_vehicles: lookup_with(object, TOTAL_KEYS, parse_count).unwrap_or(0),
            avg_speed: lookup_with(object, AVG_SPEED_KEYS, parse_speed).unwrap_or(0.0),
            peak_hour: lookup_with(object, PEAK_HOUR_KEYS, label),
            shape,
        };

        trace!(
            shape = ?snapshot.shape,
            regions = snapshot.regions.len(),
            total = snapshot.total_vehicles,
            "Normalized stats snapshot"
        );

        Ok(snapshot)
    }

    /// Counts for `region`, all zero when the server did not report it.
    pub fn region(&self, region: RegionCode) -> ClassCounts {
        self.regions.get(&region).copied().unwrap_or_default()
    }

    /// Peak hour for display, `"N/A"` when absent.
    pub fn peak_hour_display(&self) -> &str {
        self.peak_hour.as_deref().unwrap_or(PEAK_HOUR_UNKNOWN)
    }
}

/// First matching key with a non-null value; exact names are tried before a
/// case-insensitive scan.
pub(crate) fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    lookup_with(object, keys, |value| (!value.is_null()).then_some(value))
}

/// First matching key whose value `usable` accepts. A current key holding an
/// unusable value falls through to the legacy names.
fn lookup_with<'a, T>(
    object: &'a Map<String, Value>,
    keys: &[&str],
    usable: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    keys.iter().filter_map(|key| object.get(*key)).find_map(&usable).or_else(|| {
        object
            .iter()
            .filter(|(name, _)| keys.iter().any(|key| key.eq_ignore_ascii_case(name)))
            .find_map(|(_, value)| usable(value))
    })
}

fn collect_regions(object: &Map<String, Value>, into: &mut BTreeMap<RegionCode, ClassCounts>) {
    for (key, value) in object {
        let Ok(code) = key.parse::<RegionCode>() else {
            continue;
        };
        match value.as_object() {
            Some(classes) => {
                into.insert(code, class_counts(classes));
            }
            None => debug!(region = %code, kind = json_kind(value), "Ignoring non-object region entry"),
        }
    }
}

fn class_counts(object: &Map<String, Value>) -> ClassCounts {
    let mut counts = ClassCounts::default();
    for (key, value) in object {
        if let Ok(class) = key.parse::<VehicleClass>() {
            counts.set(class, count(value));
        }
    }
    counts
}

/// Non-negative integer count. Floats are truncated, numeric strings are parsed,
/// anything else (including negatives) is 0.
fn count(value: &Value) -> u64 {
    parse_count(value).unwrap_or(0)
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(float_count)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().and_then(float_count))
        }
        _ => None,
    }
}

fn float_count(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0).then(|| f.trunc() as u64)
}

fn parse_speed(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    raw.filter(|f| f.is_finite())
}

fn label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn flat_shape_keeps_server_total() {
        let stats = json!({
            "ActiveVehicleCounts": { "Car": 5, "Bus": 0, "Truck": 2 },
            "TotalActiveVehicles": 9
        });
        let snapshot = StatisticsSnapshot::from_json(&stats).unwrap();

        assert_eq!(snapshot.shape, StatsShape::Flat);
        assert_eq!(snapshot.vehicle_counts, ClassCounts::new(5, 0, 2));
        assert_eq!(snapshot.total_vehicles, 9);
        assert_eq!(snapshot.avg_speed, 0.0);
        assert_eq!(snapshot.peak_hour_display(), "N/A");
    }

    #[test]
    fn legacy_names_are_accepted() {
        let stats = json!({ "VehicleCounts": { "Car": 1, "Truck": 4 }, "TotalVehicles": 12 });
        let snapshot = StatisticsSnapshot::from_json(&stats).unwrap();

        assert_eq!(snapshot.vehicle_counts, ClassCounts::new(1, 0, 4));
        assert_eq!(snapshot.total_vehicles, 12);
    }

    #[test]
    fn current_names_win_over_legacy() {
        let stats = json!({
            "VehicleCounts": { "Car": 100 },
            "ActiveVehicleCounts": { "Car": 1 },
            "TotalVehicles": 100,
            "TotalActiveVehicles": 1
        });
        let snapshot = StatisticsSnapshot::from_json(&stats).unwrap();

        assert_eq!(snapshot.vehicle_counts.car, 1);
        assert_eq!(snapshot.total_vehicles, 1);
    }

    #[test]
    fn null_current_names_fall_back_to_legacy() {
        let stats = json!({
            "TotalActiveVehicles": null,
            "TotalVehicles": 9,
            "ActiveVehicleCounts": null,
            "VehicleCounts": { "Car": 4 },
            "AvgSpeed": "fast",
            "AverageSpeed": 33.5
        });
        let snapshot = StatisticsSnapshot::from_json(&stats).unwrap();

        assert_eq!(snapshot.shape, StatsShape::Flat);
        assert_eq!(snapshot.total_vehicles, 9);
        assert_eq!(snapshot.vehicle_counts.car, 4);
        assert_eq!(snapshot.avg_speed, 33.5);
    }

    #[test]
    fn nested_regions_under_container() {
        let stats = json!({ "DirectionCounts": { "NE": { "Car": 3, "Bus": 1 }, "XX": { "Car": 9 } } });
        let snapshot = StatisticsSnapshot::from_json(&stats).unwrap();

        assert_eq!(snapshot.shape, StatsShape::Nested);
        assert_eq!(snapshot.region(RegionCode::NE), ClassCounts::new(3, 1, 0));
        assert_eq!(snapshot.region(RegionCode::SW), ClassCounts::default());
        assert_eq!(snapshot.regions.len(), 1);
    }

    #[test]
    fn flat_by_direction_regions() {
        let stats = json!({ "ne": { "cars": 2 }, "SW": { "Truck": 1 }, "N": 7, "AvgSpeed": "41.5" });
        let snapshot = StatisticsSnapshot::from_json(&stats).unwrap();

        assert_eq!(snapshot.shape, StatsShape::Nested);
        assert_eq!(snapshot.region(RegionCode::NE).car, 2);
        assert_eq!(snapshot.region(RegionCode::SW).truck, 1);
        // Scalar region entries carry no class breakdown and are skipped.
        assert!(!snapshot.regions.contains_key(&RegionCode::N));
        assert_eq!(snapshot.avg_speed, 41.5);
    }

    #[test]
    fn mixed_shape_and_container_precedence() {
        let stats = json!({
            "ActiveVehicleCounts": { "Car": 1 },
            "RegionCounts": { "E": { "Bus": 2 } },
            "E": { "Bus": 50 },
            "PeakHour": "17:00"
        });
        let snapshot = StatisticsSnapshot::from_json(&stats).unwrap();

        assert_eq!(snapshot.shape, StatsShape::Mixed);
        assert_eq!(snapshot.region(RegionCode::E).bus, 2);
        assert_eq!(snapshot.peak_hour_display(), "17:00");
    }

    #[test]
    fn malformed_counts_default_to_zero() {
        let stats = json!({
            "ActiveVehicleCounts": { "Car": -4, "Bus": "7", "Truck": 2.9 },
            "TotalActiveVehicles": "n/a",
            "AvgSpeed": null
        });
        let snapshot = StatisticsSnapshot::from_json(&stats).unwrap();

        assert_eq!(snapshot.vehicle_counts, ClassCounts::new(0, 7, 2));
        assert_eq!(snapshot.total_vehicles, 0);
        assert_eq!(snapshot.avg_speed, 0.0);
    }

    #[test]
    fn empty_object_is_empty_shape() {
        let snapshot = StatisticsSnapshot::from_json(&json!({})).unwrap();
        assert_eq!(snapshot.shape, StatsShape::Empty);
        assert_eq!(snapshot, StatisticsSnapshot::default());
    }

    #[test]
    fn non_object_stats_is_rejected() {
        let err = StatisticsSnapshot::from_json(&json!([1, 2, 3])).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    proptest! {
        #[test]
        fn reported_regions_survive_normalization(
            entries in prop::collection::btree_map(
                prop::sample::select(RegionCode::ALL.to_vec()),
                (0u64..10_000, 0u64..10_000, 0u64..10_000),
                0..16
            )
        ) {
            let mut container = Map::new();
            for (code, (car, bus, truck)) in &entries {
                container.insert(code.to_string(), json!({ "Car": car, "Bus": bus, "Truck": truck }));
            }
            let stats = json!({ "DirectionCounts": Value::Object(container) });
            let snapshot = StatisticsSnapshot::from_json(&stats).unwrap();

            for code in RegionCode::ALL {
                let expected = entries
                    .get(&code)
                    .map(|(car, bus, truck)| ClassCounts::new(*car, *bus, *truck))
                    .unwrap_or_default();
                prop_assert_eq!(snapshot.region(code), expected);
            }
        }

        #[test]
        fn arbitrary_scalars_never_fail_an_object(key in "[A-Za-z]{1,20}", n in any::<i64>(), s in ".*") {
            let stats = json!({ key.clone(): n, "TotalVehicles": s, "VehicleCounts": { key: n } });
            prop_assert!(StatisticsSnapshot::from_json(&stats).is_ok());
        }
    }
}
