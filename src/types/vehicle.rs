//! Vehicle classes and per-class counts

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Vehicle class tracked by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum VehicleClass {
    Car,
    Bus,
    Truck,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 3] = [VehicleClass::Car, VehicleClass::Bus, VehicleClass::Truck];

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleClass::Car => "Car",
            VehicleClass::Bus => "Bus",
            VehicleClass::Truck => "Truck",
        }
    }
}

impl FromStr for VehicleClass {
    type Err = ();

    /// Accepts the wire names case-insensitively, plus plural forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" | "cars" => Ok(VehicleClass::Car),
            "bus" | "buses" => Ok(VehicleClass::Bus),
            "truck" | "trucks" => Ok(VehicleClass::Truck),
            _ => Err(()),
        }
    }
}

/// Counts for the three tracked classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ClassCounts {
    pub car: u64,
    pub bus: u64,
    pub truck: u64,
}

impl ClassCounts {
    pub fn new(car: u64, bus: u64, truck: u64) -> Self {
        Self { car, bus, truck }
    }

    pub fn get(&self, class: VehicleClass) -> u64 {
        match class {
            VehicleClass::Car => self.car,
            VehicleClass::Bus => self.bus,
            VehicleClass::Truck => self.truck,
        }
    }

    pub fn set(&mut self, class: VehicleClass, count: u64) {
        match class {
            VehicleClass::Car => self.car = count,
            VehicleClass::Bus => self.bus = count,
            VehicleClass::Truck => self.truck = count,
        }
    }

    /// Sum of the three classes. Only meaningful for a single region; the
    /// snapshot-wide total is reported separately by the server.
    pub fn sum(&self) -> u64 {
        self.car.saturating_add(self.bus).saturating_add(self.truck)
    }
}
