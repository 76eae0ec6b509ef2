//! Directional region codes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compass/directional identifier used to bucket per-region vehicle counts.
///
/// Single-letter codes are compass quadrants; two-letter codes are either
/// diagonals (`NE`) or flows from one side to another (`EW` = east to west).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum RegionCode {
    N,
    S,
    W,
    E,
    NE,
    NW,
    NS,
    SN,
    SE,
    SW,
    EN,
    ES,
    EW,
    WN,
    WE,
    WS,
}

impl RegionCode {
    /// All 16 codes in dashboard display order.
    pub const ALL: [RegionCode; 16] = [
        RegionCode::N,
        RegionCode::S,
        RegionCode::W,
        RegionCode::E,
        RegionCode::NE,
        RegionCode::NW,
        RegionCode::NS,
        RegionCode::SN,
        RegionCode::SE,
        RegionCode::SW,
        RegionCode::EN,
        RegionCode::ES,
        RegionCode::EW,
        RegionCode::WN,
        RegionCode::WE,
        RegionCode::WS,
    ];

    /// Reduced deployment: the four diagonals plus the two lateral flows.
    pub const DIAGONAL: [RegionCode; 6] = [
        RegionCode::NE,
        RegionCode::NW,
        RegionCode::SE,
        RegionCode::SW,
        RegionCode::EW,
        RegionCode::WE,
    ];

    /// Wire form of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            RegionCode::N => "N",
            RegionCode::S => "S",
            RegionCode::W => "W",
            RegionCode::E => "E",
            RegionCode::NE => "NE",
            RegionCode::NW => "NW",
            RegionCode::NS => "NS",
            RegionCode::SN => "SN",
            RegionCode::SE => "SE",
            RegionCode::SW => "SW",
            RegionCode::EN => "EN",
            RegionCode::ES => "ES",
            RegionCode::EW => "EW",
            RegionCode::WN => "WN",
            RegionCode::WE => "WE",
            RegionCode::WS => "WS",
        }
    }

    /// Human-readable label for table rows.
    pub fn label(self) -> &'static str {
        match self {
            RegionCode::N => "North",
            RegionCode::S => "South",
            RegionCode::W => "West",
            RegionCode::E => "East",
            RegionCode::NE => "North East",
            RegionCode::NW => "North West",
            RegionCode::NS => "North-South",
            RegionCode::SN => "South-North",
            RegionCode::SE => "South East",
            RegionCode::SW => "South West",
            RegionCode::EN => "East-North",
            RegionCode::ES => "East-South",
            RegionCode::EW => "East-West",
            RegionCode::WN => "West-North",
            RegionCode::WE => "West-East",
            RegionCode::WS => "West-South",
        }
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionCode {
    type Err = ();

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        RegionCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or(())
    }
}

/// Which region codes a deployment reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum RegionSet {
    /// All 16 directional codes.
    #[default]
    Full,
    /// The 6 diagonal/lateral codes.
    Diagonal,
}

impl RegionSet {
    /// Codes in display order.
    pub fn codes(self) -> &'static [RegionCode] {
        match self {
            RegionSet::Full => &RegionCode::ALL,
            RegionSet::Diagonal => &RegionCode::DIAGONAL,
        }
    }
}

impl FromStr for RegionSet {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "16" => Ok(RegionSet::Full),
            "diagonal" | "reduced" | "6" => Ok(RegionSet::Diagonal),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_code() {
        for code in RegionCode::ALL {
            assert_eq!(code.as_str().parse::<RegionCode>(), Ok(code));
            assert_eq!(code.as_str().to_lowercase().parse::<RegionCode>(), Ok(code));
        }
        assert_eq!(" sw ".parse::<RegionCode>(), Ok(RegionCode::SW));
        assert!("NNE".parse::<RegionCode>().is_err());
        assert!("".parse::<RegionCode>().is_err());
    }

    #[test]
    fn region_sets_have_expected_sizes() {
        assert_eq!(RegionSet::Full.codes().len(), 16);
        assert_eq!(RegionSet::Diagonal.codes().len(), 6);
        assert!(RegionSet::Diagonal.codes().iter().all(|c| RegionSet::Full.codes().contains(c)));
    }

    #[test]
    fn region_set_parses_aliases() {
        assert_eq!("Full".parse::<RegionSet>(), Ok(RegionSet::Full));
        assert_eq!("reduced".parse::<RegionSet>(), Ok(RegionSet::Diagonal));
        assert!("compass".parse::<RegionSet>().is_err());
    }
}
