//! Named places for quick access buttons, tours and location rotation.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::error::{Error, Result};

/// A coordinate with a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedLocation {
    pub name: Cow<'static, str>,
    pub coordinate: Coordinate,
}

impl NamedLocation {
    pub fn new(name: impl Into<Cow<'static, str>>, coordinate: Coordinate) -> Self {
        Self {
            name: name.into(),
            coordinate,
        }
    }
}

/// A preset location addressable by key.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub key: &'static str,
    pub name: &'static str,
    pub coordinate: Coordinate,
}

impl Preset {
    pub fn location(&self) -> NamedLocation {
        NamedLocation::new(self.name, self.coordinate)
    }
}

/// World cities viewed from a regional altitude.
pub const PRESETS: &[Preset] = &[
    Preset {
        key: "ST_THOMAS",
        name: "St. Thomas",
        coordinate: Coordinate::new(44.9778, -93.2650).with_altitude(5_000.0),
    },
    Preset {
        key: "NEW_YORK",
        name: "New York",
        coordinate: Coordinate::new(40.7128, -74.0060).with_altitude(10_000.0),
    },
    Preset {
        key: "SAN_FRANCISCO",
        name: "San Francisco",
        coordinate: Coordinate::new(37.7749, -122.4194).with_altitude(8_000.0),
    },
    Preset {
        key: "LONDON",
        name: "London",
        coordinate: Coordinate::new(51.5074, -0.1278).with_altitude(12_000.0),
    },
    Preset {
        key: "TOKYO",
        name: "Tokyo",
        coordinate: Coordinate::new(35.6762, 139.6503).with_altitude(15_000.0),
    },
    Preset {
        key: "PARIS",
        name: "Paris",
        coordinate: Coordinate::new(48.8566, 2.3522).with_altitude(8_000.0),
    },
    Preset {
        key: "SYDNEY",
        name: "Sydney",
        coordinate: Coordinate::new(-33.8688, 151.2093).with_altitude(10_000.0),
    },
    Preset {
        key: "DUBAI",
        name: "Dubai",
        coordinate: Coordinate::new(25.2048, 55.2708).with_altitude(12_000.0),
    },
];

/// Street-level destinations offered as quick location buttons.
pub const QUICK_LOCATIONS: &[Preset] = &[
    Preset {
        key: "ST_THOMAS_UNIVERSITY",
        name: "St. Thomas University",
        coordinate: Coordinate::new(44.974_113_1, -93.277_537_9).with_altitude(400.0),
    },
    Preset {
        key: "3M",
        name: "3M",
        coordinate: Coordinate::new(44.951_072_5, -92.996_369_8).with_altitude(400.0),
    },
    Preset {
        key: "TARGET",
        name: "Target",
        coordinate: Coordinate::new(44.974_643_4, -93.275_260_8).with_altitude(400.0),
    },
];

/// Look up a preset by key (case-insensitive).
pub fn preset(key: &str) -> Result<&'static Preset> {
    PRESETS
        .iter()
        .chain(QUICK_LOCATIONS)
        .find(|preset| preset.key.eq_ignore_ascii_case(key))
        .ok_or_else(|| Error::UnknownLocation {
            key: key.to_string(),
        })
}

/// Build a multi-stop tour from preset keys, in order.
pub fn tour<S: AsRef<str>>(keys: &[S]) -> Result<Vec<Coordinate>> {
    keys.iter()
        .map(|key| preset(key.as_ref()).map(|preset| preset.coordinate))
        .collect()
}

/// All world presets as named locations, in table order.
pub fn world_locations() -> Vec<NamedLocation> {
    PRESETS.iter().map(Preset::location).collect()
}
