//! Launch parameter parsing for the viewer.
//!
//! On native, parameters are parsed from command-line arguments using clap.
//! On WASM, defaults are used (CLI argument parsing is not available).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use bevy::prelude::*;
use globe_flight::{AnimationOptions, Coordinate, DEFAULT_DURATION_MS, Error, Result};
use serde::Deserialize;

/// Default starting latitude (St. Thomas, Minneapolis).
const DEFAULT_LAT: f64 = 44.9778;
/// Default starting longitude (St. Thomas, Minneapolis).
const DEFAULT_LON: f64 = -93.2650;
/// Default starting altitude in meters.
const DEFAULT_ALTITUDE: f64 = 2.0;
/// Cesium ion asset serving Google Photorealistic 3D Tiles.
const DEFAULT_ION_ASSET_ID: u64 = 2_275_207;
/// Default interval between tile source rotations.
const DEFAULT_ROTATION_INTERVAL_MS: u64 = 5000;

/// Which viewer to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(not(target_family = "wasm"), derive(clap::ValueEnum))]
pub enum ViewerVariant {
    /// Photorealistic globe with scripted flights and quick locations.
    #[default]
    Photorealistic,
    /// Tile source that cycles through world locations on a timer.
    Tiles,
}

impl fmt::Display for ViewerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerVariant::Photorealistic => write!(f, "photorealistic"),
            ViewerVariant::Tiles => write!(f, "tiles"),
        }
    }
}

/// Launch parameters for the viewer.
#[derive(Resource, Debug, Clone)]
pub struct LaunchParams {
    /// Starting latitude in degrees.
    pub lat: f64,
    /// Starting longitude in degrees.
    pub lon: f64,
    /// Starting altitude above the ellipsoid in meters.
    pub altitude: f64,
    pub variant: ViewerVariant,
    /// Access token handed to the tile source.
    pub ion_token: Option<String>,
    pub ion_asset_id: u64,
    /// JSON tour to fly once the viewer is ready.
    pub tour: Option<PathBuf>,
    pub rotation_interval_ms: u64,
    /// Per-leg duration for flights that do not set their own.
    pub flight_duration_ms: u64,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            lat: DEFAULT_LAT,
            lon: DEFAULT_LON,
            altitude: DEFAULT_ALTITUDE,
            variant: ViewerVariant::default(),
            ion_token: None,
            ion_asset_id: DEFAULT_ION_ASSET_ID,
            tour: None,
            rotation_interval_ms: DEFAULT_ROTATION_INTERVAL_MS,
            flight_duration_ms: DEFAULT_DURATION_MS,
        }
    }
}

impl LaunchParams {
    /// Where the camera starts.
    pub fn start(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon).with_altitude(self.altitude)
    }

    /// Options for flights triggered without explicit options.
    pub fn animation_options(&self) -> AnimationOptions {
        AnimationOptions::default().with_duration_ms(self.flight_duration_ms)
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_millis(self.rotation_interval_ms)
    }

    /// Check everything the bootstrap depends on.
    pub fn validate(&self) -> Result<()> {
        self.start().validated().map_err(|e| Error::Initialization {
            detail: format!("start position: {e}"),
        })?;
        if self.variant == ViewerVariant::Tiles && self.rotation_interval_ms == 0 {
            return Err(Error::Initialization {
                detail: "rotation interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Read the tour file, if one was given.
    pub fn load_tour(&self) -> Result<Option<Tour>> {
        let Some(path) = &self.tour else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path).map_err(|e| Error::Initialization {
            detail: format!("reading tour {}: {e}", path.display()),
        })?;
        Tour::from_json(&text)
            .map(Some)
            .map_err(|e| Error::Initialization {
                detail: format!("tour {}: {e}", path.display()),
            })
    }
}

/// A scripted flight loaded from JSON.
///
/// ```json
/// { "options": { "duration_ms": 3000 }, "stops": [{ "latitude": 51.5, "longitude": -0.12 }] }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Tour {
    /// Options for the whole tour; omitted fields use the defaults.
    #[serde(default)]
    pub options: Option<AnimationOptions>,
    pub stops: Vec<Coordinate>,
}

impl Tour {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Initialization {
            detail: e.to_string(),
        })
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    #[command(about = "3D globe viewer with scripted camera flights")]
    struct CliArgs {
        /// Starting latitude in degrees.
        #[arg(long, default_value_t = DEFAULT_LAT, allow_negative_numbers = true)]
        lat: f64,

        /// Starting longitude in degrees.
        #[arg(long, default_value_t = DEFAULT_LON, allow_negative_numbers = true)]
        lon: f64,

        /// Starting altitude above the ellipsoid in meters.
        #[arg(long, default_value_t = DEFAULT_ALTITUDE)]
        altitude: f64,

        /// Which viewer to run.
        #[arg(long, value_enum, default_value_t = ViewerVariant::default())]
        variant: ViewerVariant,

        /// Cesium ion access token for the tile source.
        #[arg(long, env = "CESIUM_ION_ACCESS_TOKEN", hide_env_values = true)]
        ion_token: Option<String>,

        /// Cesium ion asset to stream.
        #[arg(long, default_value_t = DEFAULT_ION_ASSET_ID)]
        ion_asset_id: u64,

        /// JSON tour to fly once the viewer is ready.
        #[arg(long)]
        tour: Option<PathBuf>,

        /// Milliseconds between tile source rotations (tiles variant).
        #[arg(long, default_value_t = DEFAULT_ROTATION_INTERVAL_MS)]
        rotation_interval_ms: u64,

        /// Default per-leg flight duration in milliseconds.
        #[arg(long, default_value_t = DEFAULT_DURATION_MS)]
        flight_duration_ms: u64,
    }

    pub fn parse() -> LaunchParams {
        let args = CliArgs::parse();
        LaunchParams {
            lat: args.lat,
            lon: args.lon,
            altitude: args.altitude,
            variant: args.variant,
            ion_token: args.ion_token,
            ion_asset_id: args.ion_asset_id,
            tour: args.tour,
            rotation_interval_ms: args.rotation_interval_ms,
            flight_duration_ms: args.flight_duration_ms,
        }
    }
}

/// Parse launch parameters from CLI args (native) or use defaults (WASM).
pub fn parse() -> LaunchParams {
    #[cfg(not(target_family = "wasm"))]
    {
        native::parse()
    }
    #[cfg(target_family = "wasm")]
    {
        LaunchParams::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = LaunchParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.start().altitude, Some(2.0));
        assert_eq!(params.animation_options().duration_ms, 2000);
        assert_eq!(params.rotation_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_start_rejected() {
        let params = LaunchParams {
            lat: 123.0,
            ..LaunchParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(Error::Initialization { .. })
        ));
    }

    #[test]
    fn test_zero_rotation_interval_rejected_for_tiles() {
        let params = LaunchParams {
            variant: ViewerVariant::Tiles,
            rotation_interval_ms: 0,
            ..LaunchParams::default()
        };
        assert!(params.validate().is_err());

        let params = LaunchParams {
            rotation_interval_ms: 0,
            ..LaunchParams::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_tour_from_json() {
        let tour = Tour::from_json(
            r#"{
                "options": { "duration_ms": 3000, "orbit": "every-leg" },
                "stops": [
                    { "latitude": 51.5074, "longitude": -0.1278 },
                    { "latitude": 48.8566, "longitude": 2.3522, "altitude": 800 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(tour.stops.len(), 2);
        assert_eq!(tour.stops[0].altitude, None);
        assert_eq!(tour.stops[1].altitude, Some(800.0));
        let options = tour.options.unwrap();
        assert_eq!(options.duration_ms, 3000);
        assert_eq!(options.orbit, globe_flight::OrbitPolicy::EveryLeg);
    }

    #[test]
    fn test_tour_without_options() {
        let tour = Tour::from_json(r#"{ "stops": [] }"#).unwrap();
        assert!(tour.options.is_none());
        assert!(tour.stops.is_empty());
    }

    #[test]
    fn test_missing_tour_file() {
        let params = LaunchParams {
            tour: Some(PathBuf::from("/nonexistent/tour.json")),
            ..LaunchParams::default()
        };
        assert!(matches!(
            params.load_tour(),
            Err(Error::Initialization { .. })
        ));
    }
}
