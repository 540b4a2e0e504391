//! Geographic coordinates and their conversion to Earth-fixed positions.
//!
//! Positions use the WGS84 ellipsoid and ECEF axes: X through the prime
//! meridian at the equator, Z through the north pole. Units are meters.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Altitude in meters used when a coordinate does not carry one.
pub const DEFAULT_ALTITUDE: f64 = 100.0;

/// WGS84 semi-major axis in meters.
pub const WGS84_SEMI_MAJOR: f64 = 6_378_137.0;
/// WGS84 semi-minor axis in meters.
pub const WGS84_SEMI_MINOR: f64 = 6_356_752.314_245;
/// WGS84 first eccentricity squared.
const WGS84_E2: f64 = 6.694_379_990_14e-3;

/// A point on (or above) the Earth in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Height above the ellipsoid in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Coordinate {
    /// Create a coordinate without an altitude.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            altitude: None,
        }
    }

    /// Return a copy with the given altitude.
    #[must_use]
    pub const fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Altitude in meters, falling back to [`DEFAULT_ALTITUDE`].
    pub fn altitude_or_default(&self) -> f64 {
        self.altitude.unwrap_or(DEFAULT_ALTITUDE)
    }

    /// Return a copy whose altitude is always set.
    #[must_use]
    pub fn resolved(self) -> Self {
        self.with_altitude(self.altitude_or_default())
    }

    /// Check that latitude and longitude are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.altitude.is_none_or(f64::is_finite)
    }

    /// Return the coordinate if valid, or an [`Error::InvalidCoordinate`].
    pub fn validated(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Error::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// Convert to an Earth-centered, Earth-fixed position.
    pub fn to_ecef(&self) -> DVec3 {
        let lat = self.latitude.to_radians();
        let lon = self.longitude.to_radians();
        let height = self.altitude_or_default();

        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        // Prime vertical radius of curvature.
        let n = WGS84_SEMI_MAJOR / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

        DVec3::new(
            (n + height) * cos_lat * cos_lon,
            (n + height) * cos_lat * sin_lon,
            (n * (1.0 - WGS84_E2) + height) * sin_lat,
        )
    }

    /// Convert an Earth-centered, Earth-fixed position back to degrees.
    ///
    /// Iterates the latitude until it converges; a handful of iterations is
    /// enough for sub-millimeter accuracy at any altitude a camera reaches.
    pub fn from_ecef(position: DVec3) -> Self {
        let p = position.x.hypot(position.y);
        let longitude = position.y.atan2(position.x).to_degrees();

        if p < 1e-9 {
            // On the polar axis.
            let latitude = if position.z >= 0.0 { 90.0 } else { -90.0 };
            let altitude = position.z.abs() - WGS84_SEMI_MINOR;
            return Self::new(latitude, 0.0).with_altitude(altitude);
        }

        let mut lat = (position.z / (p * (1.0 - WGS84_E2))).atan();
        let mut height = 0.0;
        for _ in 0..8 {
            let sin_lat = lat.sin();
            let n = WGS84_SEMI_MAJOR / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
            height = p / lat.cos() - n;
            let next = (position.z / (p * (1.0 - WGS84_E2 * n / (n + height)))).atan();
            if (next - lat).abs() < 1e-12 {
                lat = next;
                break;
            }
            lat = next;
        }

        Self::new(lat.to_degrees(), longitude).with_altitude(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_altitude() {
        let coordinate = Coordinate::new(44.9741, -93.2775);
        assert!((coordinate.altitude_or_default() - 100.0).abs() < f64::EPSILON);
        assert_eq!(coordinate.resolved().altitude, Some(100.0));

        let coordinate = coordinate.with_altitude(400.0);
        assert_eq!(coordinate.resolved().altitude, Some(400.0));
    }

    #[test]
    fn test_validation_ranges() {
        assert!(Coordinate::new(90.0, 180.0).is_valid());
        assert!(Coordinate::new(-90.0, -180.0).is_valid());
        assert!(!Coordinate::new(90.5, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.1).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 0.0).with_altitude(f64::INFINITY).is_valid());

        let error = Coordinate::new(100.0, 0.0).validated().unwrap_err();
        assert!(matches!(error, Error::InvalidCoordinate { latitude, .. } if latitude == 100.0));
    }

    #[test]
    fn test_ecef_equator_and_pole() {
        let equator = Coordinate::new(0.0, 0.0).with_altitude(0.0).to_ecef();
        assert!((equator.x - WGS84_SEMI_MAJOR).abs() < 1e-6);
        assert!(equator.y.abs() < 1e-6);
        assert!(equator.z.abs() < 1e-6);

        let pole = Coordinate::new(90.0, 0.0).with_altitude(0.0).to_ecef();
        assert!((pole.z - WGS84_SEMI_MINOR).abs() < 1e-3);
    }

    #[test]
    fn test_ecef_round_trip_minneapolis() {
        let original = Coordinate::new(44.974_113_1, -93.277_537_9).with_altitude(400.0);
        let back = Coordinate::from_ecef(original.to_ecef());

        assert!((back.latitude - original.latitude).abs() < 1e-9);
        assert!((back.longitude - original.longitude).abs() < 1e-9);
        assert!((back.altitude_or_default() - 400.0).abs() < 1e-3);
    }

    #[test]
    fn test_serde_field_names() {
        let json = r#"{"latitude": 51.5074, "longitude": -0.1278}"#;
        let coordinate: Coordinate = serde_json::from_str(json).unwrap();
        assert_eq!(coordinate, Coordinate::new(51.5074, -0.1278));

        let encoded = serde_json::to_string(&coordinate.with_altitude(12.0)).unwrap();
        assert!(encoded.contains("\"altitude\":12.0"));
    }
}
