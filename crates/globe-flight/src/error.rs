//! Error types for the globe-flight crate.

use std::fmt;

/// Result type for globe-flight operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the camera or the tile source.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A coordinate was outside the valid latitude/longitude range.
    InvalidCoordinate {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// No preset location exists for the given key.
    UnknownLocation {
        /// The key that was looked up.
        key: String,
    },
    /// The rendering engine rejected or failed a camera operation.
    Engine {
        /// The operation that failed.
        operation: &'static str,
        /// The error message.
        message: String,
    },
    /// The engine dropped a flight without signalling completion.
    FlightInterrupted {
        /// Index of the leg that was interrupted.
        leg: usize,
    },
    /// The viewer was torn down while a flight sequence was running.
    ViewerUnavailable,
    /// A location rotator was created without any locations.
    EmptyRotation,
    /// Building a tile source failed.
    TileSource {
        /// Name of the location the tile source was anchored at.
        location: String,
        /// The error message.
        message: String,
    },
    /// The viewer could not be initialised.
    Initialization {
        /// Description of what was missing or invalid.
        detail: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCoordinate {
                latitude,
                longitude,
            } => {
                write!(f, "invalid coordinate (lat {latitude}, lon {longitude})")
            }
            Error::UnknownLocation { key } => write!(f, "unknown location '{key}'"),
            Error::Engine { operation, message } => {
                write!(f, "engine {operation} failed: {message}")
            }
            Error::FlightInterrupted { leg } => {
                write!(f, "flight leg {leg} was interrupted before completing")
            }
            Error::ViewerUnavailable => write!(f, "viewer is no longer available"),
            Error::EmptyRotation => write!(f, "location rotation needs at least one location"),
            Error::TileSource { location, message } => {
                write!(f, "tile source for {location} failed: {message}")
            }
            Error::Initialization { detail } => {
                write!(f, "failed to initialize 3D earth viewer: {detail}")
            }
        }
    }
}

impl std::error::Error for Error {}
