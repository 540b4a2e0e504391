//! Engine-agnostic camera flight sequencing for 3D globe viewers.
//!
//! This crate drives a camera through an ordered list of geographic
//! destinations, one timed transition at a time, and then holds a slow orbit
//! around the last arrival until the next request or an explicit stop.
//!
//! # Design principles
//!
//! - **Engine-agnostic**: Everything goes through the [`CameraEngine`] trait
//! - **Non-owning**: The sequencer holds a weak handle and is inert without it
//! - **Runtime-agnostic**: `fly_to` is a plain future, works with any executor
//!
//! # Geographic helpers
//!
//! The [`geo`] module is public API for callers planning their own routes:
//! [`geo::distance_km`] and [`geo::optimal_altitude`] pick a viewing height
//! for a stop (the viewer uses them for search results), and
//! [`geo::smooth_flight_path`] densifies a leg into evenly spaced stops.
//! [`FlightSequencer::orbit_anchor`] exposes the Earth-fixed point an orbit
//! is locked onto, for engines that draw or follow it.
//!
//! # Example
//!
//! ```ignore
//! use globe_flight::{AnimationOptions, Coordinate, FlightSequencer};
//!
//! let sequencer = FlightSequencer::new();
//! sequencer.attach(&engine);
//!
//! let stops = [
//!     Coordinate::new(51.5074, -0.1278),
//!     Coordinate::new(48.8566, 2.3522).with_altitude(800.0),
//! ];
//! let outcome = sequencer.fly_to(&stops, AnimationOptions::default()).await;
//! ```

mod coordinate;
pub mod engine;
mod error;
pub mod geo;
pub mod locations;
mod options;
mod registry;
pub mod rotator;
mod sequencer;

#[cfg(test)]
mod testing;

pub use coordinate::{Coordinate, DEFAULT_ALTITUDE, WGS84_SEMI_MAJOR, WGS84_SEMI_MINOR};
pub use engine::{CameraEngine, CameraFlight, FlightCompletion, HeadingPitchRange, ListenerId};
pub use error::{Error, Result};
pub use locations::{NamedLocation, Preset};
pub use options::{AnimationOptions, DEFAULT_DURATION_MS, Easing, OrbitPolicy};
pub use registry::{FlightControl, FlightFuture, FlightRegistry};
pub use rotator::{LocationRotator, TileSourceFactory};
pub use sequencer::{FlightOutcome, FlightSequencer, SequencerState, SkipReason};
