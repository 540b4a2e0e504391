//! The capability set a rendering engine exposes to the flight sequencer.
//!
//! The sequencer only ever talks to the engine through [`CameraEngine`], so
//! it can run against Bevy in the viewer and against a recording fake in
//! tests.

use std::f64::consts::PI;

use glam::DVec3;

use crate::coordinate::Coordinate;
use crate::error::Result;
use crate::options::{AnimationOptions, Easing};

/// Highest altitude in meters a camera may climb to while in transit.
pub const MAXIMUM_HEIGHT: f64 = 2000.0;

/// Heading, pitch and range of the orbit view around a destination.
pub const ORBIT_OFFSET: HeadingPitchRange = HeadingPitchRange {
    heading: 0.0,
    pitch: -PI / 6.0,
    range: 250.0,
};

/// Heading increment per rendered frame while orbiting, in radians.
pub const ORBIT_STEP: f64 = 0.0005;

/// Camera orientation relative to the local east/north/up frame, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingPitchRoll {
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl HeadingPitchRoll {
    /// Orientation every flight arrives with: facing north, 20 degrees down.
    pub fn arrival() -> Self {
        Self {
            heading: 0.0,
            pitch: (-20.0_f64).to_radians(),
            roll: 0.0,
        }
    }
}

/// Offset of an orbiting camera from the point it looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingPitchRange {
    /// Radians clockwise from north.
    pub heading: f64,
    /// Radians, negative looks down on the target.
    pub pitch: f64,
    /// Distance from the target in meters.
    pub range: f64,
}

/// A single timed camera transition.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFlight {
    /// Where the flight ends, with its altitude resolved.
    pub destination: Coordinate,
    /// `destination` as an Earth-fixed position.
    pub position: DVec3,
    /// Orientation on arrival.
    pub orientation: HeadingPitchRoll,
    /// Transition duration in seconds.
    pub duration_secs: f64,
    /// Highest altitude allowed in transit.
    pub maximum_height: f64,
    pub easing: Easing,
}

impl CameraFlight {
    /// Plan the flight to one coordinate of a sequence.
    pub fn to(coordinate: &Coordinate, options: &AnimationOptions) -> Self {
        let destination = coordinate.resolved();
        Self {
            destination,
            position: destination.to_ecef(),
            orientation: HeadingPitchRoll::arrival(),
            duration_secs: options.duration_secs(),
            maximum_height: MAXIMUM_HEIGHT,
            easing: options.easing,
        }
    }
}

/// One-shot signal an engine fires when a flight arrives.
///
/// Dropping it without calling [`complete`](Self::complete) tells the waiting
/// sequencer the flight was interrupted.
#[derive(Debug)]
pub struct FlightCompletion {
    tx: async_channel::Sender<()>,
}

impl FlightCompletion {
    /// Create a completion together with the future side that awaits it.
    pub fn channel() -> (Self, FlightArrival) {
        let (tx, rx) = async_channel::bounded(1);
        (Self { tx }, FlightArrival { rx })
    }

    /// Signal that the flight has arrived.
    pub fn complete(self) {
        let _ = self.tx.try_send(());
    }
}

/// Receiving side of a [`FlightCompletion`].
#[derive(Debug)]
pub struct FlightArrival {
    rx: async_channel::Receiver<()>,
}

impl FlightArrival {
    /// Wait for the engine. Returns `false` if the completion was dropped.
    pub async fn wait(self) -> bool {
        self.rx.recv().await.is_ok()
    }
}

/// Identifier of a registered per-frame listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Callback run once per rendered frame.
pub type FrameListener = Box<dyn FnMut() + Send>;

/// What the flight sequencer needs from a rendering engine.
///
/// Implementations use interior mutability: the sequencer calls these from
/// whatever task is driving the flight, and frame listeners call
/// [`rotate_right`](Self::rotate_right) from inside the render loop.
pub trait CameraEngine: Send + Sync + 'static {
    /// Start a timed transition. The engine must eventually either call
    /// `completion.complete()` or drop it.
    fn fly_to(&self, flight: CameraFlight, completion: FlightCompletion) -> Result<()>;

    /// Register a callback to run every frame.
    fn add_frame_listener(&self, listener: FrameListener) -> ListenerId;

    /// Unregister a callback. Returns `false` if it was not registered.
    fn remove_frame_listener(&self, id: ListenerId) -> bool;

    /// Lock the camera onto `anchor`, viewed from `offset`.
    fn look_at_transform(&self, anchor: DVec3, offset: HeadingPitchRange);

    /// Rotate the camera's heading around its look-at anchor.
    fn rotate_right(&self, angle: f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::poll_once;

    #[test]
    fn test_flight_from_default_options() {
        let coordinate = Coordinate::new(44.9741, -93.2775).with_altitude(400.0);
        let flight = CameraFlight::to(&coordinate, &AnimationOptions::default());

        assert_eq!(flight.destination, coordinate);
        assert!((flight.duration_secs - 2.0).abs() < f64::EPSILON);
        assert!((flight.maximum_height - 2000.0).abs() < f64::EPSILON);
        assert!((flight.orientation.pitch.to_degrees() + 20.0).abs() < 1e-9);
        assert!(flight.position.distance(coordinate.to_ecef()) < 1e-9);
    }

    #[test]
    fn test_flight_resolves_missing_altitude() {
        let flight = CameraFlight::to(&Coordinate::new(0.0, 0.0), &AnimationOptions::default());
        assert_eq!(flight.destination.altitude, Some(100.0));
    }

    #[test]
    fn test_completion_fires_once() {
        let (completion, arrival) = FlightCompletion::channel();
        completion.complete();
        let mut wait = std::pin::pin!(arrival.wait());
        assert_eq!(poll_once(wait.as_mut()), std::task::Poll::Ready(true));
    }

    #[test]
    fn test_dropped_completion_reports_interruption() {
        let (completion, arrival) = FlightCompletion::channel();
        let mut wait = std::pin::pin!(arrival.wait());
        assert!(poll_once(wait.as_mut()).is_pending());
        drop(completion);
        assert_eq!(poll_once(wait.as_mut()), std::task::Poll::Ready(false));
    }
}
