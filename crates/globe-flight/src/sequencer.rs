//! Camera flight sequencing and the orbit state machine.
//!
//! ## States
//!
//! ```text
//! Idle ──fly_to──▶ Flying(0) ──arrived──▶ Flying(1) ─ … ─▶ Flying(last)
//!   ▲                 ▲                                        │ arrived
//!   │ stop_orbit      │ fly_to                                 ▼
//!   └──────────── Orbiting(center) ◀─────────────────────────────┘
//! ```
//!
//! Every `fly_to` call starts a new generation. Completions belonging to an
//! older generation are ignored, so a superseded sequence neither starts an
//! orbit nor requests further legs.
//!
//! At most one orbit listener is registered with the engine at any time.
//! Attaching and detaching it happens under the sequencer's lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use glam::DVec3;

use crate::coordinate::Coordinate;
use crate::engine::{
    CameraEngine, CameraFlight, FlightArrival, FlightCompletion, ListenerId, ORBIT_OFFSET,
    ORBIT_STEP,
};
use crate::error::Error;
use crate::options::{AnimationOptions, OrbitPolicy};

/// Where the sequencer is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SequencerState {
    Idle,
    /// Waiting for the engine to finish leg `leg`.
    Flying { leg: usize },
    /// Slowly rotating around `center`.
    Orbiting { center: Coordinate },
}

/// Why a `fly_to` call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No engine is attached, or it has been torn down.
    ViewerNotReady,
    /// The coordinate list was empty.
    NoCoordinates,
    /// The coordinate at `index` is out of range.
    InvalidCoordinate { index: usize },
}

/// How a `fly_to` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightOutcome {
    /// Every leg arrived.
    Completed { legs: usize },
    /// Preconditions were not met; no flight was requested.
    Skipped(SkipReason),
    /// Leg `leg` failed; the remaining legs were abandoned.
    Aborted { leg: usize, error: Error },
    /// A newer `fly_to` call took over while leg `leg` was in flight.
    Superseded { leg: usize },
}

/// An active orbit around a destination.
#[derive(Debug, Clone, Copy)]
struct OrbitSession {
    center: Coordinate,
    /// `center` as the Earth-fixed point the camera is locked onto.
    anchor: DVec3,
    listener: ListenerId,
}

struct Inner<E> {
    engine: Weak<E>,
    generation: u64,
    state: SequencerState,
    orbit: Option<OrbitSession>,
}

/// Drives a camera through an ordered list of destinations.
///
/// Cloning is cheap; clones share the same state.
pub struct FlightSequencer<E> {
    inner: Arc<Mutex<Inner<E>>>,
}

impl<E> Clone for FlightSequencer<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: CameraEngine> Default for FlightSequencer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CameraEngine> FlightSequencer<E> {
    /// Create a sequencer with no engine attached.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                engine: Weak::new(),
                generation: 0,
                state: SequencerState::Idle,
                orbit: None,
            })),
        }
    }

    /// Point the sequencer at an engine. It keeps only a weak reference.
    pub fn attach(&self, engine: &Arc<E>) {
        let mut inner = self.lock();
        Self::teardown_orbit(&mut inner);
        inner.generation += 1;
        inner.engine = Arc::downgrade(engine);
        inner.state = SequencerState::Idle;
    }

    /// Forget the engine, stopping any orbit and superseding any flight.
    pub fn detach(&self) {
        let mut inner = self.lock();
        Self::teardown_orbit(&mut inner);
        inner.generation += 1;
        inner.engine = Weak::new();
        inner.state = SequencerState::Idle;
    }

    pub fn state(&self) -> SequencerState {
        self.lock().state
    }

    pub fn is_orbiting(&self) -> bool {
        self.lock().orbit.is_some()
    }

    pub fn orbit_center(&self) -> Option<Coordinate> {
        self.lock().orbit.map(|orbit| orbit.center)
    }

    /// Earth-fixed point the orbiting camera is locked onto.
    pub fn orbit_anchor(&self) -> Option<DVec3> {
        self.lock().orbit.map(|orbit| orbit.anchor)
    }

    /// Fly through `coordinates` in order, one leg at a time.
    ///
    /// Never fails: problems are logged and reported in the outcome.
    pub async fn fly_to(
        &self,
        coordinates: &[Coordinate],
        options: AnimationOptions,
    ) -> FlightOutcome {
        if self.engine().is_none() {
            tracing::warn!("Viewer not ready, ignoring flight request");
            return FlightOutcome::Skipped(SkipReason::ViewerNotReady);
        }
        if coordinates.is_empty() {
            tracing::warn!("No coordinates provided, ignoring flight request");
            return FlightOutcome::Skipped(SkipReason::NoCoordinates);
        }
        if let Some(index) = coordinates.iter().position(|c| !c.is_valid()) {
            tracing::warn!(
                "Coordinate {index} is out of range ({:?}), ignoring flight request",
                coordinates[index]
            );
            return FlightOutcome::Skipped(SkipReason::InvalidCoordinate { index });
        }

        let generation = self.begin();
        let legs = coordinates.len();
        tracing::info!("Starting flight sequence with {legs} leg(s)");

        for (leg, coordinate) in coordinates.iter().enumerate() {
            let flight = CameraFlight::to(coordinate, &options);
            let destination = flight.destination;

            let arrival = match self.request_leg(generation, leg, flight) {
                LegRequest::Started(arrival) => arrival,
                LegRequest::Superseded => return FlightOutcome::Superseded { leg },
                LegRequest::Failed(error) => {
                    tracing::error!("Error during flying animation (leg {leg}): {error}");
                    self.finish(generation);
                    return FlightOutcome::Aborted { leg, error };
                }
            };

            let arrived = arrival.wait().await;

            if !self.is_current(generation) {
                tracing::debug!("Flight leg {leg} finished after being superseded");
                return FlightOutcome::Superseded { leg };
            }
            if !arrived {
                let error = Error::FlightInterrupted { leg };
                tracing::error!("Error during flying animation: {error}");
                self.finish(generation);
                return FlightOutcome::Aborted { leg, error };
            }

            let is_last = leg + 1 == legs;
            if options.look_at_target && (is_last || options.orbit == OrbitPolicy::EveryLeg) {
                self.start_orbit(generation, destination);
            } else if is_last {
                self.finish(generation);
            }
        }

        FlightOutcome::Completed { legs }
    }

    /// Stop orbiting, if orbiting. Safe to call repeatedly.
    pub fn stop_orbit(&self) {
        let mut inner = self.lock();
        if Self::teardown_orbit(&mut inner) {
            tracing::debug!("Camera rotation stopped");
        }
        if matches!(inner.state, SequencerState::Orbiting { .. }) {
            inner.state = SequencerState::Idle;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn engine(&self) -> Option<Arc<E>> {
        self.lock().engine.upgrade()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Claim a new generation and clear any orbit left by the previous one.
    fn begin(&self) -> u64 {
        let mut inner = self.lock();
        Self::teardown_orbit(&mut inner);
        inner.generation += 1;
        inner.state = SequencerState::Flying { leg: 0 };
        inner.generation
    }

    /// Ask the engine to fly one leg, unless this generation is stale.
    fn request_leg(&self, generation: u64, leg: usize, flight: CameraFlight) -> LegRequest {
        let engine = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return LegRequest::Superseded;
            }
            // An orbit left by the previous leg must not run during this one.
            Self::teardown_orbit(&mut inner);
            inner.state = SequencerState::Flying { leg };
            inner.engine.upgrade()
        };
        let Some(engine) = engine else {
            return LegRequest::Failed(Error::ViewerUnavailable);
        };

        let (completion, arrival) = FlightCompletion::channel();
        match engine.fly_to(flight, completion) {
            Ok(()) => LegRequest::Started(arrival),
            Err(error) => LegRequest::Failed(error),
        }
    }

    /// Return to idle if this generation is still the current one.
    fn finish(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            Self::teardown_orbit(&mut inner);
            inner.state = SequencerState::Idle;
        }
    }

    /// Replace any orbit with a new one around `center`.
    fn start_orbit(&self, generation: u64, center: Coordinate) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        Self::teardown_orbit(&mut inner);

        let Some(engine) = inner.engine.upgrade() else {
            inner.state = SequencerState::Idle;
            return;
        };

        let anchor = center.to_ecef();
        engine.look_at_transform(anchor, ORBIT_OFFSET);

        let weak = Arc::downgrade(&engine);
        let listener = engine.add_frame_listener(Box::new(move || {
            if let Some(engine) = weak.upgrade() {
                engine.rotate_right(ORBIT_STEP);
            }
        }));

        inner.orbit = Some(OrbitSession {
            center,
            anchor,
            listener,
        });
        inner.state = SequencerState::Orbiting { center };
        tracing::debug!(
            "Orbiting lat {:.5}, lon {:.5}",
            center.latitude,
            center.longitude
        );
    }

    /// Unregister the orbit listener. Returns whether an orbit was active.
    fn teardown_orbit(inner: &mut Inner<E>) -> bool {
        let Some(orbit) = inner.orbit.take() else {
            return false;
        };
        if let Some(engine) = inner.engine.upgrade() {
            engine.remove_frame_listener(orbit.listener);
        }
        true
    }
}

enum LegRequest {
    Started(FlightArrival),
    Superseded,
    Failed(Error),
}
