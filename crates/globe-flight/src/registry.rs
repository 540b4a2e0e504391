//! Process-wide access point to whichever viewer is currently mounted.
//!
//! Outer code (UI handlers, tours, tests) flies the camera through a
//! [`FlightRegistry`] without knowing which engine sits behind it. Binding a
//! new viewer replaces the old one; unbinding leaves the registry empty and
//! every call becomes a logged no-op.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::coordinate::Coordinate;
use crate::engine::CameraEngine;
use crate::options::AnimationOptions;
use crate::sequencer::{FlightOutcome, FlightSequencer};

/// Boxed future returned by [`FlightControl::fly_to`].
pub type FlightFuture = Pin<Box<dyn Future<Output = FlightOutcome> + Send>>;

/// Object-safe handle to a flight sequencer.
pub trait FlightControl: Send + Sync {
    fn fly_to(&self, coordinates: Vec<Coordinate>, options: AnimationOptions) -> FlightFuture;
    fn stop_orbit(&self);
}

impl<E: CameraEngine> FlightControl for FlightSequencer<E> {
    fn fly_to(&self, coordinates: Vec<Coordinate>, options: AnimationOptions) -> FlightFuture {
        let sequencer = self.clone();
        Box::pin(async move { sequencer.fly_to(&coordinates, options).await })
    }

    fn stop_orbit(&self) {
        FlightSequencer::stop_orbit(self);
    }
}

/// Shared slot holding the active viewer's flight control.
#[derive(Clone, Default)]
pub struct FlightRegistry {
    slot: Arc<Mutex<Option<Arc<dyn FlightControl>>>>,
}

impl FlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a viewer, replacing any previous one.
    pub fn bind(&self, control: Arc<dyn FlightControl>) {
        if self.lock().replace(control).is_some() {
            tracing::debug!("Replacing previously bound viewer");
        }
    }

    /// Withdraw the current viewer, stopping its orbit.
    pub fn unbind(&self) {
        if let Some(control) = self.lock().take() {
            control.stop_orbit();
        }
    }

    pub fn is_available(&self) -> bool {
        self.lock().is_some()
    }

    /// Fly the bound viewer. Returns `None` if nothing is bound.
    pub async fn fly_to(
        &self,
        coordinates: Vec<Coordinate>,
        options: AnimationOptions,
    ) -> Option<FlightOutcome> {
        let Some(control) = self.current() else {
            tracing::warn!("fly_to not available yet, no viewer bound");
            return None;
        };
        Some(control.fly_to(coordinates, options).await)
    }

    /// Stop the bound viewer's orbit. Returns `false` if nothing is bound.
    pub fn stop_orbit(&self) -> bool {
        let Some(control) = self.current() else {
            tracing::warn!("stop_orbit not available yet, no viewer bound");
            return false;
        };
        control.stop_orbit();
        true
    }

    fn current(&self) -> Option<Arc<dyn FlightControl>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<dyn FlightControl>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for FlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightRegistry")
            .field("available", &self.is_available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::pin::pin;
    use std::task::Poll;

    use super::*;
    use crate::testing::{FakeEngine, poll_once};

    fn bound() -> (Arc<FakeEngine>, FlightSequencer<FakeEngine>, FlightRegistry) {
        let engine = Arc::new(FakeEngine::default());
        let sequencer = FlightSequencer::new();
        sequencer.attach(&engine);
        let registry = FlightRegistry::new();
        registry.bind(Arc::new(sequencer.clone()));
        (engine, sequencer, registry)
    }

    #[test]
    fn test_unbound_registry_is_noop() {
        let registry = FlightRegistry::new();
        assert!(!registry.is_available());
        assert!(!registry.stop_orbit());

        let mut flight = pin!(registry.fly_to(
            vec![Coordinate::new(0.0, 0.0)],
            AnimationOptions::default()
        ));
        assert_eq!(poll_once(flight.as_mut()), Poll::Ready(None));
    }

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unbound_warnings_name_rust_api() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let registry = FlightRegistry::new();
            registry.stop_orbit();
            let mut flight = pin!(registry.fly_to(
                vec![Coordinate::new(0.0, 0.0)],
                AnimationOptions::default()
            ));
            assert!(poll_once(flight.as_mut()).is_ready());
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("fly_to not available"), "{output}");
        assert!(output.contains("stop_orbit not available"), "{output}");
        assert!(!output.contains("flyTo") && !output.contains("stopOrbit"));
    }

    #[test]
    fn test_bound_registry_flies_sequencer() {
        let (engine, sequencer, registry) = bound();
        assert!(registry.is_available());

        let mut flight = pin!(registry.fly_to(
            vec![Coordinate::new(44.95, -93.0).with_altitude(400.0)],
            AnimationOptions::default()
        ));
        assert!(poll_once(flight.as_mut()).is_pending());
        engine.complete_next();
        assert_eq!(
            poll_once(flight.as_mut()),
            Poll::Ready(Some(FlightOutcome::Completed { legs: 1 }))
        );
        assert!(sequencer.is_orbiting());

        assert!(registry.stop_orbit());
        assert!(!sequencer.is_orbiting());
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn test_unbind_stops_orbit() {
        let (engine, sequencer, registry) = bound();
        let mut flight = pin!(registry.fly_to(
            vec![Coordinate::new(44.95, -93.0)],
            AnimationOptions::default()
        ));
        assert!(poll_once(flight.as_mut()).is_pending());
        engine.complete_next();
        assert!(poll_once(flight.as_mut()).is_ready());
        assert_eq!(engine.listener_count(), 1);

        registry.unbind();
        assert!(!registry.is_available());
        assert!(!sequencer.is_orbiting());
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn test_clones_share_slot() {
        let registry = FlightRegistry::new();
        let other = registry.clone();
        registry.bind(Arc::new(FlightSequencer::<FakeEngine>::new()));
        assert!(other.is_available());
        other.unbind();
        assert!(!registry.is_available());
    }
}
