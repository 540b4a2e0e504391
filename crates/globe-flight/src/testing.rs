//! Test doubles shared by the unit tests in this crate.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll, Waker};

use glam::DVec3;

use crate::engine::{
    CameraEngine, CameraFlight, FlightCompletion, FrameListener, HeadingPitchRange, ListenerId,
};
use crate::error::{Error, Result};

/// Poll a future once with a waker that does nothing.
///
/// The fake engine resolves completions synchronously, so tests step a
/// flight forward by polling again after completing a leg.
pub fn poll_once<F: Future + ?Sized>(future: Pin<&mut F>) -> Poll<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    future.poll(&mut cx)
}

/// Engine that records every call and lets the test decide when flights land.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
    listeners: Mutex<BTreeMap<ListenerId, FrameListener>>,
}

#[derive(Default)]
struct FakeState {
    flights: Vec<CameraFlight>,
    pending: Vec<FlightCompletion>,
    look_ats: Vec<(DVec3, HeadingPitchRange)>,
    rotation: f64,
    next_listener: u64,
    registrations: usize,
    fail_flight: Option<usize>,
}

impl FakeEngine {
    /// Make the flight with the given call index (0-based) fail.
    pub fn fail_flight(&self, index: usize) {
        self.state.lock().unwrap().fail_flight = Some(index);
    }

    pub fn flights(&self) -> Vec<CameraFlight> {
        self.state.lock().unwrap().flights.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Complete the oldest pending flight.
    pub fn complete_next(&self) {
        let completion = self.state.lock().unwrap().pending.remove(0);
        completion.complete();
    }

    /// Drop the oldest pending flight without completing it.
    pub fn interrupt_next(&self) {
        let completion = self.state.lock().unwrap().pending.remove(0);
        drop(completion);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Total listeners ever registered.
    pub fn registrations(&self) -> usize {
        self.state.lock().unwrap().registrations
    }

    pub fn look_ats(&self) -> Vec<(DVec3, HeadingPitchRange)> {
        self.state.lock().unwrap().look_ats.clone()
    }

    pub fn rotation(&self) -> f64 {
        self.state.lock().unwrap().rotation
    }

    /// Run every registered listener once, like one rendered frame.
    pub fn run_frame(&self) {
        for listener in self.listeners.lock().unwrap().values_mut() {
            listener();
        }
    }
}

impl CameraEngine for FakeEngine {
    fn fly_to(&self, flight: CameraFlight, completion: FlightCompletion) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state.flights.len();
        state.flights.push(flight);
        if state.fail_flight == Some(index) {
            return Err(Error::Engine {
                operation: "fly_to",
                message: "camera is locked".to_string(),
            });
        }
        state.pending.push(completion);
        Ok(())
    }

    fn add_frame_listener(&self, listener: FrameListener) -> ListenerId {
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_listener += 1;
            state.registrations += 1;
            ListenerId(state.next_listener)
        };
        self.listeners.lock().unwrap().insert(id, listener);
        id
    }

    fn remove_frame_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().unwrap().remove(&id).is_some()
    }

    fn look_at_transform(&self, anchor: DVec3, offset: HeadingPitchRange) {
        self.state.lock().unwrap().look_ats.push((anchor, offset));
    }

    fn rotate_right(&self, angle: f64) {
        self.state.lock().unwrap().rotation += angle;
    }
}
