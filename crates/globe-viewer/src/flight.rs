//! Flight requests from the UI and tours, run on the async runtime.
//!
//! Systems never await a flight. They queue a request here, a task drives
//! it through the [`FlightRegistry`], and the outcome comes back over a
//! channel for the UI to show.

use bevy::prelude::*;
use globe_flight::{
    AnimationOptions, Coordinate, FlightOutcome, FlightRegistry, FlightSequencer,
};

use crate::async_runtime::{RunningTasks, TaskSpawner};
use crate::engine::BevyCameraEngine;
use crate::launch_params::LaunchParams;

/// Plugin for dispatching camera flights.
pub struct FlightPlugin;

impl Plugin for FlightPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Flights>()
            .init_resource::<FlightQueue>()
            .add_systems(Update, (dispatch_flights, collect_outcomes).chain());
    }
}

/// The sequencer for the globe camera and the registry it is published in.
#[derive(Resource, Clone)]
pub struct Flights {
    pub sequencer: FlightSequencer<BevyCameraEngine>,
    pub registry: FlightRegistry,
}

impl Default for Flights {
    fn default() -> Self {
        Self {
            sequencer: FlightSequencer::new(),
            registry: FlightRegistry::new(),
        }
    }
}

struct FlightRequest {
    coordinates: Vec<Coordinate>,
    options: Option<AnimationOptions>,
}

/// Pending flight requests and the outcome of the last finished one.
#[derive(Resource)]
pub struct FlightQueue {
    requests: Vec<FlightRequest>,
    outcome_tx: async_channel::Sender<FlightOutcome>,
    outcome_rx: async_channel::Receiver<FlightOutcome>,
    last_outcome: Option<FlightOutcome>,
}

impl Default for FlightQueue {
    fn default() -> Self {
        let (outcome_tx, outcome_rx) = async_channel::unbounded();
        Self {
            requests: Vec::new(),
            outcome_tx,
            outcome_rx,
            last_outcome: None,
        }
    }
}

impl FlightQueue {
    /// Queue a flight. `None` options use the launch defaults.
    pub fn request(&mut self, coordinates: Vec<Coordinate>, options: Option<AnimationOptions>) {
        self.requests.push(FlightRequest {
            coordinates,
            options,
        });
    }

    pub fn last_outcome(&self) -> Option<&FlightOutcome> {
        self.last_outcome.as_ref()
    }

    /// Forget queued requests and the last outcome.
    pub fn clear(&mut self) {
        self.requests.clear();
        self.last_outcome = None;
    }
}

fn dispatch_flights(
    mut queue: ResMut<FlightQueue>,
    flights: Res<Flights>,
    params: Res<LaunchParams>,
    spawner: TaskSpawner,
    mut running: ResMut<RunningTasks>,
) {
    let queue = &mut *queue;
    for request in queue.requests.drain(..) {
        let registry = flights.registry.clone();
        let options = request
            .options
            .unwrap_or_else(|| params.animation_options());
        let outcome_tx = queue.outcome_tx.clone();

        running.push(spawner.spawn(async move {
            if let Some(outcome) = registry.fly_to(request.coordinates, options).await {
                let _ = outcome_tx.try_send(outcome);
            }
        }));
    }
}

fn collect_outcomes(mut queue: ResMut<FlightQueue>) {
    while let Ok(outcome) = queue.outcome_rx.try_recv() {
        match &outcome {
            FlightOutcome::Completed { legs } => {
                tracing::info!("Flight complete after {legs} leg(s)");
            }
            other => tracing::debug!("Flight ended: {other:?}"),
        }
        queue.last_outcome = Some(outcome);
    }
}

/// Short description of an outcome for the status line.
pub fn describe_outcome(outcome: &FlightOutcome) -> String {
    match outcome {
        FlightOutcome::Completed { legs: 1 } => "Arrived".to_string(),
        FlightOutcome::Completed { legs } => format!("Arrived after {legs} stops"),
        FlightOutcome::Skipped(reason) => format!("Skipped ({reason:?})"),
        FlightOutcome::Aborted { leg, error } => format!("Stopped at stop {}: {error}", leg + 1),
        FlightOutcome::Superseded { .. } => "Replaced by a newer flight".to_string(),
    }
}
