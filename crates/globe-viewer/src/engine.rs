//! Bevy implementation of the camera capability set.
//!
//! The flight sequencer runs on the async runtime, so [`BevyCameraEngine`]
//! never touches the ECS directly. Flights, look-at and rotation requests go
//! through a command queue that systems drain every `Update`. Frame
//! listeners run in the same schedule, before the queue is drained, so a
//! listener's rotation lands on the frame it ran in.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bevy::prelude::*;
use globe_flight::engine::{FrameListener, HeadingPitchRoll};
use globe_flight::geo::{ArcTrajectory, EnuBasis};
use globe_flight::{
    CameraEngine, CameraFlight, Easing, Error, FlightCompletion, HeadingPitchRange, ListenerId,
    Result,
};
use glam::DVec3;

use crate::floating_origin::FloatingOriginCamera;

/// Plugin driving the globe camera from engine commands.
pub struct CameraEnginePlugin;

impl Plugin for CameraEnginePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraRig>().add_systems(
            Update,
            (
                run_frame_listeners,
                apply_camera_commands,
                animate_flight,
                apply_orbit,
            )
                .chain()
                .run_if(resource_exists::<EngineLink>),
        );
    }
}

/// Marker for the camera the engine drives.
#[derive(Component)]
pub struct GlobeCamera;

/// A request queued by the engine for the render loop.
#[derive(Debug)]
pub enum CameraCommand {
    Fly {
        flight: CameraFlight,
        completion: FlightCompletion,
    },
    LookAt {
        anchor: DVec3,
        offset: HeadingPitchRange,
    },
    Rotate(f64),
}

/// Camera engine backed by the Bevy render loop.
pub struct BevyCameraEngine {
    commands: async_channel::Sender<CameraCommand>,
    listeners: Mutex<BTreeMap<ListenerId, FrameListener>>,
    next_listener: AtomicU64,
}

impl BevyCameraEngine {
    /// Create an engine and the receiving end of its command queue.
    pub fn new() -> (Arc<Self>, async_channel::Receiver<CameraCommand>) {
        let (tx, rx) = async_channel::unbounded();
        let engine = Arc::new(Self {
            commands: tx,
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
        });
        (engine, rx)
    }

    /// Run every registered listener once.
    ///
    /// The listener map stays locked while they run, so a listener removed
    /// from another thread mid-frame is never resurrected.
    pub fn run_frame_listeners(&self) {
        for listener in self.lock_listeners().values_mut() {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    fn lock_listeners(&self) -> MutexGuard<'_, BTreeMap<ListenerId, FrameListener>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, operation: &'static str, command: CameraCommand) -> Result<()> {
        self.commands
            .try_send(command)
            .map_err(|e| Error::Engine {
                operation,
                message: e.to_string(),
            })
    }
}

impl CameraEngine for BevyCameraEngine {
    fn fly_to(&self, flight: CameraFlight, completion: FlightCompletion) -> Result<()> {
        self.send("fly_to", CameraCommand::Fly { flight, completion })
    }

    fn add_frame_listener(&self, listener: FrameListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().insert(id, listener);
        id
    }

    fn remove_frame_listener(&self, id: ListenerId) -> bool {
        self.lock_listeners().remove(&id).is_some()
    }

    fn look_at_transform(&self, anchor: DVec3, offset: HeadingPitchRange) {
        if let Err(e) = self.send("look_at_transform", CameraCommand::LookAt { anchor, offset }) {
            tracing::warn!("{e}");
        }
    }

    fn rotate_right(&self, angle: f64) {
        if let Err(e) = self.send("rotate_right", CameraCommand::Rotate(angle)) {
            tracing::warn!("{e}");
        }
    }
}

/// The engine currently attached to the scene.
#[derive(Resource)]
pub struct EngineLink {
    pub engine: Arc<BevyCameraEngine>,
    commands: async_channel::Receiver<CameraCommand>,
}

impl EngineLink {
    pub fn new(
        engine: Arc<BevyCameraEngine>,
        commands: async_channel::Receiver<CameraCommand>,
    ) -> Self {
        Self { engine, commands }
    }
}

/// What the globe camera is doing.
#[derive(Resource, Default)]
pub struct CameraRig {
    flight: Option<ActiveFlight>,
    orbit: Option<OrbitRig>,
}

impl CameraRig {
    /// Progress of the running flight from 0.0 to 1.0, or `None` if idle.
    #[allow(clippy::cast_possible_truncation)]
    pub fn flight_progress(&self) -> Option<f32> {
        self.flight.as_ref().map(|flight| flight.progress() as f32)
    }

    /// Whether a flight or orbit currently owns the camera.
    pub fn is_active(&self) -> bool {
        self.flight.is_some() || self.orbit.is_some()
    }

    /// Drop the flight and orbit. An unfinished flight reports as interrupted.
    pub fn clear(&mut self) {
        if self.flight.take().is_some() {
            tracing::debug!("Camera flight interrupted");
        }
        self.orbit = None;
    }
}

#[cfg(test)]
impl CameraRig {
    pub fn orbiting(anchor: DVec3, offset: HeadingPitchRange) -> Self {
        Self {
            flight: None,
            orbit: Some(OrbitRig { anchor, offset }),
        }
    }
}

/// A flight in progress.
struct ActiveFlight {
    trajectory: ArcTrajectory,
    start_rotation: Quat,
    end_rotation: Quat,
    duration: f64,
    elapsed: f64,
    easing: Easing,
    completion: FlightCompletion,
}

impl ActiveFlight {
    fn new(
        start: DVec3,
        start_rotation: Quat,
        flight: CameraFlight,
        completion: FlightCompletion,
    ) -> Self {
        Self {
            trajectory: ArcTrajectory::new(start, flight.position, flight.maximum_height),
            start_rotation,
            end_rotation: arrival_rotation(flight.position, flight.orientation),
            duration: flight.duration_secs.max(0.0),
            elapsed: 0.0,
            easing: flight.easing,
            completion,
        }
    }

    fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    /// Step the flight forward and return the camera pose.
    #[allow(clippy::cast_possible_truncation)]
    fn advance(&mut self, delta_secs: f64) -> (DVec3, Quat) {
        self.elapsed += delta_secs;
        let s = self.easing.apply(self.progress());
        let position = self.trajectory.position_at(s);
        let rotation = self.start_rotation.slerp(self.end_rotation, s as f32);
        (position, rotation)
    }

    fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }
}

/// Camera locked onto an anchor at a heading, pitch and range.
#[derive(Debug, Clone, Copy)]
struct OrbitRig {
    anchor: DVec3,
    offset: HeadingPitchRange,
}

impl OrbitRig {
    fn pose(&self) -> (DVec3, Quat) {
        orbit_pose(self.anchor, self.offset)
    }
}

/// Camera position and rotation looking at `anchor` from `offset`.
pub fn orbit_pose(anchor: DVec3, offset: HeadingPitchRange) -> (DVec3, Quat) {
    let basis = EnuBasis::at(anchor);
    let direction = basis.direction(offset.heading, offset.pitch);
    let position = anchor - direction * offset.range;
    let rotation = Transform::IDENTITY
        .looking_to(direction.as_vec3(), basis.up.as_vec3())
        .rotation;
    (position, rotation)
}

/// Rotation of a camera at `position` facing `orientation` in the local frame.
#[allow(clippy::cast_possible_truncation)]
pub fn arrival_rotation(position: DVec3, orientation: HeadingPitchRoll) -> Quat {
    let basis = EnuBasis::at(position);
    let direction = basis.direction(orientation.heading, orientation.pitch);
    let looking = Transform::IDENTITY
        .looking_to(direction.as_vec3(), basis.up.as_vec3())
        .rotation;
    looking * Quat::from_rotation_z(orientation.roll as f32)
}

fn run_frame_listeners(link: Res<EngineLink>) {
    link.engine.run_frame_listeners();
}

fn apply_camera_commands(
    link: Res<EngineLink>,
    mut rig: ResMut<CameraRig>,
    camera: Query<(&FloatingOriginCamera, &Transform), With<GlobeCamera>>,
) {
    while let Ok(command) = link.commands.try_recv() {
        match command {
            CameraCommand::Fly { flight, completion } => {
                let Ok((origin_camera, transform)) = camera.single() else {
                    tracing::warn!("No globe camera, dropping flight");
                    continue;
                };
                // A newer flight replaces the old one and any orbit.
                rig.clear();
                tracing::debug!(
                    "Flying to lat {:.5}, lon {:.5} over {:.1}s",
                    flight.destination.latitude,
                    flight.destination.longitude,
                    flight.duration_secs
                );
                rig.flight = Some(ActiveFlight::new(
                    origin_camera.position,
                    transform.rotation,
                    flight,
                    completion,
                ));
            }
            CameraCommand::LookAt { anchor, offset } => {
                rig.orbit = Some(OrbitRig { anchor, offset });
            }
            CameraCommand::Rotate(angle) => {
                if let Some(orbit) = rig.orbit.as_mut() {
                    orbit.offset.heading += angle;
                }
            }
        }
    }
}

fn animate_flight(
    time: Res<Time>,
    mut rig: ResMut<CameraRig>,
    mut camera: Query<(&mut FloatingOriginCamera, &mut Transform), With<GlobeCamera>>,
) {
    let Some(flight) = rig.flight.as_mut() else {
        return;
    };
    let (position, rotation) = flight.advance(time.delta_secs_f64());

    if let Ok((mut origin_camera, mut transform)) = camera.single_mut() {
        origin_camera.position = position;
        transform.rotation = rotation;
    }

    if flight.is_finished()
        && let Some(flight) = rig.flight.take()
    {
        flight.completion.complete();
    }
}

fn apply_orbit(
    rig: Res<CameraRig>,
    mut camera: Query<(&mut FloatingOriginCamera, &mut Transform), With<GlobeCamera>>,
) {
    let Some(orbit) = rig.orbit else {
        return;
    };
    if let Ok((mut origin_camera, mut transform)) = camera.single_mut() {
        let (position, rotation) = orbit.pose();
        origin_camera.position = position;
        transform.rotation = rotation;
    }
}
