//! Viewer bootstrap: builds the scene once a display surface exists, and
//! tears it down again for a retry or on exit.

use std::sync::Arc;

use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::ecs::message::MessageReader;
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use globe_flight::engine::HeadingPitchRoll;
use globe_flight::{Coordinate, Error, WGS84_SEMI_MAJOR, WGS84_SEMI_MINOR};
use glam::DVec3;

use crate::async_runtime::RunningTasks;
use crate::engine::{BevyCameraEngine, CameraRig, EngineLink, GlobeCamera, arrival_rotation};
use crate::flight::{FlightQueue, Flights};
use crate::floating_origin::{FloatingOriginCamera, WorldPosition};
use crate::geocoding::GeocodingState;
use crate::launch_params::{LaunchParams, Tour, ViewerVariant};
use crate::tiles::{AnchorMarker, TileRotation};

/// Plugin for building and tearing down the viewer.
pub struct BootstrapPlugin;

impl Plugin for BootstrapPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewerStatus>()
            .init_resource::<RetryRequest>()
            .add_systems(
                Update,
                (handle_retry, initialize_viewer.run_if(is_loading)).chain(),
            )
            .add_systems(Last, teardown_on_exit);
    }
}

/// Where the viewer is in its lifecycle.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub enum ViewerStatus {
    #[default]
    Loading,
    Ready,
    /// Initialization failed with the given message.
    Failed(String),
}

/// A pending request to tear the viewer down and build it again.
#[derive(Resource, Default)]
pub struct RetryRequest {
    pending: bool,
}

impl RetryRequest {
    pub fn request(&mut self) {
        self.pending = true;
    }

    fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// Marker for entities that belong to the current viewer instance.
#[derive(Component)]
pub struct ViewerEntity;

fn is_loading(status: Res<ViewerStatus>) -> bool {
    *status == ViewerStatus::Loading
}

#[derive(SystemParam)]
struct SceneParams<'w, 's> {
    commands: Commands<'w, 's>,
    meshes: ResMut<'w, Assets<Mesh>>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
    windows: Query<'w, 's, (), With<PrimaryWindow>>,
    params: Res<'w, LaunchParams>,
    flights: Res<'w, Flights>,
}

fn initialize_viewer(
    mut scene: SceneParams,
    mut queue: ResMut<FlightQueue>,
    mut status: ResMut<ViewerStatus>,
) {
    match build_viewer(&mut scene) {
        Ok(tour) => {
            if let Some(tour) = tour {
                tracing::info!("Starting tour with {} stop(s)", tour.stops.len());
                queue.request(tour.stops, tour.options);
            }
            tracing::info!("Viewer ready ({})", scene.params.variant);
            *status = ViewerStatus::Ready;
        }
        Err(e) => {
            tracing::error!("Error initializing viewer: {e}");
            *status = ViewerStatus::Failed(e.to_string());
        }
    }
}

fn build_viewer(scene: &mut SceneParams) -> globe_flight::Result<Option<Tour>> {
    scene.params.validate()?;
    if scene.windows.single().is_err() {
        return Err(Error::Initialization {
            detail: "no primary window to render into".to_string(),
        });
    }
    let tour = scene.params.load_tour()?;

    spawn_camera(&mut scene.commands, scene.params.start());
    spawn_globe(&mut scene.commands, &mut scene.meshes, &mut scene.materials);

    match scene.params.variant {
        ViewerVariant::Photorealistic => {
            let (engine, commands) = BevyCameraEngine::new();
            scene.flights.sequencer.attach(&engine);
            scene
                .flights
                .registry
                .bind(Arc::new(scene.flights.sequencer.clone()));
            scene
                .commands
                .insert_resource(EngineLink::new(engine, commands));
            Ok(tour)
        }
        ViewerVariant::Tiles => {
            let marker = AnchorMarker::new(&mut scene.meshes, &mut scene.materials);
            let mut rotation = TileRotation::from_params(&scene.params, marker)?;
            rotation.start(&mut scene.commands)?;
            scene.commands.insert_resource(rotation);
            if tour.is_some() {
                tracing::warn!("Tours need the photorealistic variant, ignoring tour");
            }
            Ok(None)
        }
    }
}

/// Spawn the globe camera at `start`, facing north and pitched down.
fn spawn_camera(commands: &mut Commands, start: Coordinate) {
    let position = start.to_ecef();
    let rotation = arrival_rotation(position, HeadingPitchRoll::arrival());

    // The camera's Transform stays at the origin; everything else is rendered relative to it.
    commands.spawn((
        Camera3d::default(),
        Camera {
            clear_color: bevy::camera::ClearColorConfig::Custom(Color::BLACK),
            ..default()
        },
        Transform::from_rotation(rotation),
        Projection::Perspective(PerspectiveProjection {
            fov: std::f32::consts::FRAC_PI_4,
            near: 1.0,
            far: 100_000_000.0, // 100,000 km to see the whole Earth.
            ..Default::default()
        }),
        // Disable tonemapping since we use unlit materials.
        Tonemapping::None,
        FloatingOriginCamera::new(position),
        GlobeCamera,
        ViewerEntity,
    ));
}

/// Spawn a plain ellipsoid standing in for the streamed globe.
#[allow(clippy::cast_possible_truncation)]
fn spawn_globe(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    let radii = Vec3::new(
        WGS84_SEMI_MAJOR as f32,
        WGS84_SEMI_MAJOR as f32,
        WGS84_SEMI_MINOR as f32,
    );
    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(1.0).mesh().uv(256, 128))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.16, 0.3, 0.5),
            unlit: true,
            ..default()
        })),
        WorldPosition::from_dvec3(DVec3::ZERO),
        Transform::from_scale(radii),
        ViewerEntity,
    ));
}

#[derive(SystemParam)]
struct TeardownParams<'w, 's> {
    commands: Commands<'w, 's>,
    entities: Query<'w, 's, Entity, With<ViewerEntity>>,
    flights: Res<'w, Flights>,
    rig: ResMut<'w, CameraRig>,
    rotation: Option<ResMut<'w, TileRotation>>,
    running: ResMut<'w, RunningTasks>,
    queue: ResMut<'w, FlightQueue>,
    geocoding: ResMut<'w, GeocodingState>,
}

impl TeardownParams<'_, '_> {
    fn teardown(&mut self) {
        self.flights.registry.unbind();
        self.flights.sequencer.detach();
        self.running.cancel_all();
        self.rig.clear();
        self.queue.clear();
        self.geocoding.reset();
        self.commands.remove_resource::<EngineLink>();

        if let Some(rotation) = self.rotation.as_mut() {
            rotation.shutdown(&mut self.commands);
            self.commands.remove_resource::<TileRotation>();
        }
        for entity in &self.entities {
            self.commands.entity(entity).despawn();
        }
    }
}

fn handle_retry(
    mut retry: ResMut<RetryRequest>,
    mut status: ResMut<ViewerStatus>,
    mut teardown: TeardownParams,
) {
    if !retry.take() {
        return;
    }
    tracing::info!("Retrying viewer initialization");
    teardown.teardown();
    *status = ViewerStatus::Loading;
}

fn teardown_on_exit(mut exits: MessageReader<AppExit>, flights: Res<Flights>) {
    if exits.read().next().is_some() {
        flights.registry.unbind();
        flights.sequencer.detach();
    }
}
