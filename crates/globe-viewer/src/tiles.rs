//! Tile source anchors and the timer that rotates them between locations.
//!
//! The tile source itself is represented by an anchor entity: it records
//! where the tileset is centered and how it is configured, and carries a
//! marker mesh. Each rotation despawns the anchor and spawns a fresh one.

use std::fmt;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use globe_flight::engine::ORBIT_OFFSET;
use globe_flight::geo::EnuBasis;
use globe_flight::locations::world_locations;
use globe_flight::{Error, LocationRotator, NamedLocation, TileSourceFactory};
use glam::DQuat;

use crate::engine::GlobeCamera;
use crate::floating_origin::{FloatingOriginCamera, WorldPosition};
use crate::launch_params::LaunchParams;

/// Edge length of the anchor marker in meters.
const MARKER_SIZE: f32 = 40.0;

/// Plugin for rotating the tile source between locations.
pub struct TilesPlugin;

impl Plugin for TilesPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (rotate_tile_source, frame_new_anchor)
                .chain()
                .run_if(resource_exists::<TileRotation>),
        );
    }
}

/// Where the tile source streams from.
#[derive(Clone)]
pub struct TileSourceConfig {
    pub ion_asset_id: u64,
    pub ion_token: Option<String>,
}

impl TileSourceConfig {
    pub fn from_params(params: &LaunchParams) -> Self {
        Self {
            ion_asset_id: params.ion_asset_id,
            ion_token: params.ion_token.clone(),
        }
    }
}

impl fmt::Debug for TileSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileSourceConfig")
            .field("ion_asset_id", &self.ion_asset_id)
            .field("ion_token", &self.ion_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A live tile source centered on a location.
#[derive(Component, Debug)]
pub struct TileAnchor {
    pub location: String,
    pub config: TileSourceConfig,
}

/// Shared marker mesh and material for anchors.
#[derive(Clone)]
pub struct AnchorMarker {
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
}

impl AnchorMarker {
    pub fn new(meshes: &mut Assets<Mesh>, materials: &mut Assets<StandardMaterial>) -> Self {
        Self {
            mesh: meshes.add(Cuboid::from_length(MARKER_SIZE)),
            material: materials.add(StandardMaterial {
                base_color: Color::srgb(0.9, 0.6, 0.1),
                unlit: true,
                ..default()
            }),
        }
    }
}

/// The rotator and the timer that drives it.
#[derive(Resource)]
pub struct TileRotation {
    rotator: LocationRotator<Entity>,
    timer: Timer,
    marker: AnchorMarker,
    config: TileSourceConfig,
}

impl TileRotation {
    /// Rotate through the world presets every `params.rotation_interval()`.
    pub fn from_params(params: &LaunchParams, marker: AnchorMarker) -> globe_flight::Result<Self> {
        let interval = params.rotation_interval();
        Ok(Self {
            rotator: LocationRotator::new(world_locations(), interval)?,
            timer: Timer::new(interval, TimerMode::Repeating),
            marker,
            config: TileSourceConfig::from_params(params),
        })
    }

    pub fn current_location(&self) -> &NamedLocation {
        self.rotator.current_location()
    }

    /// Seconds until the next rotation.
    pub fn remaining_secs(&self) -> f32 {
        self.timer.remaining_secs()
    }

    /// Build the first tile source.
    pub fn start(&mut self, commands: &mut Commands) -> globe_flight::Result<()> {
        let mut factory = AnchorFactory {
            commands,
            marker: &self.marker,
            config: &self.config,
        };
        self.rotator.start(&mut factory)
    }

    /// Release the current tile source.
    pub fn shutdown(&mut self, commands: &mut Commands) {
        let mut factory = AnchorFactory {
            commands,
            marker: &self.marker,
            config: &self.config,
        };
        self.rotator.shutdown(&mut factory);
    }
}

/// Spawns and despawns anchor entities.
struct AnchorFactory<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
    marker: &'a AnchorMarker,
    config: &'a TileSourceConfig,
}

impl TileSourceFactory for AnchorFactory<'_, '_, '_> {
    type Source = Entity;

    fn create(&mut self, location: &NamedLocation, frame: DQuat) -> globe_flight::Result<Entity> {
        let coordinate = location
            .coordinate
            .validated()
            .map_err(|e| Error::TileSource {
                location: location.name.to_string(),
                message: e.to_string(),
            })?;

        // Surface anchor: the tileset sits on the ground, not at the view altitude.
        let surface = coordinate.with_altitude(0.0).to_ecef();
        // `frame` turns the local frame Y-up; its inverse puts the marker's
        // Y axis along the local vertical.
        let entity = self
            .commands
            .spawn((
                TileAnchor {
                    location: location.name.to_string(),
                    config: self.config.clone(),
                },
                WorldPosition::from_dvec3(surface).with_rotation(frame.inverse()),
                Transform::default(),
                Mesh3d(self.marker.mesh.clone()),
                MeshMaterial3d(self.marker.material.clone()),
            ))
            .id();
        Ok(entity)
    }

    fn dispose(&mut self, source: Entity) {
        self.commands.entity(source).despawn();
    }
}

#[derive(SystemParam)]
struct RotationParams<'w, 's> {
    commands: Commands<'w, 's>,
    time: Res<'w, Time>,
    rotation: ResMut<'w, TileRotation>,
}

fn rotate_tile_source(mut params: RotationParams) {
    let rotation = &mut *params.rotation;
    if !rotation.timer.tick(params.time.delta()).just_finished() {
        return;
    }

    let mut factory = AnchorFactory {
        commands: &mut params.commands,
        marker: &rotation.marker,
        config: &rotation.config,
    };
    // Failures are logged by the rotator; the next tick moves on.
    let _ = rotation.rotator.tick(&mut factory);
}

/// Put the camera over a freshly spawned anchor, looking down at it from
/// the altitude its location asks for.
fn frame_new_anchor(
    rotation: Res<TileRotation>,
    anchors: Query<&WorldPosition, Added<TileAnchor>>,
    mut camera: Query<(&mut FloatingOriginCamera, &mut Transform), With<GlobeCamera>>,
) {
    let Some(anchor) = anchors.iter().last() else {
        return;
    };
    let Ok((mut origin_camera, mut transform)) = camera.single_mut() else {
        return;
    };

    let range = rotation.current_location().coordinate.altitude_or_default();
    let basis = EnuBasis::at(anchor.position);
    let direction = basis.direction(ORBIT_OFFSET.heading, ORBIT_OFFSET.pitch);
    origin_camera.position = anchor.position - direction * range;
    transform.rotation = Transform::IDENTITY
        .looking_to(direction.as_vec3(), basis.up.as_vec3())
        .rotation;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bevy::ecs::system::RunSystemOnce;
    use globe_flight::geo::y_up_frame;

    use super::*;

    #[test]
    fn test_token_is_redacted() {
        let config = TileSourceConfig {
            ion_asset_id: 2_275_207,
            ion_token: Some("secret-token".to_string()),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("2275207"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_rotation_starts_at_first_preset() {
        let mut meshes = Assets::<Mesh>::default();
        let mut materials = Assets::<StandardMaterial>::default();
        let marker = AnchorMarker::new(&mut meshes, &mut materials);
        let rotation = TileRotation::from_params(&LaunchParams::default(), marker).unwrap();
        assert_eq!(rotation.current_location().name, "St. Thomas");
        assert!((rotation.remaining_secs() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_anchor_marker_points_up() {
        let location = world_locations().remove(3);
        let coordinate = location.coordinate;
        let frame = y_up_frame(coordinate.latitude, coordinate.longitude);
        let up = EnuBasis::from_degrees(coordinate.latitude, coordinate.longitude).up;
        assert!((frame.inverse() * glam::DVec3::Y).distance(up) < 1e-9);
    }

    #[test]
    fn test_factory_spawns_and_despawns() {
        let mut world = World::new();
        let mut meshes = Assets::<Mesh>::default();
        let mut materials = Assets::<StandardMaterial>::default();
        let marker = AnchorMarker::new(&mut meshes, &mut materials);
        let config = TileSourceConfig {
            ion_asset_id: 1,
            ion_token: None,
        };

        let (spawn_marker, spawn_config) = (marker.clone(), config.clone());
        let entity = world
            .run_system_once(move |mut commands: Commands| {
                let mut factory = AnchorFactory {
                    commands: &mut commands,
                    marker: &spawn_marker,
                    config: &spawn_config,
                };
                let location = world_locations().remove(0);
                factory.create(&location, DQuat::IDENTITY).unwrap()
            })
            .unwrap();

        let anchor = world.get::<TileAnchor>(entity).unwrap();
        assert_eq!(anchor.location, "St. Thomas");
        assert_eq!(anchor.config.ion_asset_id, 1);

        let (dispose_marker, dispose_config) = (marker.clone(), config.clone());
        world
            .run_system_once(move |mut commands: Commands| {
                let mut factory = AnchorFactory {
                    commands: &mut commands,
                    marker: &dispose_marker,
                    config: &dispose_config,
                };
                factory.dispose(entity);
            })
            .unwrap();
        assert!(world.get_entity(entity).is_err());

        let bad = NamedLocation::new("Nowhere", globe_flight::Coordinate::new(100.0, 0.0));
        let result = world
            .run_system_once(move |mut commands: Commands| {
                let mut factory = AnchorFactory {
                    commands: &mut commands,
                    marker: &marker,
                    config: &config,
                };
                factory.create(&bad, DQuat::IDENTITY).map(|_| ())
            })
            .unwrap();
        assert!(matches!(result, Err(Error::TileSource { .. })));
    }

    #[test]
    fn test_timer_replaces_anchor() {
        let mut world = World::new();
        let mut meshes = Assets::<Mesh>::default();
        let mut materials = Assets::<StandardMaterial>::default();
        let marker = AnchorMarker::new(&mut meshes, &mut materials);
        let rotation = TileRotation::from_params(&LaunchParams::default(), marker).unwrap();
        world.insert_resource(rotation);
        world.insert_resource(Time::<()>::default());
        let camera = world
            .spawn((
                FloatingOriginCamera::new(glam::DVec3::ZERO),
                Transform::default(),
                GlobeCamera,
            ))
            .id();

        world
            .run_system_once(|mut commands: Commands, mut rotation: ResMut<TileRotation>| {
                rotation.start(&mut commands)
            })
            .unwrap()
            .unwrap();
        let mut anchors = world.query_filtered::<Entity, With<TileAnchor>>();
        let first = anchors.single(&world).unwrap();

        let mut schedule = Schedule::default();
        schedule.add_systems((rotate_tile_source, frame_new_anchor).chain());

        // Not due yet.
        world
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs(1));
        schedule.run(&mut world);
        assert_eq!(anchors.single(&world).unwrap(), first);

        world
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs(4));
        schedule.run(&mut world);

        assert!(world.get_entity(first).is_err());
        let second = anchors.single(&world).unwrap();
        let expected = world_locations().remove(1);
        assert_eq!(world.get::<TileAnchor>(second).unwrap().location, expected.name);
        assert_eq!(
            world.resource::<TileRotation>().current_location().name,
            expected.name
        );

        let anchor = world.get::<WorldPosition>(second).unwrap().position;
        let position = world.get::<FloatingOriginCamera>(camera).unwrap().position;
        let range = expected.coordinate.altitude_or_default();
        assert!((position.distance(anchor) - range).abs() < 1e-3);
    }
}
