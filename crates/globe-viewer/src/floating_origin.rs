//! Floating origin system for rendering the globe with f32 precision.
//!
//! Earth-fixed coordinates are millions of meters, which causes f32
//! precision issues. Positions are stored in f64 and rendered relative to
//! the globe camera, keeping all rendered positions small.

use bevy::prelude::*;
use glam::{DQuat, DVec3};

/// Plugin for floating origin coordinate system.
pub struct FloatingOriginPlugin;

impl Plugin for FloatingOriginPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FloatingOrigin>().add_systems(
            PostUpdate,
            (sync_floating_origin, update_transforms_relative_to_origin)
                .chain()
                .before(bevy::transform::TransformSystems::Propagate),
        );
    }
}

/// The floating origin position in Earth-fixed coordinates.
#[derive(Resource, Default)]
pub struct FloatingOrigin {
    /// Current origin position in meters.
    pub position: DVec3,
}

/// High-precision pose for an entity.
///
/// The entity's `Transform` is rewritten every frame to be relative to the
/// [`FloatingOrigin`].
#[derive(Component, Clone, Debug)]
pub struct WorldPosition {
    /// Position in Earth-fixed coordinates (meters).
    pub position: DVec3,
    /// Orientation in Earth-fixed axes.
    pub rotation: DQuat,
}

impl WorldPosition {
    pub fn from_dvec3(position: DVec3) -> Self {
        Self {
            position,
            rotation: DQuat::IDENTITY,
        }
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: DQuat) -> Self {
        self.rotation = rotation;
        self
    }
}

/// The camera that defines the floating origin.
///
/// Its `Transform` stays at the origin; only its rotation is meaningful.
#[derive(Component)]
pub struct FloatingOriginCamera {
    /// Camera's position in Earth-fixed coordinates (meters).
    pub position: DVec3,
}

impl FloatingOriginCamera {
    pub fn new(position: DVec3) -> Self {
        Self { position }
    }
}

/// Move the origin to wherever the camera ended up this frame.
fn sync_floating_origin(mut origin: ResMut<FloatingOrigin>, query: Query<&FloatingOriginCamera>) {
    if let Ok(camera) = query.single() {
        origin.position = camera.position;
    }
}

fn update_transforms_relative_to_origin(
    origin: Res<FloatingOrigin>,
    mut query: Query<(&WorldPosition, &mut Transform), Without<FloatingOriginCamera>>,
) {
    for (world_pos, mut transform) in &mut query {
        let relative = world_pos.position - origin.position;
        transform.translation = relative.as_vec3();
        transform.rotation = world_pos.rotation.as_quat();
    }
}
