//! Mouse and keyboard globe controls.
//!
//! Dragging with the left button swings the camera around the point it is
//! looking at, the scroll wheel moves it closer or further away, and the
//! arrow keys turn it like a drag. The controls stand down while a flight or
//! orbit owns the camera.

use std::f64::consts::FRAC_PI_2;

use bevy::ecs::message::MessageReader;
use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy_egui::input::{egui_wants_any_keyboard_input, egui_wants_any_pointer_input};
use globe_flight::geo::EnuBasis;
use globe_flight::{Coordinate, HeadingPitchRange};
use glam::DVec3;

use crate::engine::{CameraRig, GlobeCamera, orbit_pose};
use crate::floating_origin::FloatingOriginCamera;

/// Closest the camera may get to the point it looks at, in meters.
pub const MIN_RANGE: f64 = 5.0;
/// Furthest the camera may get from the point it looks at, in meters.
pub const MAX_RANGE: f64 = 20_000_000.0;
/// Margin keeping the pitch off the horizon and off straight down.
const PITCH_MARGIN: f64 = 0.01;

/// Plugin for user camera controls.
pub struct GlobeControlsPlugin;

impl Plugin for GlobeControlsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ControlSettings>()
            .init_resource::<ControlInput>()
            .add_systems(
                Update,
                (
                    drag_to_rotate.run_if(not(egui_wants_any_pointer_input)),
                    scroll_to_zoom.run_if(not(egui_wants_any_pointer_input)),
                    keys_to_rotate.run_if(not(egui_wants_any_keyboard_input)),
                    apply_controls,
                )
                    .chain(),
            );
    }
}

/// Settings for the globe controls.
#[derive(Resource)]
pub struct ControlSettings {
    /// Radians per pixel of mouse drag.
    pub drag_sensitivity: f32,
    /// Radians per second while an arrow key is held.
    pub key_speed: f32,
    /// Range multiplier per scroll line.
    pub zoom_step: f64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            drag_sensitivity: 0.005,
            key_speed: 1.0,
            zoom_step: 1.15,
        }
    }
}

/// Input gathered this frame.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq)]
pub struct ControlInput {
    /// Heading change in radians, clockwise seen from above.
    pub heading: f64,
    /// Pitch change in radians; positive tilts towards the horizon.
    pub pitch: f64,
    /// Scroll lines; positive moves closer.
    pub zoom: f64,
}

impl ControlInput {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this input to an offset, keeping pitch and range in bounds.
    pub fn apply_to(self, offset: HeadingPitchRange, zoom_step: f64) -> HeadingPitchRange {
        HeadingPitchRange {
            heading: offset.heading + self.heading,
            pitch: (offset.pitch + self.pitch).clamp(-FRAC_PI_2 + PITCH_MARGIN, -PITCH_MARGIN),
            range: (offset.range * zoom_step.powf(-self.zoom)).clamp(MIN_RANGE, MAX_RANGE),
        }
    }
}

/// The point the camera looks at, and the camera's offset from it.
///
/// When the view misses the globe the point straight below the camera is
/// used instead.
pub fn pivot(position: DVec3, forward: DVec3) -> Option<(DVec3, HeadingPitchRange)> {
    let surface = Coordinate::from_ecef(position).with_altitude(0.0).to_ecef();
    let anchor = ray_sphere(position, forward, surface.length()).unwrap_or(surface);

    let to_anchor = anchor - position;
    let range = to_anchor.length();
    if range < f64::EPSILON {
        return None;
    }
    let direction = to_anchor / range;
    let basis = EnuBasis::at(anchor);
    Some((
        anchor,
        HeadingPitchRange {
            heading: direction.dot(basis.east).atan2(direction.dot(basis.north)),
            pitch: direction.dot(basis.up).clamp(-1.0, 1.0).asin(),
            range,
        },
    ))
}

/// First hit of a ray on a sphere centered at the origin.
fn ray_sphere(origin: DVec3, direction: DVec3, radius: f64) -> Option<DVec3> {
    let direction = direction.try_normalize()?;
    let b = origin.dot(direction);
    let c = origin.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    (t > 0.0).then(|| origin + direction * t)
}

fn drag_to_rotate(
    mouse: Res<ButtonInput<MouseButton>>,
    mut motion: MessageReader<MouseMotion>,
    settings: Res<ControlSettings>,
    mut input: ResMut<ControlInput>,
) {
    let delta: Vec2 = motion.read().map(|event| event.delta).sum();
    if !mouse.pressed(MouseButton::Left) || delta == Vec2::ZERO {
        return;
    }
    // Grab-and-drag: moving the mouse right swings the view left.
    input.heading -= f64::from(delta.x * settings.drag_sensitivity);
    input.pitch += f64::from(delta.y * settings.drag_sensitivity);
}

fn scroll_to_zoom(mut wheel: MessageReader<MouseWheel>, mut input: ResMut<ControlInput>) {
    for event in wheel.read() {
        // Normalize scroll value: web reports pixels, native reports lines.
        let lines = match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / 120.0,
        };
        input.zoom += f64::from(lines);
    }
}

fn keys_to_rotate(
    time: Res<Time>,
    keyboard: Res<ButtonInput<KeyCode>>,
    settings: Res<ControlSettings>,
    mut input: ResMut<ControlInput>,
) {
    let step = f64::from(settings.key_speed * time.delta_secs());
    if keyboard.pressed(KeyCode::ArrowLeft) {
        input.heading -= step;
    }
    if keyboard.pressed(KeyCode::ArrowRight) {
        input.heading += step;
    }
    if keyboard.pressed(KeyCode::ArrowUp) {
        input.pitch += step;
    }
    if keyboard.pressed(KeyCode::ArrowDown) {
        input.pitch -= step;
    }
}

/// Move the camera by this frame's input unless the rig owns it.
fn apply_controls(
    rig: Res<CameraRig>,
    settings: Res<ControlSettings>,
    mut input: ResMut<ControlInput>,
    mut camera: Query<(&mut FloatingOriginCamera, &mut Transform), With<GlobeCamera>>,
) {
    let pending = std::mem::take(&mut *input);
    if pending.is_empty() || rig.is_active() {
        return;
    }
    let Ok((mut origin_camera, mut transform)) = camera.single_mut() else {
        return;
    };

    let forward = transform.forward().as_vec3().as_dvec3();
    let Some((anchor, offset)) = pivot(origin_camera.position, forward) else {
        return;
    };
    let (position, rotation) = orbit_pose(anchor, pending.apply_to(offset, settings.zoom_step));
    origin_camera.position = position;
    transform.rotation = rotation;
}
