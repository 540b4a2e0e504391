//! Geographic helpers: distances, interpolated paths, local frames and
//! camera flight arcs.
//!
//! None of these touch the rendering engine; the viewer and the sequencer
//! both build on them.

use glam::{DMat3, DQuat, DVec3};

use crate::coordinate::Coordinate;

/// Mean Earth radius in kilometers, used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometers (haversine).
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Linearly interpolate `points + 1` coordinates from `start` to `end`.
///
/// Altitude is only interpolated when both ends carry one.
pub fn smooth_flight_path(start: &Coordinate, end: &Coordinate, points: usize) -> Vec<Coordinate> {
    let points = points.max(1);
    (0..=points)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 / points as f64;
            let altitude = match (start.altitude, end.altitude) {
                (Some(from), Some(to)) => Some(from + (to - from) * t),
                _ => None,
            };
            Coordinate {
                latitude: start.latitude + (end.latitude - start.latitude) * t,
                longitude: start.longitude + (end.longitude - start.longitude) * t,
                altitude,
            }
        })
        .collect()
}

/// Pick a viewing altitude in meters for a given travel distance in kilometers.
pub fn optimal_altitude(distance_km: f64) -> f64 {
    if distance_km < 1.0 {
        1_000.0 // Local.
    } else if distance_km < 10.0 {
        5_000.0 // City.
    } else if distance_km < 100.0 {
        15_000.0 // Regional.
    } else if distance_km < 1_000.0 {
        50_000.0 // Country.
    } else {
        100_000.0 // Continental.
    }
}

/// Local east/north/up axes at a point on the ellipsoid.
#[derive(Debug, Clone, Copy)]
pub struct EnuBasis {
    pub east: DVec3,
    pub north: DVec3,
    pub up: DVec3,
}

impl EnuBasis {
    /// Build the basis for a geodetic latitude/longitude in degrees.
    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
        let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
        Self {
            east: DVec3::new(-sin_lon, cos_lon, 0.0),
            north: DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat),
            up: DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat),
        }
    }

    /// Build the basis at an Earth-fixed position.
    pub fn at(position: DVec3) -> Self {
        let coordinate = Coordinate::from_ecef(position);
        Self::from_degrees(coordinate.latitude, coordinate.longitude)
    }

    /// View direction for a heading (clockwise from north) and pitch
    /// (negative looks down), both in radians.
    pub fn direction(&self, heading: f64, pitch: f64) -> DVec3 {
        let (sin_h, cos_h) = heading.sin_cos();
        let (sin_p, cos_p) = pitch.sin_cos();
        (self.east * sin_h + self.north * cos_h) * cos_p + self.up * sin_p
    }
}

/// Rotation that maps the local frame at a location to a Y-up world frame.
///
/// East becomes +X, north becomes -Z and up becomes +Y, so a globe rotated
/// by this quaternion has the location facing straight up.
pub fn y_up_frame(latitude: f64, longitude: f64) -> DQuat {
    let basis = EnuBasis::from_degrees(latitude, longitude);
    let local = DMat3::from_cols(basis.east, basis.north, basis.up);
    let world = DMat3::from_cols(DVec3::X, DVec3::NEG_Z, DVec3::Y);
    DQuat::from_mat3(&(world * local.transpose())).normalize()
}

/// Share of the surface distance added as extra height at the apex of a flight.
const ARC_LIFT_FACTOR: f64 = 0.25;

/// Great-circle flight path with a height bump capped at a maximum altitude.
#[derive(Debug, Clone, Copy)]
pub struct ArcTrajectory {
    start: DVec3,
    end: DVec3,
    /// Extra height at the midpoint of the flight, in meters.
    lift: f64,
}

impl ArcTrajectory {
    /// Plan an arc between two Earth-fixed positions.
    ///
    /// The apex never climbs above `maximum_height` unless one of the
    /// endpoints is already higher than that.
    pub fn new(start: DVec3, end: DVec3, maximum_height: f64) -> Self {
        let start_altitude = Coordinate::from_ecef(start).altitude_or_default();
        let end_altitude = Coordinate::from_ecef(end).altitude_or_default();

        let angle = start
            .normalize_or_zero()
            .dot(end.normalize_or_zero())
            .clamp(-1.0, 1.0)
            .acos();
        let surface_distance = angle * EARTH_RADIUS_KM * 1000.0;

        let headroom = (maximum_height - start_altitude.max(end_altitude)).max(0.0);
        let lift = (surface_distance * ARC_LIFT_FACTOR).min(headroom);

        Self { start, end, lift }
    }

    /// Extra height at the apex in meters.
    pub fn lift(&self) -> f64 {
        self.lift
    }

    /// Position at progress `s` in `[0, 1]`.
    pub fn position_at(&self, s: f64) -> DVec3 {
        let s = s.clamp(0.0, 1.0);
        let start_radius = self.start.length();
        let end_radius = self.end.length();
        let direction = slerp_unit(
            self.start.normalize_or_zero(),
            self.end.normalize_or_zero(),
            s,
        );
        let bump = self.lift * 4.0 * s * (1.0 - s);
        let radius = start_radius + (end_radius - start_radius) * s + bump;
        direction * radius
    }
}

/// Spherical interpolation between two unit vectors.
fn slerp_unit(a: DVec3, b: DVec3, t: f64) -> DVec3 {
    let angle = a.dot(b).clamp(-1.0, 1.0).acos();
    if angle < 1e-9 {
        return a.lerp(b, t).normalize_or_zero();
    }
    let sin_angle = angle.sin();
    if sin_angle.abs() < 1e-9 {
        // Antipodal: every great circle through `a` reaches `b`, take any one.
        return DQuat::from_axis_angle(a.any_orthonormal_vector(), t * angle) * a;
    }
    (a * ((1.0 - t) * angle).sin() + b * (t * angle).sin()) / sin_angle
}
