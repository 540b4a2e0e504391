//! Options controlling a flight sequence.

use serde::{Deserialize, Serialize};

/// Default flight duration per leg in milliseconds.
pub const DEFAULT_DURATION_MS: u64 = 2000;

/// Easing curve applied to a camera transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
}

impl Easing {
    /// Map linear progress `t` to eased progress. Both are in `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Which legs of a sequence leave the camera orbiting their destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrbitPolicy {
    /// Orbit only once the whole sequence has arrived.
    #[default]
    FinalLeg,
    /// Orbit after every leg; the next leg tears the orbit down again.
    EveryLeg,
}

/// Animation settings for [`FlightSequencer::fly_to`](crate::FlightSequencer::fly_to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationOptions {
    /// Duration of each leg in milliseconds.
    pub duration_ms: u64,
    /// Easing curve handed to the engine.
    pub easing: Easing,
    /// Whether arriving at a destination starts an orbit around it.
    pub look_at_target: bool,
    /// Which legs start an orbit.
    pub orbit: OrbitPolicy,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_DURATION_MS,
            easing: Easing::default(),
            look_at_target: true,
            orbit: OrbitPolicy::default(),
        }
    }
}

impl AnimationOptions {
    /// Return a copy with a different per-leg duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Return a copy with a different orbit policy.
    #[must_use]
    pub fn with_orbit(mut self, orbit: OrbitPolicy) -> Self {
        self.orbit = orbit;
        self
    }

    /// Per-leg duration in seconds, the unit the engine works in.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}
