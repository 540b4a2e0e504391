//! Timer-driven cycling of the tile source through a fixed list of places.
//!
//! The rotator owns no timer; the host calls [`LocationRotator::tick`] on
//! its own schedule (every [`LocationRotator::interval`]). Each tick is a
//! destructive replace: the old tile source is disposed and a new one is
//! built, oriented for the next location.

use std::time::Duration;

use glam::DQuat;

use crate::error::{Error, Result};
use crate::geo::y_up_frame;
use crate::locations::NamedLocation;

/// Interval between rotations when none is configured.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_millis(5000);

/// Builds and releases tile sources anchored at a location.
pub trait TileSourceFactory {
    type Source;

    /// Build a tile source for `location`, rotated by `frame` so the
    /// location faces up.
    fn create(&mut self, location: &NamedLocation, frame: DQuat) -> Result<Self::Source>;

    /// Unregister and release a tile source.
    fn dispose(&mut self, source: Self::Source);
}

/// Cycles through `locations`, rebuilding the tile source on every tick.
pub struct LocationRotator<S> {
    locations: Vec<NamedLocation>,
    index: usize,
    interval: Duration,
    source: Option<S>,
}

impl<S> LocationRotator<S> {
    /// Create a rotator positioned at the first location.
    pub fn new(locations: Vec<NamedLocation>, interval: Duration) -> Result<Self> {
        if locations.is_empty() {
            return Err(Error::EmptyRotation);
        }
        Ok(Self {
            locations,
            index: 0,
            interval,
            source: None,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn current_location(&self) -> &NamedLocation {
        &self.locations[self.index]
    }

    /// The live tile source, if the last build succeeded.
    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    /// Build the tile source for the current location if there is none.
    pub fn start<F>(&mut self, factory: &mut F) -> Result<()>
    where
        F: TileSourceFactory<Source = S>,
    {
        if self.source.is_some() {
            return Ok(());
        }
        self.rebuild(factory)
    }

    /// Advance to the next location and replace the tile source.
    ///
    /// A failed build is logged and returned; the rotator then has no tile
    /// source until the next tick.
    pub fn tick<F>(&mut self, factory: &mut F) -> Result<()>
    where
        F: TileSourceFactory<Source = S>,
    {
        self.index = (self.index + 1) % self.locations.len();
        if let Some(source) = self.source.take() {
            factory.dispose(source);
        }
        self.rebuild(factory)
    }

    /// Release the current tile source.
    pub fn shutdown<F>(&mut self, factory: &mut F)
    where
        F: TileSourceFactory<Source = S>,
    {
        if let Some(source) = self.source.take() {
            factory.dispose(source);
        }
    }

    fn rebuild<F>(&mut self, factory: &mut F) -> Result<()>
    where
        F: TileSourceFactory<Source = S>,
    {
        let location = &self.locations[self.index];
        let coordinate = location.coordinate;
        let frame = y_up_frame(coordinate.latitude, coordinate.longitude);

        match factory.create(location, frame) {
            Ok(source) => {
                tracing::info!("Tile source centered on {}", location.name);
                self.source = Some(source);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to build tile source for {}: {e}", location.name);
                Err(e)
            }
        }
    }
}
