//! Motion sensor seam
//!
//! Raw accelerometer/compass acquisition lives outside the core. Producers
//! push readings into a [`SensorFeed`]; the positioning tick consumes them
//! through the [`SensorSource`] trait.

use crate::domain::types::{SensorConfidence, WalkingState};
use parking_lot::Mutex;
use std::sync::Arc;

/// Compass reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingReading {
    /// Degrees, 0 = north
    pub degrees: f64,
    pub confidence: SensorConfidence,
}

/// What the positioning tick reads from the sensors
pub trait SensorSource {
    fn walking_state(&self) -> WalkingState;
    /// Steps accumulated since the previous call
    fn take_steps(&mut self) -> u32;
    /// Latest compass reading, if any arrived
    fn heading(&self) -> Option<HeadingReading>;
    /// Device tilt from level, degrees
    fn tilt(&self) -> f64;
}

#[derive(Debug, Default)]
struct FeedState {
    walking: WalkingState,
    steps: u32,
    heading: Option<HeadingReading>,
    tilt: f64,
}

/// Push-based sensor accumulator
///
/// Cheap to clone; all clones share the same readings.
#[derive(Debug, Clone, Default)]
pub struct SensorFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl SensorFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_walking(&self, state: WalkingState) {
        self.inner.lock().walking = state;
    }

    /// Add detected steps
    pub fn push_steps(&self, steps: u32) {
        let mut state = self.inner.lock();
        state.steps = state.steps.saturating_add(steps);
    }

    pub fn set_heading(&self, degrees: f64, confidence: SensorConfidence) {
        self.inner.lock().heading = Some(HeadingReading { degrees, confidence });
    }

    pub fn set_tilt(&self, degrees: f64) {
        self.inner.lock().tilt = degrees;
    }

    /// Steps waiting to be consumed
    pub fn pending_steps(&self) -> u32 {
        self.inner.lock().steps
    }
}

impl SensorSource for SensorFeed {
    fn walking_state(&self) -> WalkingState {
        self.inner.lock().walking
    }

    fn take_steps(&mut self) -> u32 {
        std::mem::take(&mut self.inner.lock().steps)
    }

    fn heading(&self) -> Option<HeadingReading> {
        self.inner.lock().heading
    }

    fn tilt(&self) -> f64 {
        self.inner.lock().tilt
    }
}
