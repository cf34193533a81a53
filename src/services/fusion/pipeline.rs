//! Periodic positioning tick
//!
//! What a tick does depends on the positioning mode:
//! - Smart: consume sensors, dead-reckon, rail-snap, count heading corrections
//! - Assisted: rail-snap the current estimate only
//! - Manual: nothing; positions change only through explicit inputs

use super::{FusionEngine, PositionInput, PositioningEvent, SNAP_EPSILON};
use crate::domain::types::{
    FusedPosition, PositionSource, PositioningMode, SensorConfidence, WalkingState,
};
use crate::io::sensor_feed::SensorSource;
use crate::services::graph::NavigationGraph;
use std::time::Instant;
use tracing::{debug, info};

impl FusionEngine {
    /// Run one positioning tick now
    pub fn tick(
        &mut self,
        mode: PositioningMode,
        sensors: &mut dyn SensorSource,
        graph: &NavigationGraph,
    ) -> Option<FusedPosition> {
        self.tick_at(Instant::now(), mode, sensors, graph)
    }

    /// Run one positioning tick at `now`
    ///
    /// Returns the emitted position, if any.
    pub fn tick_at(
        &mut self,
        now: Instant,
        mode: PositioningMode,
        sensors: &mut dyn SensorSource,
        graph: &NavigationGraph,
    ) -> Option<FusedPosition> {
        match mode {
            PositioningMode::Manual => None,
            PositioningMode::Assisted => self.snap_only(graph),
            PositioningMode::Smart => self.sensor_tick(now, sensors, graph),
        }
    }

    fn sensor_tick(
        &mut self,
        now: Instant,
        sensors: &mut dyn SensorSource,
        graph: &NavigationGraph,
    ) -> Option<FusedPosition> {
        if sensors.walking_state() == WalkingState::Still {
            // Frozen: re-emit without consuming sensors
            let current = self.current.clone()?;
            self.events.send_position(&current);
            return Some(current);
        }

        let steps = sensors.take_steps();
        let reading = sensors.heading();
        let tilt = sensors.tilt();
        let last_heading = self.current.as_ref()?.heading;

        let (heading, sensor_confidence) = match reading {
            Some(r) if tilt.abs() <= self.config.tilt_limit_deg => (r.degrees, r.confidence),
            Some(_) => {
                debug!(tilt = %tilt, "compass_tilted");
                (last_heading, SensorConfidence::Low)
            }
            None => (last_heading, SensorConfidence::Low),
        };

        let input = PositionInput::DeadReckoning {
            steps,
            heading,
            sensor_confidence,
            walking: WalkingState::Walking,
        };
        let (position, refinement) = self.apply_refined(input, Some(graph))?;

        if refinement.is_some_and(|r| r.heading_corrected) {
            self.record_correction(now);
        }
        Some(position)
    }

    /// Assisted mode: pin the current estimate to the nearest edge
    fn snap_only(&mut self, graph: &NavigationGraph) -> Option<FusedPosition> {
        let before = self.current.clone()?;
        let refinement = self.refine(graph, PositionSource::RailSnap);

        let moved = refinement.snap.as_ref().is_some_and(|s| s.distance > SNAP_EPSILON);
        let current = self.current.as_ref()?;
        if !moved && !refinement.heading_corrected && current.source == before.source {
            return None;
        }
        self.publish()
    }

    /// Count a heading correction; advise manual mode past the limit
    pub(crate) fn record_correction(&mut self, now: Instant) {
        if let Some(ref m) = self.metrics {
            m.record_heading_correction();
        }

        let window = self.config.correction_window;
        self.corrections.push_back(now);
        while let Some(&oldest) = self.corrections.front() {
            if now.saturating_duration_since(oldest) > window {
                self.corrections.pop_front();
            } else {
                break;
            }
        }

        let count = self.corrections.len();
        if count > self.config.correction_limit {
            info!(
                corrections = %count,
                window_secs = %window.as_secs(),
                "consider_manual_mode"
            );
            self.events.send_positioning(PositioningEvent::ConsiderManualMode {
                corrections: count,
                window_secs: window.as_secs(),
            });
            if let Some(ref m) = self.metrics {
                m.record_manual_advisory();
            }
            self.corrections.clear();
        }
    }

    /// Heading corrections inside the current window
    pub fn recent_corrections(&self) -> usize {
        self.corrections.len()
    }
}
