//! Position fusion: one owned position estimate behind one update entry point
//!
//! Inputs are ranked by source priority when they arrive together:
//! QR > visual landmark > dead reckoning > manual override. Every accepted
//! input is followed by a rail-snap correction pass when a graph is supplied.
//!
//! The periodic positioning tick lives in `pipeline`.

mod pipeline;

use crate::domain::geometry::{normalize_heading, weighted_heading_mean, Point};
use crate::domain::types::{
    epoch_ms, Confidence, FloorId, FusedPosition, Node, PositionSource, PositioningMode,
    SensorConfidence, WalkingState,
};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::event_channel::EventSender;
use crate::services::graph::NavigationGraph;
use crate::services::rail_snap::{EdgeSnap, RailSnapConfig, RailSnapper};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Weight of the compass tier in the dead-reckoning confidence score
const SENSOR_WEIGHT: f64 = 0.6;
/// Weight of the drift factor in the dead-reckoning confidence score
const DRIFT_WEIGHT: f64 = 0.4;

/// (sensor factor, drift factor) after each kind of reset
const QR_FACTORS: (f64, f64) = (1.0, 1.0);
const LANDMARK_FACTORS: (f64, f64) = (0.9, 0.9);
const MANUAL_FACTORS: (f64, f64) = (0.7, 0.9);

/// Below this a rail snap is considered a no-op
const SNAP_EPSILON: f64 = 1e-6;

/// Fusion parameters
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Meters per detected step
    pub step_length: f64,
    /// Compass readings kept for heading smoothing
    pub heading_window: usize,
    /// Drift factor multiplier per dead-reckoning update
    pub drift_decay: f64,
    /// Drift factor multiplier after a successful rail snap
    pub snap_trust_gain: f64,
    /// Minimum match score for a visual landmark to be trusted
    pub landmark_min_score: f64,
    /// Tilt beyond which the compass is ignored
    pub tilt_limit_deg: f64,
    /// Heading corrections tolerated inside `correction_window`
    pub correction_limit: usize,
    pub correction_window: Duration,
    pub rail: RailSnapConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            step_length: 0.7,
            heading_window: 5,
            drift_decay: 0.98,
            snap_trust_gain: 1.05,
            landmark_min_score: 0.8,
            tilt_limit_deg: 45.0,
            correction_limit: 5,
            correction_window: Duration::from_secs(120),
            rail: RailSnapConfig::default(),
        }
    }
}

impl FusionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            step_length: config.step_length(),
            heading_window: config.heading_window().max(1),
            drift_decay: config.drift_decay(),
            snap_trust_gain: config.snap_trust_gain(),
            landmark_min_score: config.landmark_min_score(),
            tilt_limit_deg: config.tilt_limit_deg(),
            correction_limit: config.correction_limit(),
            correction_window: config.correction_window(),
            rail: RailSnapConfig::from_config(config),
        }
    }
}

/// One position input
#[derive(Debug, Clone, PartialEq)]
pub enum PositionInput {
    /// Scanned QR code at a known node; absolute ground truth
    Qr { node: Node, heading: Option<f64> },
    /// Recognized landmark at a node with a match score in [0, 1]
    Landmark { node: Node, score: f64, heading: Option<f64> },
    /// Steps along a compass heading
    DeadReckoning {
        steps: u32,
        heading: f64,
        sensor_confidence: SensorConfidence,
        walking: WalkingState,
    },
    /// User-placed position
    Manual { point: Point, floor: FloorId, heading: f64 },
    /// Ground truth from a simulated walker, treated like a manual override
    Simulated { point: Point, floor: FloorId, heading: f64 },
}

impl PositionInput {
    pub fn source(&self) -> PositionSource {
        match self {
            PositionInput::Qr { .. } => PositionSource::Qr,
            PositionInput::Landmark { .. } => PositionSource::VisualLandmark,
            PositionInput::DeadReckoning { .. } => PositionSource::DeadReckoning,
            PositionInput::Manual { .. } => PositionSource::Manual,
            PositionInput::Simulated { .. } => PositionSource::Simulated,
        }
    }
}

/// Advisories and mode changes from the positioning layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum PositioningEvent {
    /// Too many heading corrections in the window; never switches mode by itself
    ConsiderManualMode { corrections: usize, window_secs: u64 },
    ModeChanged { from: PositioningMode, to: PositioningMode, reason: String },
    /// Estimate is farther than the off-path distance from every valid edge
    OffPath { distance: Option<f64> },
}

/// Result of a rail-snap correction pass
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// Nearest valid edge, if the floor has one
    pub snap: Option<EdgeSnap>,
    pub heading_corrected: bool,
    pub off_path: bool,
}

/// Position fusion engine
pub struct FusionEngine {
    pub(crate) config: FusionConfig,
    pub(crate) snapper: RailSnapper,
    pub(crate) current: Option<FusedPosition>,
    /// Tier value of the last compass reading, or the reset value
    pub(crate) sensor_factor: f64,
    /// Decays with every dead-reckoning step, restored by resets and snaps
    pub(crate) drift_factor: f64,
    /// Raw compass readings, oldest first
    pub(crate) headings: VecDeque<f64>,
    /// Timestamps of recent heading corrections
    pub(crate) corrections: VecDeque<Instant>,
    pub(crate) off_path: bool,
    pub(crate) events: EventSender,
    pub(crate) metrics: Option<Arc<Metrics>>,
}

impl FusionEngine {
    pub fn new(config: FusionConfig, events: EventSender) -> Self {
        let snapper = RailSnapper::new(config.rail.clone());
        Self {
            config,
            snapper,
            current: None,
            sensor_factor: SensorConfidence::Medium.value(),
            drift_factor: 1.0,
            headings: VecDeque::new(),
            corrections: VecDeque::new(),
            off_path: false,
            events,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn current(&self) -> Option<&FusedPosition> {
        self.current.as_ref()
    }

    pub fn sensor_factor(&self) -> f64 {
        self.sensor_factor
    }

    pub fn drift_factor(&self) -> f64 {
        self.drift_factor
    }

    pub fn snapper(&self) -> &RailSnapper {
        &self.snapper
    }

    /// Apply one input, then rail-snap against `graph` if given
    ///
    /// Returns the new position, or `None` when the input was dropped
    /// (low-score landmark, standing still, no steps, no prior fix).
    pub fn apply(
        &mut self,
        input: PositionInput,
        graph: Option<&NavigationGraph>,
    ) -> Option<FusedPosition> {
        self.apply_refined(input, graph).map(|(position, _)| position)
    }

    /// Apply the highest-priority input that is accepted
    ///
    /// Dropped inputs fall through to the next one in priority order.
    pub fn apply_batch(
        &mut self,
        mut inputs: Vec<PositionInput>,
        graph: Option<&NavigationGraph>,
    ) -> Option<FusedPosition> {
        inputs.sort_by_key(|input| std::cmp::Reverse(input.source().priority()));
        for input in inputs {
            if let Some(position) = self.apply(input, graph) {
                return Some(position);
            }
        }
        None
    }

    pub(crate) fn apply_refined(
        &mut self,
        input: PositionInput,
        graph: Option<&NavigationGraph>,
    ) -> Option<(FusedPosition, Option<Refinement>)> {
        let source = input.source();
        if !self.update(input) {
            return None;
        }

        let refinement = graph.map(|g| self.refine(g, source));
        let position = self.publish()?;
        Some((position, refinement))
    }

    /// Fold one input into the state; false when it was dropped
    fn update(&mut self, input: PositionInput) -> bool {
        match input {
            PositionInput::Qr { node, heading } => {
                let heading = heading.or(self.current.as_ref().map(|p| p.heading)).unwrap_or(0.0);
                self.reset_to(
                    node.position(),
                    node.floor.clone(),
                    heading,
                    Confidence::High,
                    PositionSource::Qr,
                    QR_FACTORS,
                );
                self.headings.clear();
                info!(node_id = %node.id, floor = %node.floor, "qr_reset");
                true
            }
            PositionInput::Landmark { node, score, heading } => {
                if score < self.config.landmark_min_score {
                    debug!(node_id = %node.id, score = %score, "landmark_rejected");
                    if let Some(ref m) = self.metrics {
                        m.record_landmark_rejected();
                    }
                    return false;
                }
                let heading = heading.or(self.current.as_ref().map(|p| p.heading)).unwrap_or(0.0);
                self.reset_to(
                    node.position(),
                    node.floor.clone(),
                    heading,
                    Confidence::High,
                    PositionSource::VisualLandmark,
                    LANDMARK_FACTORS,
                );
                info!(node_id = %node.id, score = %score, "landmark_reset");
                true
            }
            PositionInput::DeadReckoning { steps, heading, sensor_confidence, walking } => {
                self.dead_reckon(steps, heading, sensor_confidence, walking)
            }
            PositionInput::Manual { point, floor, heading } => {
                info!(x = %point.x, y = %point.y, floor = %floor, "manual_position");
                let source = PositionSource::Manual;
                self.reset_to(point, floor, heading, Confidence::Medium, source, MANUAL_FACTORS);
                self.headings.clear();
                true
            }
            PositionInput::Simulated { point, floor, heading } => {
                debug!(x = %point.x, y = %point.y, floor = %floor, "simulated_position");
                let source = PositionSource::Simulated;
                self.reset_to(point, floor, heading, Confidence::Medium, source, MANUAL_FACTORS);
                self.headings.clear();
                true
            }
        }
    }

    fn reset_to(
        &mut self,
        point: Point,
        floor: FloorId,
        heading: f64,
        confidence: Confidence,
        source: PositionSource,
        (sensor, drift): (f64, f64),
    ) {
        self.sensor_factor = sensor;
        self.drift_factor = drift;
        self.current = Some(FusedPosition {
            x: point.x,
            y: point.y,
            floor,
            heading: normalize_heading(heading),
            confidence,
            source,
            timestamp: epoch_ms(),
        });
    }

    fn dead_reckon(
        &mut self,
        steps: u32,
        heading: f64,
        sensor_confidence: SensorConfidence,
        walking: WalkingState,
    ) -> bool {
        if walking == WalkingState::Still {
            return false;
        }
        if steps == 0 {
            return false;
        }
        let Some(current) = self.current.as_ref() else {
            debug!(steps = %steps, "dead_reckoning_without_fix");
            return false;
        };

        self.headings.push_back(heading);
        while self.headings.len() > self.config.heading_window {
            self.headings.pop_front();
        }
        let smoothed = weighted_heading_mean(self.headings.make_contiguous()).unwrap_or(heading);

        let distance = steps as f64 * self.config.step_length;
        let next = current.point().advance(smoothed, distance);
        let floor = current.floor.clone();

        self.drift_factor = (self.drift_factor * self.config.drift_decay).clamp(0.0, 1.0);
        self.sensor_factor = sensor_confidence.value();

        self.current = Some(FusedPosition {
            x: next.x,
            y: next.y,
            floor,
            heading: smoothed,
            confidence: Confidence::from_score(self.dead_reckoning_score()),
            source: PositionSource::DeadReckoning,
            timestamp: epoch_ms(),
        });
        debug!(
            steps = %steps,
            heading = %format!("{:.1}", smoothed),
            drift = %format!("{:.3}", self.drift_factor),
            "dead_reckoning_step"
        );
        true
    }

    /// Combined score for estimates without an absolute reference
    #[inline]
    pub fn dead_reckoning_score(&self) -> f64 {
        SENSOR_WEIGHT * self.sensor_factor + DRIFT_WEIGHT * self.drift_factor
    }

    /// Rail-snap correction pass over the current estimate
    ///
    /// The position is always projected onto the nearest valid edge. Trust
    /// is restored only when the projection distance is within bounds.
    pub(crate) fn refine(&mut self, graph: &NavigationGraph, source: PositionSource) -> Refinement {
        let Some(current) = self.current.as_mut() else {
            return Refinement { snap: None, heading_corrected: false, off_path: true };
        };

        let snap = self.snapper.snap(graph, &current.point(), &current.floor);
        let off_path = self.snapper.is_off_path(snap.as_ref());
        let mut heading_corrected = false;

        if let Some(ref s) = snap {
            current.x = s.point.x;
            current.y = s.point.y;
            let heading = self.snapper.snap_heading(current.heading, s.bearing);
            current.heading = heading.heading;
            heading_corrected = heading.corrected;
        }

        if off_path {
            if !self.off_path {
                let distance = snap.as_ref().map(|s| s.distance);
                info!(distance = ?distance, floor = %current.floor, "off_path");
                self.events.send_positioning(PositioningEvent::OffPath { distance });
            }
        } else {
            self.drift_factor = (self.drift_factor * self.config.snap_trust_gain).clamp(0.0, 1.0);
        }
        self.off_path = off_path;

        let unanchored = matches!(source, PositionSource::DeadReckoning | PositionSource::RailSnap);
        if unanchored && snap.is_some() {
            current.confidence = Confidence::from_score(
                SENSOR_WEIGHT * self.sensor_factor + DRIFT_WEIGHT * self.drift_factor,
            );
            current.source = source;
        }

        Refinement { snap, heading_corrected, off_path }
    }

    /// Timestamp, broadcast and count the current estimate
    pub(crate) fn publish(&mut self) -> Option<FusedPosition> {
        let current = self.current.as_mut()?;
        current.timestamp = epoch_ms();
        self.events.send_position(current);
        if let Some(ref m) = self.metrics {
            m.record_position_update(current.source);
        }
        Some(current.clone())
    }
}
