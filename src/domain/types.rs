//! Shared types for the navigation core

use crate::domain::geometry::Point;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Newtype wrapper for node IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype wrapper for floor IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloorId(pub String);

impl std::fmt::Display for FloorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FloorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn default_walkable() -> bool {
    true
}

/// A navigable point in the building graph
///
/// Nodes are immutable once loaded. `connections` lists the ids this node
/// declares edges to; the graph materializes them as undirected edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub floor: FloorId,
    /// Room or point-of-interest this node stands for
    #[serde(default)]
    pub location_id: Option<String>,
    /// Display name used in instructions
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub connections: Vec<NodeId>,
    #[serde(default = "default_walkable")]
    pub is_walkable: bool,
    #[serde(default)]
    pub is_stairs: bool,
    #[serde(default)]
    pub is_elevator: bool,
    /// Connectors sharing a link group are the same physical staircase or elevator
    #[serde(default)]
    pub link_group: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, x: f64, y: f64, floor: impl Into<String>) -> Self {
        Self {
            id: NodeId(id.into()),
            x,
            y,
            floor: FloorId(floor.into()),
            location_id: None,
            label: None,
            connections: Vec::new(),
            is_walkable: true,
            is_stairs: false,
            is_elevator: false,
            link_group: None,
        }
    }

    pub fn with_connections(mut self, ids: &[&str]) -> Self {
        self.connections = ids.iter().map(|s| NodeId::from(*s)).collect();
        self
    }

    pub fn with_location(mut self, location_id: &str) -> Self {
        self.location_id = Some(location_id.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn stairs(mut self, link_group: &str) -> Self {
        self.is_stairs = true;
        self.link_group = Some(link_group.to_string());
        self
    }

    pub fn elevator(mut self, link_group: &str) -> Self {
        self.is_elevator = true;
        self.link_group = Some(link_group.to_string());
        self
    }

    pub fn blocked(mut self) -> Self {
        self.is_walkable = false;
        self
    }

    /// Stairs and elevators stitch floors together
    #[inline]
    pub fn is_floor_connector(&self) -> bool {
        self.is_stairs || self.is_elevator
    }

    #[inline]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Label for instructions, falling back to the id
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id.0)
    }
}

/// Directed key of an edge record
///
/// A logical connection is stored as up to two records, `a->b` and `b->a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey {
    pub from: NodeId,
    pub to: NodeId,
}

impl EdgeKey {
    pub fn new(from: &NodeId, to: &NodeId) -> Self {
        Self { from: from.clone(), to: to.clone() }
    }

    pub fn reversed(&self) -> Self {
        Self { from: self.to.clone(), to: self.from.clone() }
    }

    /// Orientation-independent form, smaller id first
    pub fn canonical(&self) -> Self {
        if self.from <= self.to {
            self.clone()
        } else {
            self.reversed()
        }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// A walkable connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub key: EdgeKey,
    pub distance: f64,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub blocked_at: Option<DateTime<Utc>>,
}

impl Edge {
    pub fn new(key: EdgeKey, distance: f64) -> Self {
        Self { key, distance, is_blocked: false, block_reason: None, blocked_at: None }
    }

    /// Edge id derived from the endpoint pair
    pub fn id(&self) -> String {
        self.key.to_string()
    }
}

/// Ordinal trust level attached to a position estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Combined-score thresholds for the confidence tiers
const HIGH_CONFIDENCE_SCORE: f64 = 0.8;
const MEDIUM_CONFIDENCE_SCORE: f64 = 0.5;

impl Confidence {
    /// Map a continuous score in [0, 1] onto a tier
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_CONFIDENCE_SCORE {
            Confidence::High
        } else if score >= MEDIUM_CONFIDENCE_SCORE {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// Provenance of a position estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PositionSource {
    Qr,
    VisualLandmark,
    DeadReckoning,
    Manual,
    RailSnap,
    Simulated,
}

impl PositionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSource::Qr => "qr",
            PositionSource::VisualLandmark => "visual_landmark",
            PositionSource::DeadReckoning => "dead_reckoning",
            PositionSource::Manual => "manual",
            PositionSource::RailSnap => "rail_snap",
            PositionSource::Simulated => "simulated",
        }
    }

    /// Rank when inputs arrive together; higher wins
    pub fn priority(&self) -> u8 {
        match self {
            PositionSource::Qr => 5,
            PositionSource::VisualLandmark => 4,
            PositionSource::DeadReckoning => 3,
            PositionSource::Manual | PositionSource::Simulated => 2,
            PositionSource::RailSnap => 1,
        }
    }
}

/// Single fused position estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedPosition {
    pub x: f64,
    pub y: f64,
    pub floor: FloorId,
    /// Degrees, 0 = north
    pub heading: f64,
    pub confidence: Confidence,
    pub source: PositionSource,
    /// Epoch ms
    pub timestamp: u64,
}

impl FusedPosition {
    #[inline]
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Which inputs the fusion engine consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositioningMode {
    /// Full sensor fusion
    #[default]
    Smart,
    /// Rail snapping only
    Assisted,
    /// User-driven positions only
    Manual,
}

impl PositioningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositioningMode::Smart => "smart",
            PositioningMode::Assisted => "assisted",
            PositioningMode::Manual => "manual",
        }
    }
}

/// Navigation state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum NavigationStatus {
    #[default]
    Idle,
    Calculating,
    Navigating,
    Rerouting,
    Arrived,
    Error,
}

impl NavigationStatus {
    /// Transition table of the orchestrator
    ///
    /// Any state may return to Idle (stop) or start a new request (Calculating),
    /// except that a request already being calculated cannot restart itself.
    pub fn can_transition_to(&self, next: NavigationStatus) -> bool {
        use NavigationStatus::*;
        match (self, next) {
            (_, Idle) => true,
            (Calculating, Calculating) => false,
            (_, Calculating) => true,
            (Calculating, Navigating) | (Calculating, Error) => true,
            (Navigating, Rerouting) | (Navigating, Arrived) | (Navigating, Error) => true,
            (Rerouting, Navigating) | (Rerouting, Error) => true,
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            NavigationStatus::Calculating | NavigationStatus::Navigating | NavigationStatus::Rerouting
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationStatus::Idle => "idle",
            NavigationStatus::Calculating => "calculating",
            NavigationStatus::Navigating => "navigating",
            NavigationStatus::Rerouting => "rerouting",
            NavigationStatus::Arrived => "arrived",
            NavigationStatus::Error => "error",
        }
    }
}

/// Binary walking classification from the motion sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WalkingState {
    Walking,
    #[default]
    Still,
}

/// Confidence tier reported by the compass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorConfidence {
    High,
    #[default]
    Medium,
    Low,
}

impl SensorConfidence {
    /// Numeric weight used in the combined confidence score
    pub fn value(&self) -> f64 {
        match self {
            SensorConfidence::High => 1.0,
            SensorConfidence::Medium => 0.6,
            SensorConfidence::Low => 0.3,
        }
    }
}
