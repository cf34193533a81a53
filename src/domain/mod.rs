//! Domain models - core value types of the navigation core
//!
//! This module contains the canonical data types used throughout the system:
//! - `Node` / `Edge` - the building graph
//! - `Path` / `Instruction` - a computed route and its next-step text
//! - `FusedPosition` - the single confidence-scored position estimate
//! - `NavigationStatus` / `PositioningMode` - orchestrator state
//! - `geometry` - planar math shared by pathfinding, snapping and fusion

pub mod geometry;
pub mod route;
pub mod types;

pub use geometry::Point;
pub use route::{Instruction, InstructionKind, Path};
pub use types::{
    Confidence, Edge, EdgeKey, FloorId, FusedPosition, NavigationStatus, Node, NodeId,
    PositionSource, PositioningMode, SensorConfidence, WalkingState,
};
