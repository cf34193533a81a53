//! Services - routing, positioning and orchestration
//!
//! This module contains the navigation core:
//! - `graph` - Building graph with blockable edges and pending connections
//! - `pathfinder` - A* search with floor-change penalty
//! - `rail_snap` - Projection of estimates onto the nearest walkable edge
//! - `floor_manager` - Multi-floor routes stitched at stairs and elevators
//! - `fusion` - Position fusion engine and the periodic positioning tick
//! - `navigation` - Navigation state machine and command loop

pub mod floor_manager;
pub mod fusion;
pub mod graph;
pub mod navigation;
pub mod pathfinder;
pub mod rail_snap;

// Re-export commonly used types
pub use floor_manager::{CrossFloorRoute, FloorManager};
pub use fusion::{FusionConfig, FusionEngine, PositionInput, PositioningEvent};
pub use graph::{BlockedEdge, GraphError, NavigationGraph};
pub use navigation::{Destination, NavigationCommand, NavigationEngine, NavigationFailure};
pub use pathfinder::{PathFailure, Pathfinder, PathfinderConfig, SearchOutcome};
pub use rail_snap::{EdgeSnap, RailSnapConfig, RailSnapper};
