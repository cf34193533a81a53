//! IO modules - seams to collaborators outside the core
//!
//! This module contains everything that talks to the outside world:
//! - `event_channel` - Broadcast streams for positions and navigation events
//! - `sensor_feed` - Push-based motion sensor accumulator
//! - `graph_loader` - JSON building graph files
//! - `simulator` - Simulated walker driving a sensor feed

pub mod event_channel;
pub mod graph_loader;
pub mod sensor_feed;
pub mod simulator;

// Re-export commonly used types
pub use event_channel::{create_event_channel, EventSender, NavigationEvent};
pub use graph_loader::{load_graph, parse_graph, GraphFile};
pub use sensor_feed::{HeadingReading, SensorFeed, SensorSource};
pub use simulator::{GroundTruth, SimulatedWalker, WalkerConfig};
