//! Navigation orchestration
//!
//! The NavigationEngine owns the building graph and coordinates:
//! - Route planning (A* on one floor, stitched legs across floors)
//! - The navigation state machine (Idle, Calculating, Navigating, ...)
//! - Position fusion ticks and their effect on the active route
//! - Blocked edges and dynamic rerouting
//! - Positioning mode changes

mod handlers;

use crate::domain::geometry::Point;
use crate::domain::route::{Instruction, Path};
use crate::domain::types::{FloorId, FusedPosition, NavigationStatus, NodeId, PositioningMode};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::event_channel::EventSender;
use crate::io::sensor_feed::SensorSource;
use crate::services::floor_manager::FloorManager;
use crate::services::fusion::{FusionConfig, FusionEngine};
use crate::services::graph::NavigationGraph;
use crate::services::pathfinder::{Pathfinder, PathfinderConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::info;

/// Where the user wants to go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Room or point of interest; resolved through node associations first
    #[serde(default)]
    pub location_id: Option<String>,
    /// Fallback coordinates when no node is associated with the location
    pub x: f64,
    pub y: f64,
    pub floor: FloorId,
}

impl Destination {
    pub fn location(location_id: &str, x: f64, y: f64, floor: &str) -> Self {
        Self { location_id: Some(location_id.to_string()), x, y, floor: FloorId::from(floor) }
    }

    pub fn point(x: f64, y: f64, floor: &str) -> Self {
        Self { location_id: None, x, y, floor: FloorId::from(floor) }
    }

    #[inline]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Why navigation ended in Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavigationFailure {
    /// Current position maps to no walkable node
    StartUnresolved,
    /// Destination maps to no walkable node
    DestinationUnresolved,
    /// Start and destination are not connected
    NoRoute,
    /// Replanning after a block or deviation found nothing
    RerouteFailed,
}

impl std::fmt::Display for NavigationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationFailure::StartUnresolved => {
                write!(f, "current position is not near any walkable node")
            }
            NavigationFailure::DestinationUnresolved => {
                write!(f, "destination is not near any walkable node")
            }
            NavigationFailure::NoRoute => write!(f, "destination is unreachable"),
            NavigationFailure::RerouteFailed => write!(f, "no alternative route"),
        }
    }
}

impl std::error::Error for NavigationFailure {}

/// Commands accepted by the engine loop
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationCommand {
    /// Navigate from the current fused position
    Start(Destination),
    Stop,
    QrScan { node_id: NodeId, heading: Option<f64> },
    LandmarkSeen { node_id: NodeId, score: f64, heading: Option<f64> },
    ManualPosition { x: f64, y: f64, floor: FloorId, heading: f64 },
    /// Ground-truth fix from a simulated walker
    SimulatedFix { x: f64, y: f64, floor: FloorId, heading: f64 },
    BlockEdge { from: NodeId, to: NodeId, reason: Option<String> },
    UnblockEdge { from: NodeId, to: NodeId },
    SetMode(PositioningMode),
    /// Erratic or conflicting sensor readings reported by the sensor layer
    SensorInstability { reason: String },
}

/// Central orchestrator for routing and positioning
pub struct NavigationEngine {
    /// Building graph, including blocked edges
    pub(crate) graph: NavigationGraph,
    pub(crate) pathfinder: Pathfinder,
    pub(crate) floor_manager: FloorManager,
    /// Owns the fused position estimate
    pub(crate) fusion: FusionEngine,
    pub(crate) config: Config,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) events: EventSender,
    pub(crate) status: NavigationStatus,
    pub(crate) mode: PositioningMode,
    /// Active route; empty outside Navigating/Arrived
    pub(crate) path: Path,
    pub(crate) destination: Option<Destination>,
    /// Index of the path node the user last reached
    pub(crate) step_index: usize,
    /// Where the active route was planned from
    pub(crate) route_anchor: Option<Point>,
    pub(crate) last_position: Option<FusedPosition>,
    pub(crate) last_failure: Option<NavigationFailure>,
    /// Id of the current navigation request
    pub(crate) session: Option<String>,
}

impl NavigationEngine {
    /// Create an engine over a loaded graph
    pub fn new(
        config: Config,
        graph: NavigationGraph,
        metrics: Arc<Metrics>,
        events: EventSender,
    ) -> Self {
        let pathfinder = Pathfinder::new(PathfinderConfig::from_config(&config));
        let floor_manager = FloorManager::new(pathfinder.clone());
        let fusion = FusionEngine::new(FusionConfig::from_config(&config), events.clone())
            .with_metrics(metrics.clone());
        Self {
            graph,
            pathfinder,
            floor_manager,
            fusion,
            config,
            metrics,
            events,
            status: NavigationStatus::Idle,
            mode: PositioningMode::default(),
            path: Path::empty(),
            destination: None,
            step_index: 0,
            route_anchor: None,
            last_position: None,
            last_failure: None,
            session: None,
        }
    }

    /// Run the engine loop, consuming commands and ticking the positioning pipeline
    ///
    /// The engine is locked only for the duration of each command or tick.
    /// Returns when the command channel closes.
    pub async fn run<S: SensorSource>(
        engine: Arc<Mutex<NavigationEngine>>,
        mut cmd_rx: mpsc::Receiver<NavigationCommand>,
        mut sensors: S,
    ) {
        let period = engine.lock().config.tick_interval();
        let mut tick_interval = interval(period);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(c) => {
                            engine.lock().handle_command(c);
                        }
                        None => break, // Channel closed
                    }
                }
                _ = tick_interval.tick() => {
                    engine.lock().tick(&mut sensors);
                }
            }
        }
        info!("navigation_loop_stopped");
    }

    /// One positioning tick, feeding the result into the active route
    pub fn tick(&mut self, sensors: &mut dyn SensorSource) {
        self.metrics.record_tick();
        if let Some(position) = self.fusion.tick(self.mode, sensors, &self.graph) {
            self.update_position(position);
        }
    }

    /// Dispatch a single command
    pub fn handle_command(&mut self, command: NavigationCommand) {
        match command {
            NavigationCommand::Start(destination) => {
                self.start_from_current(destination);
            }
            NavigationCommand::Stop => {
                self.stop_navigation();
            }
            NavigationCommand::QrScan { node_id, heading } => {
                self.handle_qr_scan(&node_id, heading);
            }
            NavigationCommand::LandmarkSeen { node_id, score, heading } => {
                self.handle_landmark(&node_id, score, heading);
            }
            NavigationCommand::ManualPosition { x, y, floor, heading } => {
                self.handle_manual_position(Point::new(x, y), floor, heading);
            }
            NavigationCommand::SimulatedFix { x, y, floor, heading } => {
                self.handle_simulated_fix(Point::new(x, y), floor, heading);
            }
            NavigationCommand::BlockEdge { from, to, reason } => {
                self.handle_block_edge(&from, &to, reason.as_deref());
            }
            NavigationCommand::UnblockEdge { from, to } => {
                self.handle_unblock_edge(&from, &to);
            }
            NavigationCommand::SetMode(mode) => {
                self.set_mode(mode, "requested");
            }
            NavigationCommand::SensorInstability { reason } => {
                self.report_sensor_instability(&reason);
            }
        }
    }

    pub fn status(&self) -> NavigationStatus {
        self.status
    }

    pub fn mode(&self) -> PositioningMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    pub fn last_failure(&self) -> Option<NavigationFailure> {
        self.last_failure
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn graph(&self) -> &NavigationGraph {
        &self.graph
    }

    /// Mutable graph access for loading or unloading floors
    pub fn graph_mut(&mut self) -> &mut NavigationGraph {
        &mut self.graph
    }

    pub fn fusion(&self) -> &FusionEngine {
        &self.fusion
    }

    /// Current fused position estimate
    pub fn position(&self) -> Option<&FusedPosition> {
        self.fusion.current()
    }

    /// Next-step instruction for the active route
    pub fn current_instruction(&self) -> Option<Instruction> {
        if self.path.is_empty() {
            return None;
        }
        Some(self.path.instruction_at(self.step_index))
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
