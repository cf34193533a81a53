//! Navigation operations and command handlers

use super::{Destination, NavigationEngine, NavigationFailure};
use crate::domain::geometry::{project_onto_segment, Point};
use crate::domain::route::Path;
use crate::domain::types::{
    epoch_ms, EdgeKey, FloorId, FusedPosition, NavigationStatus, NodeId, PositioningMode,
};
use crate::io::event_channel::{EdgePayload, RoutePayload, StatusPayload};
use crate::services::fusion::{PositionInput, PositioningEvent};
use crate::services::graph::GraphError;
use crate::services::pathfinder::resolve;
use std::time::Instant;
use tracing::{debug, info, warn};

impl NavigationEngine {
    // ========================================================================
    // Navigation lifecycle
    // ========================================================================

    /// Plan a route from `position` to `destination` and start navigating
    ///
    /// Lands in Navigating, or in Error with `last_failure()` set.
    pub fn start_navigation(
        &mut self,
        position: &FusedPosition,
        destination: Destination,
    ) -> NavigationStatus {
        self.transition(NavigationStatus::Calculating, None);
        self.session = Some(uuid::Uuid::now_v7().to_string());
        self.last_position = Some(position.clone());
        self.destination = Some(destination.clone());
        self.path = Path::empty();
        self.step_index = 0;

        info!(
            session = %self.session.as_deref().unwrap_or_default(),
            x = %position.x,
            y = %position.y,
            floor = %position.floor,
            destination = ?destination.location_id,
            "navigation_requested"
        );

        match self.plan_route(position, &destination) {
            Ok(path) => {
                self.adopt_path(path, position.point());
                self.transition(NavigationStatus::Navigating, None);
                self.publish_route();
            }
            Err(failure) => {
                self.transition(NavigationStatus::Error, Some(failure));
            }
        }
        self.status
    }

    /// Start from the current fused position
    pub fn start_from_current(&mut self, destination: Destination) -> NavigationStatus {
        match self.fusion.current().cloned() {
            Some(position) => self.start_navigation(&position, destination),
            None => {
                warn!("navigation_without_position");
                self.transition(NavigationStatus::Calculating, None);
                self.destination = Some(destination);
                self.transition(NavigationStatus::Error, Some(NavigationFailure::StartUnresolved));
                self.status
            }
        }
    }

    /// Feed a new position into the active route
    ///
    /// While navigating this checks arrival, advances the step index and
    /// reroutes when the user has left the route.
    pub fn update_position(&mut self, position: FusedPosition) {
        self.last_position = Some(position.clone());
        if self.status != NavigationStatus::Navigating {
            return;
        }
        let Some(goal) = self.path.destination() else {
            return;
        };

        let point = position.point();
        let to_goal = goal.position().distance(&point);
        if goal.floor == position.floor && to_goal <= self.config.arrival_radius() {
            self.step_index = self.path.len().saturating_sub(1);
            self.transition(NavigationStatus::Arrived, None);
            self.metrics.record_arrival();
            self.publish_route();
            return;
        }

        if self.advance_step(&point, &position.floor) {
            self.publish_route();
            return;
        }

        if self.config.reroute_when_off_route() && self.is_off_route(&point, &position.floor) {
            info!(
                x = %format!("{:.1}", point.x),
                y = %format!("{:.1}", point.y),
                floor = %position.floor,
                "off_route"
            );
            self.reroute("off_route");
        }
    }

    /// Block an edge and, while navigating, replan around it
    pub fn block_path_and_reroute(
        &mut self,
        from: &NodeId,
        to: &NodeId,
        reason: Option<&str>,
    ) -> Result<NavigationStatus, GraphError> {
        self.graph.block_edge(from, to, reason)?;
        self.events.send_edge(EdgePayload {
            site: None,
            ts: epoch_ms(),
            edge: EdgeKey::new(from, to).canonical(),
            blocked: true,
            reason: reason.map(str::to_string),
        });

        if self.status == NavigationStatus::Navigating && self.config.dynamic_rerouting() {
            self.reroute("edge_blocked");
        }
        Ok(self.status)
    }

    /// Clear a block; the active route is left as is
    pub fn unblock_edge(&mut self, from: &NodeId, to: &NodeId) -> Result<bool, GraphError> {
        let was_blocked = self.graph.unblock_edge(from, to)?;
        if was_blocked {
            self.events.send_edge(EdgePayload {
                site: None,
                ts: epoch_ms(),
                edge: EdgeKey::new(from, to).canonical(),
                blocked: false,
                reason: None,
            });
        }
        Ok(was_blocked)
    }

    /// Reset to Idle, dropping route and destination
    pub fn stop_navigation(&mut self) {
        self.transition(NavigationStatus::Idle, None);
        self.path = Path::empty();
        self.destination = None;
        self.step_index = 0;
        self.session = None;
        self.route_anchor = None;
    }

    // ========================================================================
    // Positioning mode
    // ========================================================================

    /// Switch positioning mode
    pub fn set_mode(&mut self, mode: PositioningMode, reason: &str) {
        if self.mode == mode {
            return;
        }
        let from = self.mode;
        self.mode = mode;
        info!(
            from = %from.as_str(),
            to = %mode.as_str(),
            reason = %reason,
            "positioning_mode_changed"
        );
        self.events.send_positioning(PositioningEvent::ModeChanged {
            from,
            to: mode,
            reason: reason.to_string(),
        });
    }

    /// Erratic sensors force Smart down to Assisted
    pub fn report_sensor_instability(&mut self, reason: &str) {
        if self.mode != PositioningMode::Smart {
            debug!(mode = %self.mode.as_str(), reason = %reason, "sensor_instability_ignored");
            return;
        }
        warn!(reason = %reason, "sensor_instability");
        self.metrics.record_mode_downgrade();
        self.set_mode(PositioningMode::Assisted, reason);
    }

    // ========================================================================
    // Position inputs
    // ========================================================================

    pub(crate) fn handle_qr_scan(&mut self, node_id: &NodeId, heading: Option<f64>) {
        let Some(node) = self.graph.node(node_id).cloned() else {
            warn!(node_id = %node_id, "qr_unknown_node");
            return;
        };
        self.apply_input(PositionInput::Qr { node, heading });
    }

    pub(crate) fn handle_landmark(&mut self, node_id: &NodeId, score: f64, heading: Option<f64>) {
        let Some(node) = self.graph.node(node_id).cloned() else {
            warn!(node_id = %node_id, "landmark_unknown_node");
            return;
        };
        self.apply_input(PositionInput::Landmark { node, score, heading });
    }

    pub(crate) fn handle_manual_position(&mut self, point: Point, floor: FloorId, heading: f64) {
        self.apply_input(PositionInput::Manual { point, floor, heading });
    }

    pub(crate) fn handle_simulated_fix(&mut self, point: Point, floor: FloorId, heading: f64) {
        self.apply_input(PositionInput::Simulated { point, floor, heading });
    }

    pub(crate) fn handle_block_edge(&mut self, from: &NodeId, to: &NodeId, reason: Option<&str>) {
        if let Err(e) = self.block_path_and_reroute(from, to, reason) {
            warn!(error = %e, "block_edge_failed");
        }
    }

    pub(crate) fn handle_unblock_edge(&mut self, from: &NodeId, to: &NodeId) {
        if let Err(e) = self.unblock_edge(from, to) {
            warn!(error = %e, "unblock_edge_failed");
        }
    }

    /// Apply an explicit position input and feed the result into the route
    pub fn apply_input(&mut self, input: PositionInput) {
        if let Some(position) = self.fusion.apply(input, Some(&self.graph)) {
            self.update_position(position);
        }
    }

    /// Apply inputs that arrived together; only the highest-priority accepted one counts
    pub fn apply_inputs(&mut self, inputs: Vec<PositionInput>) {
        if let Some(position) = self.fusion.apply_batch(inputs, Some(&self.graph)) {
            self.update_position(position);
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Move the state machine, publishing the transition
    ///
    /// Illegal transitions are logged and ignored.
    pub(crate) fn transition(
        &mut self,
        next: NavigationStatus,
        failure: Option<NavigationFailure>,
    ) -> bool {
        let from = self.status;
        if !from.can_transition_to(next) {
            warn!(from = %from.as_str(), to = %next.as_str(), "illegal_transition");
            return false;
        }
        self.status = next;
        self.last_failure = failure;

        match failure {
            Some(f) => {
                info!(from = %from.as_str(), to = %next.as_str(), reason = %f, "navigation_status")
            }
            None => info!(from = %from.as_str(), to = %next.as_str(), "navigation_status"),
        }
        self.events.send_status(StatusPayload {
            site: None,
            ts: epoch_ms(),
            session: self.session.clone(),
            from,
            to: next,
            reason: failure.map(|f| f.to_string()),
        });
        true
    }

    /// Resolve endpoints and search
    fn plan_route(
        &self,
        position: &FusedPosition,
        destination: &Destination,
    ) -> Result<Path, NavigationFailure> {
        let start = self
            .graph
            .nearest_node(&position.point(), &position.floor)
            .ok_or(NavigationFailure::StartUnresolved)?
            .id
            .clone();

        let goal = destination
            .location_id
            .as_deref()
            .and_then(|loc| self.graph.node_by_location(loc))
            .filter(|n| n.is_walkable)
            .or_else(|| self.graph.nearest_node(&destination.position(), &destination.floor))
            .ok_or(NavigationFailure::DestinationUnresolved)?
            .id
            .clone();

        let path = self.compute_route(&start, &goal);
        if path.is_empty() {
            return Err(NavigationFailure::NoRoute);
        }
        Ok(path)
    }

    /// A* on one floor, stitched legs across floors
    fn compute_route(&self, start: &NodeId, goal: &NodeId) -> Path {
        let started = Instant::now();
        let same_floor = match (self.graph.node(start), self.graph.node(goal)) {
            (Some(a), Some(b)) => a.floor == b.floor,
            _ => return Path::empty(),
        };

        let nodes = self.graph.nodes();
        let (ids, expanded) = if same_floor {
            let outcome = self.pathfinder.search(nodes, start, goal, Some(&self.graph), None);
            (outcome.path, outcome.nodes_expanded)
        } else {
            match self.floor_manager.plan(&self.graph, start, goal) {
                Some(route) => (route.path, route.nodes_expanded),
                None => {
                    // No linked connectors: fall back to declared cross-floor edges
                    let outcome =
                        self.pathfinder.search(nodes, start, goal, Some(&self.graph), None);
                    (outcome.path, outcome.nodes_expanded)
                }
            }
        };

        let latency_us = started.elapsed().as_micros() as u64;
        self.metrics.record_search(latency_us, expanded, !ids.is_empty());
        debug!(
            start = %start,
            goal = %goal,
            nodes = %ids.len(),
            expanded = %expanded,
            latency_us = %latency_us,
            "route_search"
        );

        self.graph.build_path(resolve(nodes, &ids), self.config.walking_speed_mps())
    }

    /// Take a fresh route planned from `anchor`
    fn adopt_path(&mut self, path: Path, anchor: Point) {
        info!(
            session = %self.session.as_deref().unwrap_or_default(),
            nodes = %path.len(),
            distance_m = %format!("{:.1}", path.total_distance),
            eta_secs = %format!("{:.0}", path.estimated_time_secs),
            crosses_floors = %path.crosses_floors,
            "route_ready"
        );
        self.path = path;
        self.step_index = 0;
        self.route_anchor = Some(anchor);
    }

    /// Replan from the last known position to the same destination
    pub(crate) fn reroute(&mut self, trigger: &str) {
        let (Some(position), Some(destination)) =
            (self.last_position.clone(), self.destination.clone())
        else {
            return;
        };

        if !self.transition(NavigationStatus::Rerouting, None) {
            return;
        }
        self.metrics.record_reroute();
        info!(trigger = %trigger, "rerouting");

        match self.plan_route(&position, &destination) {
            Ok(path) => {
                self.adopt_path(path, position.point());
                self.transition(NavigationStatus::Navigating, None);
                self.publish_route();
            }
            Err(failure) => {
                debug!(cause = %failure, "reroute_failed");
                self.path = Path::empty();
                self.step_index = 0;
                self.transition(NavigationStatus::Error, Some(NavigationFailure::RerouteFailed));
            }
        }
    }

    /// Jump to the furthest upcoming node within the waypoint radius
    fn advance_step(&mut self, point: &Point, floor: &FloorId) -> bool {
        let radius = self.config.waypoint_radius();
        let reached = self
            .path
            .nodes
            .iter()
            .enumerate()
            .skip(self.step_index + 1)
            .filter(|(_, n)| &n.floor == floor && n.position().distance(point) <= radius)
            .map(|(i, _)| i)
            .last();

        match reached {
            Some(i) => {
                debug!(from = %self.step_index, to = %i, "step_advanced");
                self.step_index = i;
                true
            }
            None => false,
        }
    }

    /// Whether `point` is beyond the off-path distance of the remaining route
    fn is_off_route(&self, point: &Point, floor: &FloorId) -> bool {
        let remaining = &self.path.nodes[self.step_index.min(self.path.len())..];
        let on_floor = remaining.iter().any(|n| &n.floor == floor);
        if !on_floor {
            // Between floors the route cannot be judged from a planar position
            return false;
        }
        let snapper = self.fusion.snapper();
        if snapper.near_route(remaining, point, floor) {
            return false;
        }

        // Before the first node, the approach from where the route was planned counts
        match (self.step_index, self.route_anchor, self.path.origin()) {
            (0, Some(anchor), Some(origin)) if &origin.floor == floor => {
                let approach = project_onto_segment(point, &anchor, &origin.position());
                approach.distance > snapper.config().max_off_path_distance
            }
            _ => true,
        }
    }

    /// Publish the active route, step and instruction
    pub(crate) fn publish_route(&self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let remaining_m = self.path.remaining_distance(self.step_index);
        let speed = self.config.walking_speed_mps();
        self.events.send_route(RoutePayload {
            site: None,
            ts: epoch_ms(),
            session,
            path: self.path.nodes.iter().map(|n| n.id.clone()).collect(),
            step_index: self.step_index,
            instruction: self.path.instruction_at(self.step_index),
            remaining_m,
            eta_secs: if speed > 0.0 { remaining_m / speed } else { 0.0 },
            crosses_floors: self.path.crosses_floors,
        });
    }
}
