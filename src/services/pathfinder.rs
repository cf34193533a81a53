//! A* search over the building graph
//!
//! Cost between adjacent nodes is the edge's distance (planar unless the
//! graph overrides it) plus a fixed penalty when the two nodes sit on
//! different floors. The heuristic is straight-line distance to the goal,
//! ignoring floors; it stays admissible as long as overrides are never
//! shorter than the planar distance.

use crate::domain::types::{FloorId, Node, NodeId};
use crate::infra::config::Config;
use crate::services::graph::{NavigationGraph, NodeMap};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, trace, warn};

/// Frontier entry
#[derive(Debug, Clone)]
struct Frontier {
    id: NodeId,
    f_cost: f64,
    /// Push order, for deterministic tie-breaking
    seq: u64,
}

impl Eq for Frontier {}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior; earlier pushes win ties
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Search parameters
#[derive(Debug, Clone)]
pub struct PathfinderConfig {
    /// Added to the cost of every edge that changes floor
    pub floor_change_penalty: f64,
    /// Nodes to expand before giving up
    pub max_expansions: usize,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self { floor_change_penalty: 50.0, max_expansions: 100_000 }
    }
}

impl PathfinderConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            floor_change_penalty: config.floor_change_penalty(),
            max_expansions: config.max_expansions(),
        }
    }
}

/// Why a search produced no path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFailure {
    /// Start or goal is not in the node map
    UnknownEndpoint,
    /// Start or goal is flagged non-walkable
    EndpointNotWalkable,
    /// Frontier exhausted without reaching the goal
    NoPath,
    MaxExpansionsExceeded,
}

impl PathFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathFailure::UnknownEndpoint => "unknown_endpoint",
            PathFailure::EndpointNotWalkable => "endpoint_not_walkable",
            PathFailure::NoPath => "no_path",
            PathFailure::MaxExpansionsExceeded => "max_expansions_exceeded",
        }
    }
}

/// Result of one search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Node ids from start to goal inclusive, empty when unreachable
    pub path: Vec<NodeId>,
    /// Total g-cost including floor penalties
    pub cost: f64,
    pub nodes_expanded: usize,
    pub failure: Option<PathFailure>,
}

impl SearchOutcome {
    fn failed(failure: PathFailure, nodes_expanded: usize) -> Self {
        Self { path: Vec::new(), cost: f64::INFINITY, nodes_expanded, failure: Some(failure) }
    }

    #[inline]
    pub fn found(&self) -> bool {
        !self.path.is_empty()
    }
}

/// A* pathfinder
#[derive(Debug, Clone, Default)]
pub struct Pathfinder {
    config: PathfinderConfig,
}

impl Pathfinder {
    pub fn new(config: PathfinderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    /// Shortest walkable node sequence from `start` to `goal`
    ///
    /// Neighbors come from the graph's undirected adjacency when a graph is
    /// given (which also enables blocked-edge checks), otherwise from each
    /// node's declared connections. Returns an empty sequence when the goal
    /// is unreachable.
    pub fn find_path(
        &self,
        nodes: &NodeMap,
        start: &NodeId,
        goal: &NodeId,
        graph: Option<&NavigationGraph>,
    ) -> Vec<Node> {
        let outcome = self.search(nodes, start, goal, graph, None);
        resolve(nodes, &outcome.path)
    }

    /// Search restricted to nodes on one floor
    pub fn find_path_on_floor(
        &self,
        graph: &NavigationGraph,
        start: &NodeId,
        goal: &NodeId,
        floor: &FloorId,
    ) -> SearchOutcome {
        self.search(graph.nodes(), start, goal, Some(graph), Some(floor))
    }

    /// Full search returning diagnostics alongside the path
    pub fn search(
        &self,
        nodes: &NodeMap,
        start: &NodeId,
        goal: &NodeId,
        graph: Option<&NavigationGraph>,
        floor: Option<&FloorId>,
    ) -> SearchOutcome {
        let (Some(start_node), Some(goal_node)) = (nodes.get(start), nodes.get(goal)) else {
            warn!(start = %start, goal = %goal, "search_unknown_endpoint");
            return SearchOutcome::failed(PathFailure::UnknownEndpoint, 0);
        };
        if !start_node.is_walkable || !goal_node.is_walkable {
            debug!(start = %start, goal = %goal, "search_endpoint_not_walkable");
            return SearchOutcome::failed(PathFailure::EndpointNotWalkable, 0);
        }
        if let Some(floor) = floor {
            if &start_node.floor != floor || &goal_node.floor != floor {
                return SearchOutcome::failed(PathFailure::NoPath, 0);
            }
        }
        if start == goal {
            return SearchOutcome {
                path: vec![start.clone()],
                cost: 0.0,
                nodes_expanded: 0,
                failure: None,
            };
        }

        let goal_pos = goal_node.position();
        let mut open = BinaryHeap::new();
        let mut closed: FxHashSet<NodeId> = FxHashSet::default();
        let mut came_from: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        let mut g_scores: FxHashMap<NodeId, f64> = FxHashMap::default();
        let mut seq = 0u64;
        let mut expanded = 0usize;

        g_scores.insert(start.clone(), 0.0);
        open.push(Frontier {
            id: start.clone(),
            f_cost: start_node.position().distance(&goal_pos),
            seq,
        });

        while let Some(current) = open.pop() {
            if closed.contains(&current.id) {
                continue;
            }

            if current.id == *goal {
                let path = reconstruct_path(&came_from, goal);
                let cost = g_scores.get(goal).copied().unwrap_or(0.0);
                trace!(start = %start, goal = %goal, expanded = %expanded, cost = %cost, "search_found");
                return SearchOutcome { path, cost, nodes_expanded: expanded, failure: None };
            }

            expanded += 1;
            if expanded > self.config.max_expansions {
                warn!(
                    start = %start,
                    goal = %goal,
                    max_expansions = %self.config.max_expansions,
                    "search_max_expansions_exceeded"
                );
                return SearchOutcome::failed(PathFailure::MaxExpansionsExceeded, expanded);
            }

            let Some(current_node) = nodes.get(&current.id) else {
                continue;
            };
            let current_g = g_scores.get(&current.id).copied().unwrap_or(f64::INFINITY);
            closed.insert(current.id.clone());

            let neighbors: &[NodeId] = match graph {
                Some(g) => g.neighbors(&current.id),
                None => current_node.connections.as_slice(),
            };

            for neighbor_id in neighbors {
                if closed.contains(neighbor_id) {
                    continue;
                }
                let Some(neighbor) = nodes.get(neighbor_id) else {
                    continue;
                };
                if !neighbor.is_walkable {
                    continue;
                }
                if floor.is_some_and(|f| &neighbor.floor != f) {
                    continue;
                }
                if graph.is_some_and(|g| g.is_edge_blocked(&current.id, neighbor_id)) {
                    trace!(from = %current.id, to = %neighbor_id, "search_skip_blocked");
                    continue;
                }

                let tentative_g = current_g + self.step_cost(current_node, neighbor, graph);
                let better = g_scores.get(neighbor_id).map_or(true, |&g| tentative_g < g);
                if better {
                    came_from.insert(neighbor_id.clone(), current.id.clone());
                    g_scores.insert(neighbor_id.clone(), tentative_g);
                    seq += 1;
                    open.push(Frontier {
                        id: neighbor_id.clone(),
                        f_cost: tentative_g + neighbor.position().distance(&goal_pos),
                        seq,
                    });
                }
            }
        }

        debug!(start = %start, goal = %goal, expanded = %expanded, "search_no_path");
        SearchOutcome::failed(PathFailure::NoPath, expanded)
    }

    /// Edge cost: edge distance, plus the penalty on a floor change
    #[inline]
    fn step_cost(&self, from: &Node, to: &Node, graph: Option<&NavigationGraph>) -> f64 {
        let d = match graph {
            Some(g) => g.edge_distance(&from.id, &to.id),
            None => from.position().distance(&to.position()),
        };
        if from.floor != to.floor {
            d + self.config.floor_change_penalty
        } else {
            d
        }
    }
}

/// Walk predecessors from goal back to start
fn reconstruct_path(came_from: &FxHashMap<NodeId, NodeId>, goal: &NodeId) -> Vec<NodeId> {
    let mut path = vec![goal.clone()];
    let mut current = goal;
    while let Some(prev) = came_from.get(current) {
        path.push(prev.clone());
        current = prev;
    }
    path.reverse();
    path
}

/// Look up the nodes of an id sequence
pub fn resolve(nodes: &NodeMap, ids: &[NodeId]) -> Vec<Node> {
    ids.iter().filter_map(|id| nodes.get(id).cloned()).collect()
}
