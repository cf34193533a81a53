//! Building graph: nodes, undirected adjacency and blockable edges
//!
//! Invariants:
//! - every id in the adjacency list has a node
//! - every edge record's endpoints exist
//!
//! A node may declare a connection to a node that is not loaded yet; the
//! edge is parked and materializes when the other node arrives.

use crate::domain::geometry::Point;
use crate::domain::route::Path;
use crate::domain::types::{Edge, EdgeKey, FloorId, Node, NodeId};
use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

/// Node registry keyed by id
pub type NodeMap = FxHashMap<NodeId, Node>;

/// Errors from graph mutation
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    UnknownNode(NodeId),
    UnknownEdge(EdgeKey),
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::UnknownNode(id) => write!(f, "unknown node {}", id),
            GraphError::UnknownEdge(key) => write!(f, "unknown edge {}", key),
        }
    }
}

impl std::error::Error for GraphError {}

/// A currently blocked connection, for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockedEdge {
    /// Canonical (orientation-independent) key
    pub key: EdgeKey,
    pub reason: Option<String>,
    pub blocked_at: Option<DateTime<Utc>>,
}

/// In-memory building graph
#[derive(Debug, Default)]
pub struct NavigationGraph {
    nodes: NodeMap,
    /// Insertion order, for deterministic scans
    order: Vec<NodeId>,
    adjacency: FxHashMap<NodeId, SmallVec<[NodeId; 4]>>,
    /// Directed edge records
    edges: FxHashMap<EdgeKey, Edge>,
    /// First-registered record key of each logical connection, in insertion order
    edge_order: Vec<EdgeKey>,
    /// Blocked directions; blocking always inserts both
    blocked: FxHashSet<EdgeKey>,
    /// Missing target id -> nodes that declared a connection to it
    pending: FxHashMap<NodeId, Vec<NodeId>>,
    /// Explicit connector links layered over `Node::link_group`
    link_overrides: FxHashMap<NodeId, String>,
}

impl NavigationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a node list
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node);
        }
        graph
    }

    /// Add a node and register the edges it declares
    pub fn add_node(&mut self, node: Node) {
        let id = node.id.clone();
        let connections = node.connections.clone();

        if self.nodes.contains_key(&id) {
            warn!(node_id = %id, "node_replaced");
            self.detach_node(&id);
            self.nodes.insert(id.clone(), node);
        } else {
            self.nodes.insert(id.clone(), node);
            self.order.push(id.clone());
            self.adjacency.entry(id.clone()).or_default();
        }

        for target in connections {
            if target == id {
                continue;
            }
            if self.nodes.contains_key(&target) {
                self.register_edge(&id, &target, None);
            } else {
                debug!(node_id = %id, target = %target, "connection_pending");
                self.pending.entry(target).or_default().push(id.clone());
            }
        }

        if let Some(declarers) = self.pending.remove(&id) {
            for declarer in declarers {
                if self.nodes.contains_key(&declarer) {
                    self.register_edge(&declarer, &id, None);
                }
            }
        }
    }

    /// Drop every edge touching `id`, keeping the node itself
    ///
    /// Connections other nodes declared towards `id` are parked so they come
    /// back when the node is registered again. Explicit `add_edge` edges and
    /// their blocks are gone for good.
    fn detach_node(&mut self, id: &NodeId) {
        if let Some(neighbors) = self.adjacency.get_mut(id) {
            for neighbor in std::mem::take(neighbors) {
                if let Some(adj) = self.adjacency.get_mut(&neighbor) {
                    adj.retain(|n| n != id);
                }
                let declared =
                    self.nodes.get(&neighbor).is_some_and(|n| n.connections.contains(id));
                if declared {
                    self.pending.entry(id.clone()).or_default().push(neighbor);
                }
            }
        }

        let touches = |key: &EdgeKey| &key.from == id || &key.to == id;
        self.edges.retain(|key, _| !touches(key));
        self.edge_order.retain(|key| !touches(key));
        self.blocked.retain(|key| !touches(key));
        for declarers in self.pending.values_mut() {
            declarers.retain(|d| d != id);
        }
        self.pending.retain(|_, declarers| !declarers.is_empty());
    }

    /// Register an edge between two loaded nodes
    ///
    /// `distance` defaults to the planar distance between the endpoints.
    pub fn add_edge(
        &mut self,
        from: &NodeId,
        to: &NodeId,
        distance: Option<f64>,
    ) -> Result<(), GraphError> {
        for id in [from, to] {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::UnknownNode(id.clone()));
            }
        }
        self.register_edge(from, to, distance);
        Ok(())
    }

    fn register_edge(&mut self, from: &NodeId, to: &NodeId, distance: Option<f64>) {
        let (Some(a), Some(b)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return;
        };
        let distance = distance.unwrap_or_else(|| a.position().distance(&b.position()));

        let key = EdgeKey::new(from, to);
        let reverse = key.reversed();
        if !self.edges.contains_key(&key) && !self.edges.contains_key(&reverse) {
            self.edge_order.push(key.clone());
        }

        let mut edge = Edge::new(key.clone(), distance);
        if self.blocked.contains(&key) {
            // Inherit the logical connection's block
            let (reason, at) = self
                .edges
                .get(&reverse)
                .map(|e| (e.block_reason.clone(), e.blocked_at))
                .unwrap_or((None, Some(Utc::now())));
            edge.is_blocked = true;
            edge.block_reason = reason;
            edge.blocked_at = at;
        }
        self.edges.insert(key, edge);

        let adj = self.adjacency.entry(from.clone()).or_default();
        if !adj.contains(to) {
            adj.push(to.clone());
        }
        let adj = self.adjacency.entry(to.clone()).or_default();
        if !adj.contains(from) {
            adj.push(from.clone());
        }
    }

    /// Mark the connection between two nodes blocked, in both directions
    ///
    /// Blocking an already blocked edge only refreshes reason and time.
    pub fn block_edge(
        &mut self,
        from: &NodeId,
        to: &NodeId,
        reason: Option<&str>,
    ) -> Result<(), GraphError> {
        let key = EdgeKey::new(from, to);
        let reverse = key.reversed();
        if !self.edges.contains_key(&key) && !self.edges.contains_key(&reverse) {
            return Err(GraphError::UnknownEdge(key));
        }

        let now = Utc::now();
        let refreshed = self.blocked.contains(&key);
        for k in [&key, &reverse] {
            if let Some(edge) = self.edges.get_mut(k) {
                edge.is_blocked = true;
                edge.block_reason = reason.map(str::to_string);
                edge.blocked_at = Some(now);
            }
        }
        self.blocked.insert(key.clone());
        self.blocked.insert(reverse);

        info!(edge = %key, reason = ?reason, refreshed = %refreshed, "edge_blocked");
        Ok(())
    }

    /// Clear a block in both directions; returns whether it was blocked
    pub fn unblock_edge(&mut self, from: &NodeId, to: &NodeId) -> Result<bool, GraphError> {
        let key = EdgeKey::new(from, to);
        let reverse = key.reversed();
        if !self.edges.contains_key(&key) && !self.edges.contains_key(&reverse) {
            return Err(GraphError::UnknownEdge(key));
        }

        for k in [&key, &reverse] {
            if let Some(edge) = self.edges.get_mut(k) {
                edge.is_blocked = false;
                edge.block_reason = None;
                edge.blocked_at = None;
            }
        }
        let was_blocked = self.blocked.remove(&key);
        self.blocked.remove(&reverse);

        if was_blocked {
            info!(edge = %key, "edge_unblocked");
        }
        Ok(was_blocked)
    }

    /// Whether traversal from `from` to `to` is blocked
    #[inline]
    pub fn is_edge_blocked(&self, from: &NodeId, to: &NodeId) -> bool {
        self.blocked.contains(&EdgeKey::new(from, to))
    }

    /// Edge record for a pair, in either orientation
    pub fn edge(&self, from: &NodeId, to: &NodeId) -> Option<&Edge> {
        let key = EdgeKey::new(from, to);
        self.edges.get(&key).or_else(|| self.edges.get(&key.reversed()))
    }

    /// Walking distance between two nodes: the edge's distance when they are
    /// connected, otherwise the planar distance
    pub fn edge_distance(&self, from: &NodeId, to: &NodeId) -> f64 {
        if let Some(edge) = self.edge(from, to) {
            return edge.distance;
        }
        match (self.nodes.get(from), self.nodes.get(to)) {
            (Some(a), Some(b)) => a.position().distance(&b.position()),
            _ => 0.0,
        }
    }

    /// Path over `nodes` with leg lengths taken from this graph's edges
    pub fn build_path(&self, nodes: Vec<Node>, walking_speed_mps: f64) -> Path {
        let legs = nodes.windows(2).map(|w| self.edge_distance(&w[0].id, &w[1].id)).collect();
        Path::with_legs(nodes, legs, walking_speed_mps)
    }

    /// One record per logical connection whose endpoints are both on `floor`
    pub fn edges_on_floor(&self, floor: &FloorId) -> Vec<&Edge> {
        self.edge_order
            .iter()
            .filter_map(|key| self.edges.get(key).or_else(|| self.edges.get(&key.reversed())))
            .filter(|edge| {
                let on_floor = |id: &NodeId| self.nodes.get(id).is_some_and(|n| &n.floor == floor);
                on_floor(&edge.key.from) && on_floor(&edge.key.to)
            })
            .collect()
    }

    /// Walkable node on `floor` nearest to `point`
    ///
    /// Ties go to the first node loaded; callers should not rely on that.
    pub fn nearest_node(&self, point: &Point, floor: &FloorId) -> Option<&Node> {
        let mut best: Option<(&Node, f64)> = None;
        for node in self.iter_nodes() {
            if !node.is_walkable || &node.floor != floor {
                continue;
            }
            let d = node.position().distance(point);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((node, d)),
            }
        }
        best.map(|(node, _)| node)
    }

    /// First node associated with a location id
    pub fn node_by_location(&self, location_id: &str) -> Option<&Node> {
        self.iter_nodes().find(|n| n.location_id.as_deref() == Some(location_id))
    }

    /// Stairs and elevator nodes on a floor
    pub fn floor_connectors(&self, floor: &FloorId) -> Vec<&Node> {
        self.iter_nodes().filter(|n| &n.floor == floor && n.is_floor_connector()).collect()
    }

    /// Explicitly link two connectors as the same physical staircase or elevator
    pub fn link_connectors(&mut self, a: &NodeId, b: &NodeId) -> Result<(), GraphError> {
        for id in [a, b] {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::UnknownNode(id.clone()));
            }
        }
        let group_a = self.link_group(a).map(str::to_string);
        let group_b = self.link_group(b).map(str::to_string);
        let group = group_a
            .clone()
            .or_else(|| group_b.clone())
            .unwrap_or_else(|| format!("link:{}", a));

        // Merge: every member of b's old group joins a's group
        if let (Some(ga), Some(gb)) = (&group_a, &group_b) {
            if ga != gb {
                let members: Vec<NodeId> = self
                    .iter_nodes()
                    .filter(|n| self.link_group(&n.id) == Some(gb.as_str()))
                    .map(|n| n.id.clone())
                    .collect();
                debug!(
                    from_group = %gb,
                    into_group = %ga,
                    members = %members.len(),
                    "link_groups_merged"
                );
                for member in members {
                    self.link_overrides.insert(member, ga.clone());
                }
            }
        }
        self.link_overrides.insert(a.clone(), group.clone());
        self.link_overrides.insert(b.clone(), group);
        Ok(())
    }

    /// Link group of a connector, explicit links first
    pub fn link_group(&self, id: &NodeId) -> Option<&str> {
        self.link_overrides
            .get(id)
            .map(String::as_str)
            .or_else(|| self.nodes.get(id).and_then(|n| n.link_group.as_deref()))
            .filter(|g| !g.is_empty())
    }

    /// Whether two connectors are the same physical staircase or elevator
    pub fn connectors_linked(&self, a: &NodeId, b: &NodeId) -> bool {
        match (self.link_group(a), self.link_group(b)) {
            (Some(ga), Some(gb)) => ga == gb,
            _ => false,
        }
    }

    /// Unload every node on a floor together with the edges touching it
    ///
    /// Connections declared towards the removed nodes from other floors are
    /// parked again, so reloading the floor restores them.
    pub fn remove_floor(&mut self, floor: &FloorId) -> usize {
        let removed: FxHashSet<NodeId> =
            self.iter_nodes().filter(|n| &n.floor == floor).map(|n| n.id.clone()).collect();
        if removed.is_empty() {
            return 0;
        }

        for id in &removed {
            if let Some(neighbors) = self.adjacency.remove(id) {
                for neighbor in neighbors {
                    if removed.contains(&neighbor) {
                        continue;
                    }
                    if let Some(adj) = self.adjacency.get_mut(&neighbor) {
                        adj.retain(|n| n != id);
                    }
                    let declared = self
                        .nodes
                        .get(&neighbor)
                        .is_some_and(|n| n.connections.contains(id));
                    if declared {
                        self.pending.entry(id.clone()).or_default().push(neighbor);
                    }
                }
            }
            self.nodes.remove(id);
            self.link_overrides.remove(id);
        }

        let touches = |key: &EdgeKey| removed.contains(&key.from) || removed.contains(&key.to);
        self.edges.retain(|key, _| !touches(key));
        self.edge_order.retain(|key| !touches(key));
        self.blocked.retain(|key| !touches(key));
        self.order.retain(|id| !removed.contains(id));
        for declarers in self.pending.values_mut() {
            declarers.retain(|id| !removed.contains(id));
        }
        self.pending.retain(|_, declarers| !declarers.is_empty());

        info!(floor = %floor, nodes = %removed.len(), "floor_removed");
        removed.len()
    }

    /// Currently blocked connections, one entry each
    pub fn blocked_edges(&self) -> Vec<BlockedEdge> {
        self.edge_order
            .iter()
            .filter(|key| self.blocked.contains(*key))
            .filter_map(|key| self.edges.get(key).or_else(|| self.edges.get(&key.reversed())))
            .map(|edge| BlockedEdge {
                key: edge.key.canonical(),
                reason: edge.block_reason.clone(),
                blocked_at: edge.blocked_at,
            })
            .collect()
    }

    #[inline]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    /// Nodes in load order
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn neighbors(&self, id: &NodeId) -> &[NodeId] {
        self.adjacency.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of logical connections
    pub fn edge_count(&self) -> usize {
        self.edge_order.len()
    }

    /// Declared connections still waiting for their target node
    pub fn pending_connection_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Distinct floors, sorted
    pub fn floors(&self) -> Vec<FloorId> {
        let mut floors: Vec<FloorId> = self.iter_nodes().map(|n| n.floor.clone()).collect();
        floors.sort();
        floors.dedup();
        floors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn corridor() -> NavigationGraph {
        NavigationGraph::from_nodes([
            Node::new("a", 0.0, 0.0, "g").with_connections(&["b"]),
            Node::new("b", 10.0, 0.0, "g").with_connections(&["a", "c"]),
            Node::new("c", 20.0, 0.0, "g").with_connections(&["b"]),
        ])
    }

    #[test]
    fn test_connections_become_edges() {
        let graph = corridor();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.neighbors(&id("b")), &[id("a"), id("c")]);
        let edge = graph.edge(&id("a"), &id("b")).unwrap();
        assert!((edge.distance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_pending_connection_materializes() {
        let mut graph = NavigationGraph::new();
        graph.add_node(Node::new("a", 0.0, 0.0, "g").with_connections(&["b"]));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.pending_connection_count(), 1);

        graph.add_node(Node::new("b", 3.0, 4.0, "g"));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.pending_connection_count(), 0);
        assert_eq!(graph.neighbors(&id("b")), &[id("a")]);
        assert!((graph.edge(&id("b"), &id("a")).unwrap().distance - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_add_edge_requires_nodes() {
        let mut graph = corridor();
        assert_eq!(
            graph.add_edge(&id("a"), &id("zz"), None),
            Err(GraphError::UnknownNode(id("zz")))
        );
        graph.add_edge(&id("a"), &id("c"), Some(42.0)).unwrap();
        assert_eq!(graph.edge(&id("c"), &id("a")).unwrap().distance, 42.0);
    }

    #[test]
    fn test_block_updates_both_records() {
        let mut graph = corridor();
        graph.block_edge(&id("a"), &id("b"), Some("spill")).unwrap();

        assert!(graph.is_edge_blocked(&id("a"), &id("b")));
        assert!(graph.is_edge_blocked(&id("b"), &id("a")));
        for (f, t) in [("a", "b"), ("b", "a")] {
            let edge = graph.edges.get(&EdgeKey::new(&id(f), &id(t))).unwrap();
            assert!(edge.is_blocked);
            assert_eq!(edge.block_reason.as_deref(), Some("spill"));
            assert!(edge.blocked_at.is_some());
        }
    }

    #[test]
    fn test_block_is_idempotent() {
        let mut graph = corridor();
        graph.block_edge(&id("a"), &id("b"), Some("spill")).unwrap();
        graph.block_edge(&id("b"), &id("a"), Some("cleaning")).unwrap();

        let blocked = graph.blocked_edges();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].key, EdgeKey::new(&id("a"), &id("b")));
        assert_eq!(blocked[0].reason.as_deref(), Some("cleaning"));
    }

    #[test]
    fn test_unblock() {
        let mut graph = corridor();
        graph.block_edge(&id("b"), &id("c"), None).unwrap();
        assert_eq!(graph.unblock_edge(&id("c"), &id("b")), Ok(true));
        assert!(!graph.is_edge_blocked(&id("b"), &id("c")));
        assert_eq!(graph.unblock_edge(&id("c"), &id("b")), Ok(false));
        assert!(graph.blocked_edges().is_empty());
    }

    #[test]
    fn test_block_unknown_edge() {
        let mut graph = corridor();
        assert!(matches!(
            graph.block_edge(&id("a"), &id("c"), None),
            Err(GraphError::UnknownEdge(_))
        ));
    }

    #[test]
    fn test_nearest_node_skips_unwalkable_and_other_floors() {
        let graph = NavigationGraph::from_nodes([
            Node::new("wall", 1.0, 1.0, "g").blocked(),
            Node::new("up", 1.0, 1.0, "1"),
            Node::new("far", 5.0, 5.0, "g"),
        ]);
        let nearest = graph.nearest_node(&Point::new(1.0, 1.0), &FloorId::from("g")).unwrap();
        assert_eq!(nearest.id, id("far"));
        assert!(graph.nearest_node(&Point::new(0.0, 0.0), &FloorId::from("b2")).is_none());
    }

    #[test]
    fn test_node_by_location_and_connectors() {
        let graph = NavigationGraph::from_nodes([
            Node::new("r101", 0.0, 0.0, "g").with_location("room-101"),
            Node::new("s", 5.0, 0.0, "g").stairs("core"),
            Node::new("e", 9.0, 0.0, "g").elevator("lift"),
            Node::new("s1", 5.0, 0.0, "1").stairs("core"),
        ]);
        assert_eq!(graph.node_by_location("room-101").unwrap().id, id("r101"));
        assert!(graph.node_by_location("room-999").is_none());

        let connectors = graph.floor_connectors(&FloorId::from("g"));
        let ids: Vec<&str> = connectors.iter().map(|n| n.id.0.as_str()).collect();
        assert_eq!(ids, vec!["s", "e"]);
        assert!(graph.connectors_linked(&id("s"), &id("s1")));
        assert!(!graph.connectors_linked(&id("e"), &id("s1")));
    }

    #[test]
    fn test_explicit_link() {
        let mut graph = NavigationGraph::from_nodes([
            Node::new("e0", 0.0, 0.0, "g").elevator(""),
            Node::new("e1", 0.0, 0.0, "1").elevator(""),
        ]);
        assert!(!graph.connectors_linked(&id("e0"), &id("e1")));
        graph.link_connectors(&id("e0"), &id("e1")).unwrap();
        assert!(graph.connectors_linked(&id("e0"), &id("e1")));
    }

    #[test]
    fn test_link_merges_existing_groups() {
        let mut graph = NavigationGraph::from_nodes([
            Node::new("w0", 0.0, 0.0, "g").stairs("west"),
            Node::new("w1", 0.0, 0.0, "1").stairs("west"),
            Node::new("e1", 9.0, 0.0, "1").stairs("east"),
            Node::new("e2", 9.0, 0.0, "2").stairs("east"),
        ]);

        graph.link_connectors(&id("w1"), &id("e1")).unwrap();

        assert!(graph.connectors_linked(&id("w0"), &id("w1")));
        assert!(graph.connectors_linked(&id("w1"), &id("e1")));
        // e1's old partner follows it into the merged group
        assert!(graph.connectors_linked(&id("e1"), &id("e2")));
        assert!(graph.connectors_linked(&id("w0"), &id("e2")));
    }

    #[test]
    fn test_replaced_node_drops_stale_edges() {
        let mut graph = NavigationGraph::from_nodes([
            Node::new("a", 0.0, 0.0, "g").with_connections(&["b"]),
            Node::new("b", 10.0, 0.0, "g").with_connections(&["c"]),
            Node::new("c", 20.0, 0.0, "g"),
        ]);
        graph.add_edge(&id("a"), &id("c"), Some(42.0)).unwrap();
        graph.block_edge(&id("b"), &id("c"), None).unwrap();

        // b no longer declares c; a still declares b
        graph.add_node(Node::new("b", 10.0, 5.0, "g"));

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.neighbors(&id("b")), &[id("a")]);
        assert_eq!(graph.neighbors(&id("c")), &[id("a")]);
        assert!(graph.edge(&id("b"), &id("c")).is_none());
        assert!(graph.blocked_edges().is_empty());
        let ab = graph.edge(&id("a"), &id("b")).unwrap();
        assert!((ab.distance - 125f64.sqrt()).abs() < 1e-9);
        assert_eq!(graph.pending_connection_count(), 0);
    }

    #[test]
    fn test_build_path_uses_edge_distance() {
        let mut graph = NavigationGraph::from_nodes([
            Node::new("s", 0.0, 0.0, "g").stairs("core"),
            Node::new("t", 0.0, 0.0, "1").stairs("core").with_connections(&["u"]),
            Node::new("u", 0.0, 3.0, "1"),
        ]);
        graph.add_edge(&id("s"), &id("t"), Some(12.0)).unwrap();

        let nodes = ["s", "t", "u"].iter().filter_map(|n| graph.node(&id(n)).cloned()).collect();
        let path = graph.build_path(nodes, 1.5);

        assert!((path.total_distance - 15.0).abs() < 1e-9);
        assert!((path.estimated_time_secs - 10.0).abs() < 1e-9);
        assert!((path.remaining_distance(1) - 3.0).abs() < 1e-9);
        assert!((graph.edge_distance(&id("t"), &id("s")) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_edges_on_floor() {
        let graph = NavigationGraph::from_nodes([
            Node::new("a", 0.0, 0.0, "g").with_connections(&["b"]),
            Node::new("b", 1.0, 0.0, "g").with_connections(&["a", "b1"]).stairs("core"),
            Node::new("b1", 1.0, 0.0, "1").with_connections(&["b", "c1"]).stairs("core"),
            Node::new("c1", 2.0, 0.0, "1").with_connections(&["b1"]),
        ]);
        assert_eq!(graph.edges_on_floor(&FloorId::from("g")).len(), 1);
        assert_eq!(graph.edges_on_floor(&FloorId::from("1")).len(), 1);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_remove_floor_parks_connections() {
        let mut graph = NavigationGraph::from_nodes([
            Node::new("a", 0.0, 0.0, "g").with_connections(&["b1"]),
            Node::new("b1", 0.0, 0.0, "1").with_connections(&["a", "c1"]),
            Node::new("c1", 1.0, 0.0, "1").with_connections(&["b1"]),
        ]);
        graph.block_edge(&id("b1"), &id("c1"), None).unwrap();

        assert_eq!(graph.remove_floor(&FloorId::from("1")), 2);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.neighbors(&id("a")).is_empty());
        assert!(graph.blocked_edges().is_empty());

        graph.add_node(Node::new("b1", 0.0, 0.0, "1"));
        assert_eq!(graph.neighbors(&id("a")), &[id("b1")]);
    }

    #[test]
    fn test_floors_sorted() {
        let graph = NavigationGraph::from_nodes([
            Node::new("a", 0.0, 0.0, "2"),
            Node::new("b", 0.0, 0.0, "1"),
            Node::new("c", 0.0, 0.0, "2"),
        ]);
        assert_eq!(graph.floors(), vec![FloorId::from("1"), FloorId::from("2")]);
    }
}
