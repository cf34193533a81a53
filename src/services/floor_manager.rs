//! Cross-floor routing through linked stairs and elevators
//!
//! For every pair of linked connectors (one on the start floor, one on the
//! goal floor) the route is two same-floor legs joined at the connector.
//! The shortest combined candidate wins.
//!
//! The hop between a linked pair follows the graph edge joining them when
//! there is one: a blocked edge rules the pair out and its distance is the
//! hop's length. A pair linked only by group or `link_connectors` has no edge
//! to block and costs the planar gap.

use crate::domain::types::{FloorId, Node, NodeId};
use crate::services::graph::NavigationGraph;
use crate::services::pathfinder::Pathfinder;
use tracing::debug;

/// A stitched cross-floor route
#[derive(Debug, Clone, PartialEq)]
pub struct CrossFloorRoute {
    /// Node ids from start to goal inclusive
    pub path: Vec<NodeId>,
    /// Leg distances plus the hop between the two connectors
    pub distance: f64,
    /// Connector on the start floor and its linked twin on the goal floor
    pub via: (NodeId, NodeId),
    /// Nodes expanded across every leg search
    pub nodes_expanded: usize,
}

/// Floor manager
#[derive(Debug, Clone, Default)]
pub struct FloorManager {
    pathfinder: Pathfinder,
}

impl FloorManager {
    pub fn new(pathfinder: Pathfinder) -> Self {
        Self { pathfinder }
    }

    /// Cheapest stitched route from `start` to `goal` on different floors
    ///
    /// Returns `None` when the floors are the same, an endpoint is unknown,
    /// or no linked connector pair yields two feasible legs.
    pub fn plan(
        &self,
        graph: &NavigationGraph,
        start: &NodeId,
        goal: &NodeId,
    ) -> Option<CrossFloorRoute> {
        let start_floor = graph.node(start)?.floor.clone();
        let goal_floor = graph.node(goal)?.floor.clone();
        if start_floor == goal_floor {
            return None;
        }

        let mut best: Option<CrossFloorRoute> = None;
        let mut expanded = 0usize;

        for (up, down) in self.connector_pairs(graph, &start_floor, &goal_floor) {
            let leg1 = self.pathfinder.find_path_on_floor(graph, start, &up.id, &start_floor);
            expanded += leg1.nodes_expanded;
            if !leg1.found() {
                continue;
            }
            let leg2 = self.pathfinder.find_path_on_floor(graph, &down.id, goal, &goal_floor);
            expanded += leg2.nodes_expanded;
            if !leg2.found() {
                continue;
            }

            let distance = leg1.cost + graph.edge_distance(&up.id, &down.id) + leg2.cost;
            debug!(
                via_up = %up.id,
                via_down = %down.id,
                distance = %format!("{:.1}", distance),
                "floor_candidate"
            );
            if best.as_ref().is_some_and(|b| distance >= b.distance) {
                continue;
            }
            best = Some(CrossFloorRoute {
                path: stitch(leg1.path, leg2.path),
                distance,
                via: (up.id.clone(), down.id.clone()),
                nodes_expanded: 0,
            });
        }

        best.map(|mut route| {
            route.nodes_expanded = expanded;
            route
        })
    }

    /// Stitched node sequence, empty when there is no route
    pub fn find_cross_floor_path(
        &self,
        graph: &NavigationGraph,
        start: &NodeId,
        goal: &NodeId,
    ) -> Vec<Node> {
        self.plan(graph, start, goal)
            .map(|route| route.path.iter().filter_map(|id| graph.node(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Walkable connector pairs representing the same staircase or elevator
    fn connector_pairs<'g>(
        &self,
        graph: &'g NavigationGraph,
        from: &FloorId,
        to: &FloorId,
    ) -> Vec<(&'g Node, &'g Node)> {
        let ups = graph.floor_connectors(from);
        let downs = graph.floor_connectors(to);
        let mut pairs = Vec::new();
        for up in ups.iter().filter(|n| n.is_walkable) {
            for down in downs.iter().filter(|n| n.is_walkable) {
                if !graph.connectors_linked(&up.id, &down.id) {
                    continue;
                }
                if graph.is_edge_blocked(&up.id, &down.id) {
                    debug!(up = %up.id, down = %down.id, "floor_connector_blocked");
                    continue;
                }
                pairs.push((*up, *down));
            }
        }
        pairs
    }
}

/// Join two legs, dropping the duplicated node at the seam
fn stitch(mut first: Vec<NodeId>, second: Vec<NodeId>) -> Vec<NodeId> {
    let skip = usize::from(first.last().is_some() && first.last() == second.first());
    first.extend(second.into_iter().skip(skip));
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    /// Two floors with a staircase at x=0 and an elevator at x=30
    fn two_floors() -> NavigationGraph {
        NavigationGraph::from_nodes([
            Node::new("g_start", 10.0, 0.0, "g").with_connections(&["g_stairs", "g_lift"]),
            Node::new("g_stairs", 0.0, 0.0, "g").with_connections(&["1_stairs"]).stairs("core"),
            Node::new("g_lift", 30.0, 0.0, "g").with_connections(&["1_lift"]).elevator("lift"),
            Node::new("1_stairs", 0.0, 0.0, "1").with_connections(&["1_goal"]).stairs("core"),
            Node::new("1_lift", 30.0, 0.0, "1").with_connections(&["1_goal"]).elevator("lift"),
            Node::new("1_goal", 25.0, 0.0, "1").with_connections(&["1_stairs", "1_lift"]),
        ])
    }

    fn ids(path: &[NodeId]) -> Vec<&str> {
        path.iter().map(|n| n.0.as_str()).collect()
    }

    #[test]
    fn test_picks_shortest_connector_pair() {
        let graph = two_floors();
        let route = FloorManager::default().plan(&graph, &id("g_start"), &id("1_goal")).unwrap();
        // stairs: 10 + 0 + 25 = 35, elevator: 20 + 0 + 5 = 25
        assert_eq!(ids(&route.path), vec!["g_start", "g_lift", "1_lift", "1_goal"]);
        assert!((route.distance - 25.0).abs() < 1e-9);
        assert_eq!(route.via, (id("g_lift"), id("1_lift")));
        assert!(route.nodes_expanded > 0);
    }

    #[test]
    fn test_blocked_leg_falls_back_to_other_connector() {
        let mut graph = two_floors();
        graph.block_edge(&id("1_lift"), &id("1_goal"), Some("maintenance")).unwrap();
        let path = FloorManager::default().find_cross_floor_path(&graph, &id("g_start"), &id("1_goal"));
        let got: Vec<&str> = path.iter().map(|n| n.id.0.as_str()).collect();
        assert_eq!(got, vec!["g_start", "g_stairs", "1_stairs", "1_goal"]);
    }

    #[test]
    fn test_blocked_elevator_edge_falls_back_to_stairs() {
        let mut graph = two_floors();
        graph.block_edge(&id("g_lift"), &id("1_lift"), Some("out of service")).unwrap();

        let route = FloorManager::default().plan(&graph, &id("g_start"), &id("1_goal")).unwrap();

        assert_eq!(ids(&route.path), vec!["g_start", "g_stairs", "1_stairs", "1_goal"]);
        assert_eq!(route.via, (id("g_stairs"), id("1_stairs")));
        for pair in route.path.windows(2) {
            assert!(!graph.is_edge_blocked(&pair[0], &pair[1]));
        }
    }

    #[test]
    fn test_blocked_only_staircase_gives_no_route() {
        let mut graph = NavigationGraph::from_nodes([
            Node::new("a", 0.0, 0.0, "g").with_connections(&["gs"]),
            Node::new("gs", 5.0, 0.0, "g").with_connections(&["a", "1s"]).stairs("core"),
            Node::new("1s", 5.0, 0.0, "1").with_connections(&["gs", "b"]).stairs("core"),
            Node::new("b", 10.0, 0.0, "1").with_connections(&["1s"]),
        ]);
        graph.block_edge(&id("gs"), &id("1s"), None).unwrap();

        let manager = FloorManager::default();
        assert!(manager.plan(&graph, &id("a"), &id("b")).is_none());
        assert!(manager.find_cross_floor_path(&graph, &id("a"), &id("b")).is_empty());
    }

    #[test]
    fn test_connector_edge_distance_is_the_hop() {
        let mut graph = two_floors();
        graph.add_edge(&id("g_stairs"), &id("1_stairs"), Some(12.0)).unwrap();
        graph.block_edge(&id("1_lift"), &id("1_goal"), None).unwrap();

        let route = FloorManager::default().plan(&graph, &id("g_start"), &id("1_goal")).unwrap();

        // 10 to the stairs, 12 up, 25 across
        assert!((route.distance - 47.0).abs() < 1e-9);
    }

    #[test]
    fn test_unlinked_connectors_give_no_route() {
        let graph = NavigationGraph::from_nodes([
            Node::new("a", 0.0, 0.0, "g").with_connections(&["s"]),
            Node::new("s", 1.0, 0.0, "g").stairs("east"),
            Node::new("t", 1.0, 0.0, "1").stairs("west").with_connections(&["b"]),
            Node::new("b", 2.0, 0.0, "1"),
        ]);
        assert!(FloorManager::default().plan(&graph, &id("a"), &id("b")).is_none());
        assert!(FloorManager::default()
            .find_cross_floor_path(&graph, &id("a"), &id("b"))
            .is_empty());
    }

    #[test]
    fn test_same_floor_is_not_handled() {
        let graph = two_floors();
        assert!(FloorManager::default().plan(&graph, &id("g_start"), &id("g_lift")).is_none());
    }

    #[test]
    fn test_start_on_connector() {
        let graph = two_floors();
        let route = FloorManager::default().plan(&graph, &id("g_stairs"), &id("1_stairs")).unwrap();
        assert_eq!(ids(&route.path), vec!["g_stairs", "1_stairs"]);
        assert_eq!(route.distance, 0.0);
    }

    #[test]
    fn test_stitch_drops_seam_duplicate() {
        let joined = stitch(vec![id("a"), id("s")], vec![id("s"), id("b")]);
        assert_eq!(ids(&joined), vec!["a", "s", "b"]);
        let joined = stitch(vec![id("a"), id("s")], vec![id("t"), id("b")]);
        assert_eq!(ids(&joined), vec!["a", "s", "t", "b"]);
    }
}
