//! Rail snapping: pin an estimated position onto the nearest walkable edge
//!
//! Pure functions of their inputs; nothing here mutates the graph or the
//! position state.

use crate::domain::geometry::{bearing, heading_diff, normalize_heading, project_onto_segment, Point};
use crate::domain::types::{Edge, EdgeKey, FloorId, Node};
use crate::infra::config::Config;
use crate::services::graph::{NavigationGraph, NodeMap};

/// Snapping thresholds
#[derive(Debug, Clone)]
pub struct RailSnapConfig {
    /// Heading deviation from the edge axis above which the heading is replaced
    pub heading_snap_threshold_deg: f64,
    /// Perpendicular distance beyond which a position counts as off path
    pub max_off_path_distance: f64,
}

impl Default for RailSnapConfig {
    fn default() -> Self {
        Self { heading_snap_threshold_deg: 20.0, max_off_path_distance: 3.0 }
    }
}

impl RailSnapConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            heading_snap_threshold_deg: config.heading_snap_threshold_deg(),
            max_off_path_distance: config.max_off_path_distance(),
        }
    }
}

/// Nearest-edge projection of a point
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSnap {
    pub edge: EdgeKey,
    /// Projected point on the segment
    pub point: Point,
    /// Perpendicular (clamped) distance from the query point
    pub distance: f64,
    /// Bearing from the edge's `from` to its `to` endpoint, degrees
    pub bearing: f64,
}

/// Outcome of a heading snap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingSnap {
    pub heading: f64,
    /// Whether the input heading deviated past the threshold
    pub corrected: bool,
}

/// Rail snapper
#[derive(Debug, Clone, Default)]
pub struct RailSnapper {
    config: RailSnapConfig,
}

impl RailSnapper {
    pub fn new(config: RailSnapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RailSnapConfig {
        &self.config
    }

    /// Closest non-blocked edge on `floor` to `point`
    ///
    /// Edges with an endpoint missing from `nodes` or off the floor are ignored.
    pub fn nearest_edge<'a>(
        &self,
        point: &Point,
        floor: &FloorId,
        edges: impl IntoIterator<Item = &'a Edge>,
        nodes: &NodeMap,
    ) -> Option<EdgeSnap> {
        let mut best: Option<EdgeSnap> = None;
        for edge in edges {
            if edge.is_blocked {
                continue;
            }
            let (Some(a), Some(b)) = (nodes.get(&edge.key.from), nodes.get(&edge.key.to)) else {
                continue;
            };
            if &a.floor != floor || &b.floor != floor {
                continue;
            }

            let (pa, pb) = (a.position(), b.position());
            let projection = project_onto_segment(point, &pa, &pb);
            if best.as_ref().is_some_and(|s| projection.distance >= s.distance) {
                continue;
            }
            best = Some(EdgeSnap {
                edge: edge.key.clone(),
                point: projection.point,
                distance: projection.distance,
                bearing: bearing(&pa, &pb),
            });
        }
        best
    }

    /// Nearest edge using the graph's floor partition
    pub fn snap(&self, graph: &NavigationGraph, point: &Point, floor: &FloorId) -> Option<EdgeSnap> {
        self.nearest_edge(point, floor, graph.edges_on_floor(floor), graph.nodes())
    }

    /// Align a heading with an edge axis when it deviates past the threshold
    ///
    /// An edge can be walked either way, so the comparison is against
    /// whichever orientation of the axis is closer to the current heading.
    pub fn snap_heading(&self, heading: f64, edge_bearing: f64) -> HeadingSnap {
        let forward = normalize_heading(edge_bearing);
        let backward = normalize_heading(edge_bearing + 180.0);
        let (axis, diff) = {
            let df = heading_diff(heading, forward);
            let db = heading_diff(heading, backward);
            if df.abs() <= db.abs() {
                (forward, df)
            } else {
                (backward, db)
            }
        };

        if diff.abs() > self.config.heading_snap_threshold_deg {
            HeadingSnap { heading: axis, corrected: true }
        } else {
            HeadingSnap { heading: normalize_heading(heading), corrected: false }
        }
    }

    /// True when there is no valid edge, or the nearest one is too far away
    pub fn is_off_path(&self, snap: Option<&EdgeSnap>) -> bool {
        match snap {
            Some(s) => s.distance > self.config.max_off_path_distance,
            None => true,
        }
    }

    /// Whether `point` lies within the off-path distance of any segment of a
    /// node sequence, considering only segments on `floor`
    pub fn near_route(&self, route: &[Node], point: &Point, floor: &FloorId) -> bool {
        route
            .windows(2)
            .filter(|w| &w[0].floor == floor && &w[1].floor == floor)
            .any(|w| {
                project_onto_segment(point, &w[0].position(), &w[1].position()).distance
                    <= self.config.max_off_path_distance
            })
            || route.iter().any(|n| {
                &n.floor == floor && n.position().distance(point) <= self.config.max_off_path_distance
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::NodeId;

    fn single_edge() -> NavigationGraph {
        NavigationGraph::from_nodes([
            Node::new("a", 0.0, 0.0, "g").with_connections(&["b"]),
            Node::new("b", 10.0, 0.0, "g"),
        ])
    }

    fn g() -> FloorId {
        FloorId::from("g")
    }

    #[test]
    fn test_projects_onto_single_edge() {
        let graph = single_edge();
        let snap = RailSnapper::default().snap(&graph, &Point::new(5.0, 1.0), &g()).unwrap();
        assert!((snap.point.x - 5.0).abs() < 1e-9);
        assert!(snap.point.y.abs() < 1e-9);
        assert!((snap.distance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamps_to_endpoint() {
        let graph = single_edge();
        let snap = RailSnapper::default().snap(&graph, &Point::new(13.0, 4.0), &g()).unwrap();
        assert!((snap.point.x - 10.0).abs() < 1e-9);
        assert!((snap.distance - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_skips_blocked_and_other_floor_edges() {
        let mut graph = NavigationGraph::from_nodes([
            Node::new("a", 0.0, 0.0, "g").with_connections(&["b"]),
            Node::new("b", 10.0, 0.0, "g"),
            Node::new("c", 0.0, 5.0, "g").with_connections(&["d"]),
            Node::new("d", 10.0, 5.0, "g"),
            Node::new("e", 0.0, 1.0, "1").with_connections(&["f"]),
            Node::new("f", 10.0, 1.0, "1"),
        ]);
        let snapper = RailSnapper::default();
        let p = Point::new(5.0, 1.0);

        let snap = snapper.snap(&graph, &p, &g()).unwrap();
        assert_eq!(snap.edge.canonical().from, NodeId::from("a"));

        graph.block_edge(&NodeId::from("a"), &NodeId::from("b"), None).unwrap();
        let snap = snapper.snap(&graph, &p, &g()).unwrap();
        assert_eq!(snap.edge.canonical().from, NodeId::from("c"));
        assert!((snap.distance - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_edges_is_off_path() {
        let graph = NavigationGraph::from_nodes([Node::new("lonely", 0.0, 0.0, "g")]);
        let snapper = RailSnapper::default();
        let snap = snapper.snap(&graph, &Point::new(0.0, 0.0), &g());
        assert!(snap.is_none());
        assert!(snapper.is_off_path(snap.as_ref()));
    }

    #[test]
    fn test_off_path_is_monotonic() {
        let graph = single_edge();
        let snapper = RailSnapper::default();
        let mut was_off = false;
        for i in 0..40 {
            let p = Point::new(5.0, i as f64 * 0.25);
            let off = snapper.is_off_path(snapper.snap(&graph, &p, &g()).as_ref());
            assert!(!(was_off && !off), "flipped back at y={}", p.y);
            was_off = off;
        }
        assert!(was_off);
    }

    #[test]
    fn test_heading_snap_threshold() {
        let snapper = RailSnapper::default();
        // Edge pointing east
        let kept = snapper.snap_heading(105.0, 90.0);
        assert!(!kept.corrected);
        assert!((kept.heading - 105.0).abs() < 1e-9);

        let snapped = snapper.snap_heading(125.0, 90.0);
        assert!(snapped.corrected);
        assert!((snapped.heading - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_heading_snap_reverse_direction() {
        let snapper = RailSnapper::default();
        // Walking west along an east-pointing edge
        let snap = snapper.snap_heading(300.0, 90.0);
        assert!(snap.corrected);
        assert!((snap.heading - 270.0).abs() < 1e-9);

        let snap = snapper.snap_heading(355.0, 0.0);
        assert!(!snap.corrected);
    }

    #[test]
    fn test_near_route() {
        let route = vec![
            Node::new("a", 0.0, 0.0, "g"),
            Node::new("b", 10.0, 0.0, "g"),
            Node::new("c", 10.0, 0.0, "1"),
        ];
        let snapper = RailSnapper::default();
        assert!(snapper.near_route(&route, &Point::new(5.0, 2.0), &g()));
        assert!(!snapper.near_route(&route, &Point::new(5.0, 8.0), &g()));
        assert!(snapper.near_route(&route, &Point::new(11.0, 1.0), &FloorId::from("1")));
    }
}
