//! Building graph files
//!
//! Graphs are stored as JSON:
//!
//! ```json
//! {
//!   "nodes": [{ "id": "lobby", "x": 0.0, "y": 0.0, "floor": "g", "connections": ["hall"] }],
//!   "connector_links": [["g_stairs", "1_stairs"]],
//!   "edges": [{ "from": "hall", "to": "cafe", "distance": 14.0 }]
//! }
//! ```
//!
//! `connections` on nodes and the `edges` list both produce undirected
//! edges; `edges` may override the planar distance.

use crate::domain::types::{Node, NodeId};
use crate::services::graph::NavigationGraph;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Explicit edge entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: NodeId,
    pub to: NodeId,
    /// Walking distance when it differs from the straight line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// On-disk graph layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphFile {
    pub nodes: Vec<Node>,
    /// Pairs of connectors that are the same staircase or elevator
    #[serde(default)]
    pub connector_links: Vec<(NodeId, NodeId)>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl GraphFile {
    /// Build the navigation graph, failing on edges or links to unknown nodes
    pub fn into_graph(self) -> Result<NavigationGraph> {
        let mut graph = NavigationGraph::from_nodes(self.nodes);

        for edge in &self.edges {
            graph
                .add_edge(&edge.from, &edge.to, edge.distance)
                .with_context(|| format!("Invalid edge {} -> {}", edge.from, edge.to))?;
        }
        for (a, b) in &self.connector_links {
            graph
                .link_connectors(a, b)
                .with_context(|| format!("Invalid connector link {} <-> {}", a, b))?;
        }

        let dangling = graph.pending_connection_count();
        if dangling > 0 {
            warn!(pending = %dangling, "graph_has_unresolved_connections");
        }
        Ok(graph)
    }
}

/// Parse a graph from JSON text
pub fn parse_graph(json: &str) -> Result<NavigationGraph> {
    let file: GraphFile = serde_json::from_str(json).context("Failed to parse graph JSON")?;
    file.into_graph()
}

/// Load a graph from a JSON file
pub fn load_graph<P: AsRef<Path>>(path: P) -> Result<NavigationGraph> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph file {}", path.display()))?;
    let graph =
        parse_graph(&content).with_context(|| format!("Invalid graph file {}", path.display()))?;

    info!(
        path = %path.display(),
        nodes = %graph.node_count(),
        edges = %graph.edge_count(),
        floors = %graph.floors().len(),
        "graph_loaded"
    );
    Ok(graph)
}
