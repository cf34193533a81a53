//! Integration tests for graph file loading

use std::io::Write;
use tempfile::NamedTempFile;
use wayfinder::domain::types::{FloorId, NodeId};
use wayfinder::io::load_graph;

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

#[test]
fn test_load_shipped_building() {
    let graph = load_graph(concat!(env!("CARGO_MANIFEST_DIR"), "/data/two_floor.json")).unwrap();

    assert_eq!(graph.node_count(), 10);
    assert_eq!(graph.edge_count(), 10);
    assert_eq!(graph.floors(), vec![FloorId::from("1"), FloorId::from("g")]);
    assert_eq!(graph.pending_connection_count(), 0);

    // Stairs linked by group, lifts by an explicit pair
    assert!(graph.connectors_linked(&id("g_stairs"), &id("1_stairs")));
    assert!(graph.connectors_linked(&id("g_lift"), &id("1_lift")));
    assert!(!graph.connectors_linked(&id("g_stairs"), &id("1_lift")));

    let stairs = graph.edge(&id("1_stairs"), &id("g_stairs")).unwrap();
    assert_eq!(stairs.distance, 12.0);
    assert_eq!(graph.node_by_location("office-102").map(|n| n.id.clone()), Some(id("1_office")));
}

#[test]
fn test_unresolved_connection_is_parked() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"{
            "nodes": [
                { "id": "a", "x": 0.0, "y": 0.0, "floor": "g", "connections": ["b", "later"] },
                { "id": "b", "x": 5.0, "y": 0.0, "floor": "g" }
            ]
        }"#,
    )
    .unwrap();
    file.flush().unwrap();

    let graph = load_graph(file.path()).unwrap();

    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.pending_connection_count(), 1);
}

#[test]
fn test_missing_file_has_context() {
    let err = load_graph("/nonexistent/building.json").unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read graph file"));
}

#[test]
fn test_link_to_unknown_connector_fails() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"{
            "nodes": [{ "id": "s", "x": 0.0, "y": 0.0, "floor": "g", "is_stairs": true }],
            "connector_links": [["s", "ghost"]]
        }"#,
    )
    .unwrap();
    file.flush().unwrap();

    let err = load_graph(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("Invalid connector link"));
}
