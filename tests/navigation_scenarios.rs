//! End-to-end navigation scenarios through the public API

use std::sync::Arc;
use wayfinder::domain::geometry::Point;
use wayfinder::domain::types::{
    Confidence, FloorId, NavigationStatus, Node, NodeId, PositionSource, SensorConfidence,
    WalkingState,
};
use wayfinder::infra::{Config, Metrics};
use wayfinder::io::{create_event_channel, load_graph, NavigationEvent, SensorFeed};
use wayfinder::services::{
    Destination, FusionConfig, FusionEngine, NavigationCommand, NavigationEngine,
    NavigationGraph, Pathfinder, PositionInput, RailSnapper,
};

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn ids(nodes: &[Node]) -> Vec<&str> {
    nodes.iter().map(|n| n.id.0.as_str()).collect()
}

fn abc() -> NavigationGraph {
    NavigationGraph::from_nodes([
        Node::new("A", 0.0, 0.0, "g").with_connections(&["B"]),
        Node::new("B", 10.0, 0.0, "g").with_connections(&["C"]),
        Node::new("C", 20.0, 0.0, "g"),
    ])
}

fn engine_over(graph: NavigationGraph) -> (NavigationEngine, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let events = create_event_channel(256, "scenario".to_string());
    let engine = NavigationEngine::new(Config::default(), graph, metrics.clone(), events);
    (engine, metrics)
}

#[test]
fn test_block_and_unblock_only_path() {
    let mut graph = abc();
    let pathfinder = Pathfinder::default();

    let path = pathfinder.find_path(graph.nodes(), &id("A"), &id("C"), Some(&graph));
    assert_eq!(ids(&path), vec!["A", "B", "C"]);

    graph.block_edge(&id("A"), &id("B"), Some("cleaning")).unwrap();
    assert!(pathfinder.find_path(graph.nodes(), &id("A"), &id("C"), Some(&graph)).is_empty());
    // Repeated searches agree
    assert!(pathfinder.find_path(graph.nodes(), &id("A"), &id("C"), Some(&graph)).is_empty());

    assert!(graph.unblock_edge(&id("A"), &id("B")).unwrap());
    let path = pathfinder.find_path(graph.nodes(), &id("A"), &id("C"), Some(&graph));
    assert_eq!(ids(&path), vec!["A", "B", "C"]);
}

#[test]
fn test_qr_fix_then_idle_sensors() {
    let events = create_event_channel(16, "scenario".to_string());
    let mut fusion = FusionEngine::new(FusionConfig::default(), events);

    let qr = PositionInput::Qr { node: Node::new("qr-5-5", 5.0, 5.0, "g"), heading: Some(90.0) };
    let fixed = fusion.apply(qr, None).unwrap();
    assert_eq!((fixed.x, fixed.y), (5.0, 5.0));
    assert_eq!(fixed.confidence, Confidence::High);
    assert_eq!(fixed.source, PositionSource::Qr);

    let idle = PositionInput::DeadReckoning {
        steps: 0,
        heading: 90.0,
        sensor_confidence: SensorConfidence::High,
        walking: WalkingState::Walking,
    };
    fusion.apply(idle, None);
    let current = fusion.current().unwrap();
    assert_eq!((current.x, current.y), (5.0, 5.0));
}

#[test]
fn test_rail_snap_single_edge() {
    let graph = NavigationGraph::from_nodes([
        Node::new("a", 0.0, 0.0, "g").with_connections(&["b"]),
        Node::new("b", 10.0, 0.0, "g"),
    ]);

    let snap = RailSnapper::default().snap(&graph, &Point::new(5.0, 1.0), &FloorId::from("g")).unwrap();

    assert_eq!(snap.point, Point::new(5.0, 0.0));
    assert!((snap.distance - 1.0).abs() < 1e-9);
}

#[test]
fn test_walk_corridor_to_arrival() {
    let graph = NavigationGraph::from_nodes([
        Node::new("a", 0.0, 0.0, "g").with_connections(&["b"]),
        Node::new("b", 30.0, 0.0, "g").with_location("exit"),
    ]);
    let (mut engine, metrics) = engine_over(graph);
    let mut arrivals = engine.events().subscribe_events();

    engine.handle_command(NavigationCommand::QrScan { node_id: id("a"), heading: Some(90.0) });
    engine.handle_command(NavigationCommand::Start(Destination::location("exit", 30.0, 0.0, "g")));
    assert_eq!(engine.status(), NavigationStatus::Navigating);

    let mut feed = SensorFeed::new();
    feed.set_walking(WalkingState::Walking);
    feed.set_heading(90.0, SensorConfidence::High);

    let mut ticks = 0;
    while engine.status() == NavigationStatus::Navigating && ticks < 20 {
        feed.push_steps(6);
        engine.tick(&mut feed);
        ticks += 1;
    }

    // 4.2 m per tick, arrival radius 5 m short of 30 m
    assert_eq!(engine.status(), NavigationStatus::Arrived);
    assert_eq!(ticks, 6);
    assert_eq!(metrics.ticks_total(), 6);
    let pos = engine.position().unwrap();
    assert_eq!(pos.source, PositionSource::DeadReckoning);
    assert!(pos.y.abs() < 1e-9);

    let mut saw_arrival = false;
    while let Ok(event) = arrivals.try_recv() {
        if let NavigationEvent::Status(s) = event {
            saw_arrival |= s.to == NavigationStatus::Arrived;
        }
    }
    assert!(saw_arrival);
}

#[test]
fn test_two_floor_building_reroutes_around_block() {
    let graph = load_graph(concat!(env!("CARGO_MANIFEST_DIR"), "/data/two_floor.json")).unwrap();
    let (mut engine, metrics) = engine_over(graph);

    engine.handle_command(NavigationCommand::QrScan { node_id: id("g_entrance"), heading: None });
    let status = engine.start_from_current(Destination::location("office-102", 0.0, 0.0, "1"));
    assert_eq!(status, NavigationStatus::Navigating);
    assert_eq!(
        ids(&engine.path().nodes),
        vec!["g_entrance", "g_hall", "g_stairs", "1_stairs", "1_hall", "1_office"]
    );
    assert!(engine.path().crosses_floors);

    engine.handle_command(NavigationCommand::BlockEdge {
        from: id("g_hall"),
        to: id("g_stairs"),
        reason: Some("wet floor".to_string()),
    });

    assert_eq!(engine.status(), NavigationStatus::Navigating);
    assert_eq!(
        ids(&engine.path().nodes),
        vec!["g_entrance", "g_cafe", "g_stairs", "1_stairs", "1_hall", "1_office"]
    );
    assert_eq!(metrics.reroutes_total(), 1);
    assert_eq!(engine.graph().blocked_edges().len(), 1);
}
