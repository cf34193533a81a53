//! Graph Check - validates a building graph file and optionally plans a route
//!
//! Reports per-floor node and edge counts, connections that point at
//! unknown nodes, and stairs/elevators with no linked partner on another
//! floor. With `--from` and `--to` it also plans a route and prints the
//! turn-by-turn instructions.
//!
//! Usage:
//!   graph-check data/two_floor.json
//!   graph-check data/two_floor.json --from g_entrance --to 1_office
//!   graph-check data/two_floor.json --from g_entrance --to 1_office --block g_hall:g_stairs

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use wayfinder::domain::route::Path;
use wayfinder::domain::types::{Node, NodeId};
use wayfinder::infra::Config;
use wayfinder::io::load_graph;
use wayfinder::services::{FloorManager, NavigationGraph, Pathfinder, PathfinderConfig};

/// Graph Check - building graph validation
#[derive(Parser, Debug)]
#[command(name = "graph-check", version, about, long_about = None)]
struct Args {
    /// Building graph JSON file
    graph: String,

    /// Path to TOML configuration file (routing section only)
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Route start node id
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// Route goal node id
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Edges to block before routing, `a:b` (repeatable)
    #[arg(long)]
    block: Vec<String>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    let mut graph = match load_graph(&args.graph) {
        Ok(g) => g,
        Err(e) => {
            error!(error = %format!("{e:#}"), "graph_load_failed");
            return ExitCode::FAILURE;
        }
    };

    let problems = report(&graph);

    for raw in &args.block {
        let Some((a, b)) = raw.split_once(':') else {
            error!(block = %raw, "block_expects_from_colon_to");
            return ExitCode::FAILURE;
        };
        if let Err(e) = graph.block_edge(&NodeId::from(a), &NodeId::from(b), Some("graph-check")) {
            error!(error = %e, "block_failed");
            return ExitCode::FAILURE;
        }
    }

    if let (Some(from), Some(to)) = (args.from.as_deref(), args.to.as_deref()) {
        let pathfinder = Pathfinder::new(PathfinderConfig::from_config(&config));
        let path = plan(&graph, &pathfinder, &NodeId::from(from), &NodeId::from(to))
            .map(|nodes| graph.build_path(nodes, config.walking_speed_mps()))
            .unwrap_or_default();
        if path.is_empty() {
            println!("\nno route from {} to {}", from, to);
            return ExitCode::FAILURE;
        }
        print_route(&path);
    }

    if problems > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Print the graph summary; returns the number of problems found
fn report(graph: &NavigationGraph) -> usize {
    println!("nodes: {}  edges: {}", graph.node_count(), graph.edge_count());

    for floor in graph.floors() {
        let nodes = graph.iter_nodes().filter(|n| n.floor == floor).count();
        let edges = graph.edges_on_floor(&floor).len();
        let connectors = graph.floor_connectors(&floor).len();
        println!(
            "floor {:>4}: {:>4} nodes  {:>4} edges  {:>2} connectors",
            floor, nodes, edges, connectors
        );
    }

    let mut problems = 0;
    let pending = graph.pending_connection_count();
    if pending > 0 {
        println!("unresolved connections: {}", pending);
        problems += pending;
    }

    for node in graph.iter_nodes().filter(|n| n.is_floor_connector()) {
        let partnered = graph
            .iter_nodes()
            .any(|other| other.floor != node.floor && graph.connectors_linked(&node.id, &other.id));
        if !partnered {
            println!("connector without a linked partner: {} ({})", node.id, node.floor);
            problems += 1;
        }
    }

    info!(problems = %problems, "graph_checked");
    problems
}

/// Node sequence between two known nodes; `None` for unknown ids
fn plan(
    graph: &NavigationGraph,
    pathfinder: &Pathfinder,
    start: &NodeId,
    goal: &NodeId,
) -> Option<Vec<Node>> {
    let same_floor = graph.node(start)?.floor == graph.node(goal)?.floor;
    let nodes = if same_floor {
        pathfinder.find_path(graph.nodes(), start, goal, Some(graph))
    } else {
        FloorManager::new(pathfinder.clone()).find_cross_floor_path(graph, start, goal)
    };
    Some(nodes)
}

fn print_route(path: &Path) {
    println!(
        "\nroute: {} nodes, {:.1} m, ~{:.0} s",
        path.len(),
        path.total_distance,
        path.estimated_time_secs
    );
    for step in 0..path.len() {
        let instruction = path.instruction_at(step);
        println!("  {:>2}. [{}] {}", step + 1, path.nodes[step].id, instruction.text);
    }
}
