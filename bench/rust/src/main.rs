//! Route latency benchmark - measures A* and cross-floor planning on a synthetic building
//!
//! Builds a grid of corridors per floor, links floors with a staircase in one
//! corner and an elevator in the opposite one, then times searches between
//! pseudo-random node pairs.

use clap::Parser;
use std::time::Instant;
use wayfinder::domain::types::{Node, NodeId};
use wayfinder::services::{FloorManager, NavigationGraph, Pathfinder};

#[derive(Parser)]
#[command(name = "route-bench")]
struct Args {
    /// Floors in the building
    #[arg(long, default_value = "4")]
    floors: u32,
    /// Grid width per floor (nodes)
    #[arg(long, default_value = "40")]
    width: u32,
    /// Grid height per floor (nodes)
    #[arg(long, default_value = "40")]
    height: u32,
    /// Grid spacing in meters
    #[arg(long, default_value = "3.0")]
    spacing: f64,
    #[arg(short, long, default_value = "200")]
    trials: u32,
    /// Fraction of edges to block before searching
    #[arg(long, default_value = "0.05")]
    blocked: f64,
}

fn node_id(floor: u32, x: u32, y: u32) -> String {
    format!("f{}-{}-{}", floor, x, y)
}

fn build_building(args: &Args) -> NavigationGraph {
    let mut nodes = Vec::with_capacity((args.floors * args.width * args.height) as usize);
    for f in 0..args.floors {
        for y in 0..args.height {
            for x in 0..args.width {
                let mut connections = Vec::with_capacity(2);
                if x + 1 < args.width {
                    connections.push(node_id(f, x + 1, y));
                }
                if y + 1 < args.height {
                    connections.push(node_id(f, x, y + 1));
                }
                let refs: Vec<&str> = connections.iter().map(String::as_str).collect();
                let mut node = Node::new(
                    node_id(f, x, y),
                    x as f64 * args.spacing,
                    y as f64 * args.spacing,
                    format!("{}", f),
                )
                .with_connections(&refs);
                if x == 0 && y == 0 {
                    node = node.stairs("stairs");
                } else if x + 1 == args.width && y + 1 == args.height {
                    node = node.elevator("lift");
                }
                nodes.push(node);
            }
        }
    }
    NavigationGraph::from_nodes(nodes)
}

/// Small LCG so runs are repeatable without extra dependencies
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u32) -> u32 {
        (self.next() % n.max(1) as u64) as u32
    }
}

fn print_stats(label: &str, mut results: Vec<u64>, found: usize, trials: u32) {
    println!("\n{}:", label);
    if results.is_empty() {
        println!("  No searches!");
        return;
    }
    results.sort();
    let sum: u64 = results.iter().sum();
    let avg = sum / results.len() as u64;
    let max = results[results.len() - 1];
    let p50 = results[results.len() / 2];
    let p95 = results[((results.len() as f64 * 0.95) as usize).min(results.len() - 1)];

    println!("  Found: {}/{}", found, trials);
    println!("  Min: {} us", results[0]);
    println!("  Max: {} us", max);
    println!("  Avg: {} us", avg);
    println!("  P50: {} us", p50);
    println!("  P95: {} us", p95);
}

fn main() {
    let args = Args::parse();

    println!("Route Latency Benchmark (Rust)");
    println!("==============================");
    println!(
        "Floors: {}  Grid: {}x{}  Spacing: {} m",
        args.floors, args.width, args.height, args.spacing
    );
    println!("Trials: {}", args.trials);

    let build_start = Instant::now();
    let mut graph = build_building(&args);
    println!(
        "Graph: {} nodes, {} edges in {} ms",
        graph.node_count(),
        graph.edge_count(),
        build_start.elapsed().as_millis()
    );

    let mut rng = Lcg(0x5eed);
    let to_block = (graph.edge_count() as f64 * args.blocked) as usize;
    for _ in 0..to_block {
        let (f, x, y) = (rng.below(args.floors), rng.below(args.width), rng.below(args.height));
        let from = NodeId(node_id(f, x, y));
        let to = NodeId(node_id(f, (x + 1).min(args.width - 1), y));
        let _ = graph.block_edge(&from, &to, Some("bench"));
    }
    println!("Blocked: {} edges", graph.blocked_edges().len());

    let pathfinder = Pathfinder::default();
    let floor_manager = FloorManager::new(pathfinder.clone());

    let mut same_floor = Vec::with_capacity(args.trials as usize);
    let mut cross_floor = Vec::with_capacity(args.trials as usize);
    let (mut same_found, mut cross_found) = (0, 0);

    for _ in 0..args.trials {
        let f = rng.below(args.floors);
        let start = NodeId(node_id(f, rng.below(args.width), rng.below(args.height)));
        let goal = NodeId(node_id(f, rng.below(args.width), rng.below(args.height)));
        let t = Instant::now();
        let path = pathfinder.find_path(graph.nodes(), &start, &goal, Some(&graph));
        same_floor.push(t.elapsed().as_micros() as u64);
        same_found += usize::from(!path.is_empty());

        if args.floors > 1 {
            let g = (f + 1 + rng.below(args.floors - 1)) % args.floors;
            let goal = NodeId(node_id(g, rng.below(args.width), rng.below(args.height)));
            let t = Instant::now();
            let route = floor_manager.plan(&graph, &start, &goal);
            cross_floor.push(t.elapsed().as_micros() as u64);
            cross_found += usize::from(route.is_some());
        }
    }

    println!("\n==============================");
    println!("Results:");
    print_stats("Same floor A*", same_floor, same_found, args.trials);
    if args.floors > 1 {
        print_stats("Cross floor", cross_floor, cross_found, args.trials);
    }
}
