//! Wayfinder demo - drives the navigation core from a simulated walker
//!
//! Loads a config and a building graph, fixes the start with a QR scan,
//! plans a route and walks it with a simulated phone whose compass can be
//! biased. Every navigation event is logged.
//!
//! Module structure:
//! - `domain/` - Core value types (Node, Path, FusedPosition)
//! - `io/` - Event streams, sensor feed, graph files, simulator
//! - `services/` - Graph, A*, rail snapping, fusion, navigation engine
//! - `infra/` - Infrastructure (Config, Metrics)
//!
//! Usage:
//!   cargo run -- --graph data/two_floor.json --from g_entrance --to office-102
//!   cargo run -- --from g_entrance --to office-102 --block g_hall:g_stairs --bias 25

use anyhow::{bail, Context};
use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use wayfinder::domain::types::{NavigationStatus, NodeId};
use wayfinder::infra::{Config, Metrics};
use wayfinder::io::{
    create_event_channel, load_graph, NavigationEvent, SensorFeed, SimulatedWalker, WalkerConfig,
};
use wayfinder::services::{Destination, NavigationCommand, NavigationEngine};

/// Wayfinder - indoor navigation demo
#[derive(Parser, Debug)]
#[command(name = "wayfinder", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Building graph JSON file
    #[arg(short, long, default_value = "data/two_floor.json")]
    graph: String,

    /// Node id where the walker scans its first QR code
    #[arg(long, default_value = "g_entrance")]
    from: String,

    /// Destination location id or node id
    #[arg(long, default_value = "office-102")]
    to: String,

    /// Block an edge `a:b` after the walker's first few steps
    #[arg(long)]
    block: Option<String>,

    /// Constant compass bias of the simulated phone, degrees
    #[arg(long, default_value = "0.0")]
    bias: f64,

    /// Walker cadence in milliseconds
    #[arg(long, default_value = "500")]
    step_ms: u64,

    /// Give up after this many walker steps
    #[arg(long, default_value = "2000")]
    max_steps: u64,
}

/// Walker steps before `--block` is applied
const BLOCK_AFTER_STEPS: u64 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "wayfinder starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);
    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        floor_change_penalty = %config.floor_change_penalty(),
        arrival_radius = %config.arrival_radius(),
        tick_interval_ms = %config.tick_interval().as_millis(),
        "config_loaded"
    );

    let graph = load_graph(&args.graph)?;
    let destination = {
        let node = graph
            .node_by_location(&args.to)
            .or_else(|| graph.node(&NodeId::from(args.to.as_str())))
            .with_context(|| format!("Unknown destination {}", args.to))?;
        Destination {
            location_id: node.location_id.clone(),
            x: node.x,
            y: node.y,
            floor: node.floor.clone(),
        }
    };
    let block = match args.block.as_deref() {
        Some(raw) => match raw.split_once(':') {
            Some((a, b)) => Some((NodeId::from(a), NodeId::from(b))),
            None => bail!("--block expects from:to, got {}", raw),
        },
        None => None,
    };

    let metrics = Arc::new(Metrics::new());
    let events = create_event_channel(config.channel_capacity(), config.site_id().to_string());

    // Log every navigation event
    let mut event_rx = events.subscribe_events();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = %n, "event_log_lagged"),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    let engine = Arc::new(Mutex::new(NavigationEngine::new(
        config,
        graph,
        metrics.clone(),
        events,
    )));

    // Fix the start and plan before the loop takes over
    let route = {
        let mut e = engine.lock();
        e.handle_command(NavigationCommand::QrScan {
            node_id: NodeId::from(args.from.as_str()),
            heading: None,
        });
        let status = e.start_from_current(destination);
        if status != NavigationStatus::Navigating {
            let reason = e.last_failure().map(|f| f.to_string()).unwrap_or_default();
            bail!("could not start navigation from {}: {}", args.from, reason);
        }
        e.path().clone()
    };

    let feed = SensorFeed::new();
    let walker_config = WalkerConfig {
        step_length: engine.lock().config().step_length(),
        compass_bias_deg: args.bias,
        ..WalkerConfig::default()
    };
    let mut walker = SimulatedWalker::from_path(&route, feed.clone(), walker_config.clone());
    let mut route_ids: Vec<NodeId> = route.nodes.iter().map(|n| n.id.clone()).collect();

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let loop_engine = engine.clone();
    let engine_loop = tokio::spawn(NavigationEngine::run(loop_engine, cmd_rx, feed.clone()));
    info!("navigation_loop_started");

    let mut cadence = tokio::time::interval(Duration::from_millis(args.step_ms.max(1)));
    let mut steps = 0u64;
    loop {
        tokio::select! {
            _ = cadence.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown_signal_received");
                break;
            }
        }

        let (status, path_ids) = {
            let e = engine.lock();
            (e.status(), e.path().nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>())
        };
        match status {
            NavigationStatus::Arrived | NavigationStatus::Error | NavigationStatus::Idle => break,
            NavigationStatus::Navigating if path_ids != route_ids => {
                // Rerouted: follow the new route from its first node
                let path = engine.lock().path().clone();
                walker = SimulatedWalker::from_path(&path, feed.clone(), walker_config.clone());
                let truth = walker.truth();
                cmd_tx
                    .send(NavigationCommand::SimulatedFix {
                        x: truth.point.x,
                        y: truth.point.y,
                        floor: truth.floor,
                        heading: truth.heading,
                    })
                    .await?;
                route_ids = path_ids;
            }
            _ => {}
        }

        let Some(truth) = walker.step() else {
            info!("walker_finished");
            break;
        };
        steps += 1;

        if truth.changed_floor {
            cmd_tx
                .send(NavigationCommand::SimulatedFix {
                    x: truth.point.x,
                    y: truth.point.y,
                    floor: truth.floor.clone(),
                    heading: truth.heading,
                })
                .await?;
        }
        if steps == BLOCK_AFTER_STEPS {
            if let Some((from, to)) = block.clone() {
                cmd_tx
                    .send(NavigationCommand::BlockEdge { from, to, reason: Some("demo".into()) })
                    .await?;
            }
        }
        if steps >= args.max_steps {
            warn!(steps = %steps, "walker_step_limit_reached");
            break;
        }
    }

    drop(cmd_tx);
    engine_loop.await.context("navigation loop panicked")?;

    let e = engine.lock();
    info!(
        status = %e.status().as_str(),
        failure = ?e.last_failure(),
        walker_steps = %steps,
        "wayfinder shutdown complete"
    );
    metrics.report().log();
    Ok(())
}

fn log_event(event: &NavigationEvent) {
    match event {
        NavigationEvent::Route(r) => info!(
            step = %r.step_index,
            nodes = %r.path.len(),
            remaining_m = %format!("{:.1}", r.remaining_m),
            eta_secs = %format!("{:.0}", r.eta_secs),
            instruction = %r.instruction.text,
            "route_updated"
        ),
        NavigationEvent::Status(s) => info!(
            from = %s.from.as_str(),
            to = %s.to.as_str(),
            reason = ?s.reason,
            "status_changed"
        ),
        NavigationEvent::Positioning(p) => match serde_json::to_string(&p.event) {
            Ok(json) => info!(event = %json, "positioning_event"),
            Err(e) => warn!(error = %e, "positioning_event_unserializable"),
        },
        NavigationEvent::Edge(e) => info!(
            edge = %e.edge,
            blocked = %e.blocked,
            reason = ?e.reason,
            "edge_changed"
        ),
    }
}
