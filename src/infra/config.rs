//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. WAYFINDER_CONFIG environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Extra cost added to every edge that changes floor
    #[serde(default = "default_floor_change_penalty")]
    pub floor_change_penalty: f64,
    /// Upper bound on A* node expansions per search
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
    /// Walking speed used for time estimates (m/s)
    #[serde(default = "default_walking_speed")]
    pub walking_speed_mps: f64,
}

fn default_floor_change_penalty() -> f64 {
    50.0
}

fn default_max_expansions() -> usize {
    100_000
}

fn default_walking_speed() -> f64 {
    1.4
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            floor_change_penalty: default_floor_change_penalty(),
            max_expansions: default_max_expansions(),
            walking_speed_mps: default_walking_speed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RailSnapConfig {
    /// Heading deviation (degrees) above which the heading snaps to the edge
    #[serde(default = "default_heading_snap_threshold")]
    pub heading_snap_threshold_deg: f64,
    /// Distance (m) beyond which a position counts as off-path
    #[serde(default = "default_max_off_path")]
    pub max_off_path_distance: f64,
}

fn default_heading_snap_threshold() -> f64 {
    20.0
}

fn default_max_off_path() -> f64 {
    3.0
}

impl Default for RailSnapConfig {
    fn default() -> Self {
        Self {
            heading_snap_threshold_deg: default_heading_snap_threshold(),
            max_off_path_distance: default_max_off_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositioningConfig {
    #[serde(default = "default_step_length")]
    pub step_length: f64,
    /// Number of compass readings in the smoothing window
    #[serde(default = "default_heading_window")]
    pub heading_window: usize,
    /// Drift factor multiplier per dead-reckoning update
    #[serde(default = "default_drift_decay")]
    pub drift_decay: f64,
    /// Drift factor multiplier after a successful rail snap
    #[serde(default = "default_snap_trust_gain")]
    pub snap_trust_gain: f64,
    /// Minimum match score for a visual landmark reset
    #[serde(default = "default_landmark_min_score")]
    pub landmark_min_score: f64,
    /// Device tilt (degrees) above which the compass is ignored
    #[serde(default = "default_tilt_limit")]
    pub tilt_limit_deg: f64,
    /// Heading corrections tolerated inside the window before advising manual mode
    #[serde(default = "default_correction_limit")]
    pub correction_limit: usize,
    #[serde(default = "default_correction_window")]
    pub correction_window_secs: u64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_step_length() -> f64 {
    0.7
}

fn default_heading_window() -> usize {
    5
}

fn default_drift_decay() -> f64 {
    0.98
}

fn default_snap_trust_gain() -> f64 {
    1.05
}

fn default_landmark_min_score() -> f64 {
    0.8
}

fn default_tilt_limit() -> f64 {
    45.0
}

fn default_correction_limit() -> usize {
    5
}

fn default_correction_window() -> u64 {
    120
}

fn default_tick_interval() -> u64 {
    100
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            step_length: default_step_length(),
            heading_window: default_heading_window(),
            drift_decay: default_drift_decay(),
            snap_trust_gain: default_snap_trust_gain(),
            landmark_min_score: default_landmark_min_score(),
            tilt_limit_deg: default_tilt_limit(),
            correction_limit: default_correction_limit(),
            correction_window_secs: default_correction_window(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavigationConfig {
    /// Distance (m) to the destination that counts as arrived
    #[serde(default = "default_arrival_radius")]
    pub arrival_radius: f64,
    /// Distance (m) to a path node that advances the step index
    #[serde(default = "default_waypoint_radius")]
    pub waypoint_radius: f64,
    #[serde(default = "default_true")]
    pub dynamic_rerouting: bool,
    #[serde(default = "default_true")]
    pub reroute_when_off_route: bool,
}

fn default_arrival_radius() -> f64 {
    5.0
}

fn default_waypoint_radius() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            arrival_radius: default_arrival_radius(),
            waypoint_radius: default_waypoint_radius(),
            dynamic_rerouting: true,
            reroute_when_off_route: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    10
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Capacity of each broadcast stream
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { channel_capacity: default_channel_capacity() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Building identifier used in logs
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "building".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub rail_snap: RailSnapConfig,
    #[serde(default)]
    pub positioning: PositioningConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    floor_change_penalty: f64,
    max_expansions: usize,
    walking_speed_mps: f64,
    heading_snap_threshold_deg: f64,
    max_off_path_distance: f64,
    step_length: f64,
    heading_window: usize,
    drift_decay: f64,
    snap_trust_gain: f64,
    landmark_min_score: f64,
    tilt_limit_deg: f64,
    correction_limit: usize,
    correction_window_secs: u64,
    tick_interval_ms: u64,
    arrival_radius: f64,
    waypoint_radius: f64,
    dynamic_rerouting: bool,
    reroute_when_off_route: bool,
    metrics_interval_secs: u64,
    channel_capacity: usize,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            site_id: if toml_config.site.id.is_empty() {
                default_site_id()
            } else {
                toml_config.site.id
            },
            floor_change_penalty: toml_config.routing.floor_change_penalty,
            max_expansions: toml_config.routing.max_expansions,
            walking_speed_mps: toml_config.routing.walking_speed_mps,
            heading_snap_threshold_deg: toml_config.rail_snap.heading_snap_threshold_deg,
            max_off_path_distance: toml_config.rail_snap.max_off_path_distance,
            step_length: toml_config.positioning.step_length,
            heading_window: toml_config.positioning.heading_window.max(1),
            drift_decay: toml_config.positioning.drift_decay,
            snap_trust_gain: toml_config.positioning.snap_trust_gain,
            landmark_min_score: toml_config.positioning.landmark_min_score,
            tilt_limit_deg: toml_config.positioning.tilt_limit_deg,
            correction_limit: toml_config.positioning.correction_limit,
            correction_window_secs: toml_config.positioning.correction_window_secs,
            tick_interval_ms: toml_config.positioning.tick_interval_ms.max(1),
            arrival_radius: toml_config.navigation.arrival_radius,
            waypoint_radius: toml_config.navigation.waypoint_radius,
            dynamic_rerouting: toml_config.navigation.dynamic_rerouting,
            reroute_when_off_route: toml_config.navigation.reroute_when_off_route,
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            channel_capacity: toml_config.events.channel_capacity.max(1),
            config_file,
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("WAYFINDER_CONFIG") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        let config_path = Self::resolve_config_path(args);
        Self::load_from_path(&config_path)
    }

    /// Load from an explicit path, falling back to defaults on any error
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn floor_change_penalty(&self) -> f64 {
        self.floor_change_penalty
    }

    pub fn max_expansions(&self) -> usize {
        self.max_expansions
    }

    pub fn walking_speed_mps(&self) -> f64 {
        self.walking_speed_mps
    }

    pub fn heading_snap_threshold_deg(&self) -> f64 {
        self.heading_snap_threshold_deg
    }

    pub fn max_off_path_distance(&self) -> f64 {
        self.max_off_path_distance
    }

    pub fn step_length(&self) -> f64 {
        self.step_length
    }

    pub fn heading_window(&self) -> usize {
        self.heading_window
    }

    pub fn drift_decay(&self) -> f64 {
        self.drift_decay
    }

    pub fn snap_trust_gain(&self) -> f64 {
        self.snap_trust_gain
    }

    pub fn landmark_min_score(&self) -> f64 {
        self.landmark_min_score
    }

    pub fn tilt_limit_deg(&self) -> f64 {
        self.tilt_limit_deg
    }

    pub fn correction_limit(&self) -> usize {
        self.correction_limit
    }

    pub fn correction_window(&self) -> Duration {
        Duration::from_secs(self.correction_window_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn arrival_radius(&self) -> f64 {
        self.arrival_radius
    }

    pub fn waypoint_radius(&self) -> f64 {
        self.waypoint_radius
    }

    pub fn dynamic_rerouting(&self) -> bool {
        self.dynamic_rerouting
    }

    pub fn reroute_when_off_route(&self) -> bool {
        self.reroute_when_off_route
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to toggle rerouting after a block
    pub fn with_dynamic_rerouting(mut self, enabled: bool) -> Self {
        self.dynamic_rerouting = enabled;
        self
    }

    /// Builder method for tests to toggle off-route rerouting
    pub fn with_reroute_when_off_route(mut self, enabled: bool) -> Self {
        self.reroute_when_off_route = enabled;
        self
    }

    /// Builder method for tests to shrink the correction window
    pub fn with_correction_limit(mut self, limit: usize, window_secs: u64) -> Self {
        self.correction_limit = limit;
        self.correction_window_secs = window_secs;
        self
    }
}
