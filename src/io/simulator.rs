//! Simulated walker for demos and soak runs
//!
//! Walks a node sequence at a fixed cadence and pushes the resulting step
//! counts and compass readings into a [`SensorFeed`], the same way a phone's
//! sensor layer would. The compass can carry a constant bias to exercise
//! heading correction. Floor changes are instantaneous; the caller is told
//! so it can send a position fix.

use crate::domain::geometry::{bearing, normalize_heading, Point};
use crate::domain::route::Path;
use crate::domain::types::{FloorId, Node, SensorConfidence, WalkingState};
use crate::io::sensor_feed::SensorFeed;
use tracing::debug;

/// Walker cadence and sensor error
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Meters per step
    pub step_length: f64,
    /// Steps reported per call to [`SimulatedWalker::step`]
    pub steps_per_tick: u32,
    /// Added to every compass reading, degrees
    pub compass_bias_deg: f64,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self { step_length: 0.7, steps_per_tick: 2, compass_bias_deg: 0.0 }
    }
}

/// Where the walker really is
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    pub point: Point,
    pub floor: FloorId,
    /// True heading, degrees
    pub heading: f64,
    /// A stairs or elevator hop happened during this step
    pub changed_floor: bool,
}

pub struct SimulatedWalker {
    config: WalkerConfig,
    route: Vec<Node>,
    /// Index of the node being walked towards
    next: usize,
    position: Point,
    floor: FloorId,
    heading: f64,
    feed: SensorFeed,
}

impl SimulatedWalker {
    /// Start at the first node of `route`
    pub fn new(route: Vec<Node>, feed: SensorFeed, config: WalkerConfig) -> Self {
        let (position, floor) = match route.first() {
            Some(n) => (n.position(), n.floor.clone()),
            None => (Point::new(0.0, 0.0), FloorId::from("")),
        };
        let heading = match route.get(1) {
            Some(n) => bearing(&position, &n.position()),
            None => 0.0,
        };
        Self { config, route, next: 1, position, floor, heading, feed }
    }

    pub fn from_path(path: &Path, feed: SensorFeed, config: WalkerConfig) -> Self {
        Self::new(path.nodes.clone(), feed, config)
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.route.len()
    }

    pub fn truth(&self) -> GroundTruth {
        GroundTruth {
            point: self.position,
            floor: self.floor.clone(),
            heading: self.heading,
            changed_floor: false,
        }
    }

    /// Walk one tick worth of steps
    ///
    /// Returns `None` and reports standing still once the route is done.
    pub fn step(&mut self) -> Option<GroundTruth> {
        if self.is_finished() {
            self.feed.set_walking(WalkingState::Still);
            return None;
        }

        let steps = self.config.steps_per_tick;
        let mut budget = steps as f64 * self.config.step_length;
        let mut changed_floor = false;

        while budget > 0.0 && !self.is_finished() {
            let target = &self.route[self.next];
            if target.floor != self.floor {
                // Hop to the linked connector on the next floor
                debug!(from = %self.floor, to = %target.floor, "walker_changed_floor");
                self.floor = target.floor.clone();
                self.position = target.position();
                self.next += 1;
                changed_floor = true;
                continue;
            }

            let goal = target.position();
            let remaining = self.position.distance(&goal);
            if remaining <= budget {
                if remaining > f64::EPSILON {
                    self.heading = bearing(&self.position, &goal);
                }
                self.position = goal;
                budget -= remaining;
                self.next += 1;
            } else {
                self.heading = bearing(&self.position, &goal);
                self.position = self.position.advance(self.heading, budget);
                budget = 0.0;
            }
        }

        self.feed.set_walking(WalkingState::Walking);
        self.feed.push_steps(steps);
        self.feed.set_heading(
            normalize_heading(self.heading + self.config.compass_bias_deg),
            SensorConfidence::High,
        );

        Some(GroundTruth { changed_floor, ..self.truth() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::sensor_feed::SensorSource;

    fn corridor() -> Vec<Node> {
        vec![Node::new("a", 0.0, 0.0, "g"), Node::new("b", 10.0, 0.0, "g")]
    }

    #[test]
    fn test_step_pushes_steps_and_heading() {
        let feed = SensorFeed::new();
        let mut walker = SimulatedWalker::new(corridor(), feed.clone(), WalkerConfig::default());

        let truth = walker.step().unwrap();

        assert!((truth.point.x - 1.4).abs() < 1e-9);
        assert!(truth.point.y.abs() < 1e-9);
        assert!((truth.heading - 90.0).abs() < 1e-9);
        assert_eq!(feed.pending_steps(), 2);
        assert_eq!(feed.walking_state(), WalkingState::Walking);
        assert!((feed.heading().unwrap().degrees - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_compass_bias_applies_to_readings_only() {
        let feed = SensorFeed::new();
        let config = WalkerConfig { compass_bias_deg: 25.0, ..WalkerConfig::default() };
        let mut walker = SimulatedWalker::new(corridor(), feed.clone(), config);

        let truth = walker.step().unwrap();

        assert!((truth.heading - 90.0).abs() < 1e-9);
        assert!((feed.heading().unwrap().degrees - 115.0).abs() < 1e-9);
    }

    #[test]
    fn test_finishes_at_last_node_then_stands_still() {
        let feed = SensorFeed::new();
        let mut walker = SimulatedWalker::new(corridor(), feed.clone(), WalkerConfig::default());

        let mut last = None;
        while let Some(truth) = walker.step() {
            last = Some(truth);
        }

        // 10 m at 1.4 m per tick
        assert_eq!(feed.pending_steps(), 16);
        assert_eq!(last.unwrap().point, Point::new(10.0, 0.0));
        assert_eq!(feed.walking_state(), WalkingState::Still);
        assert!(walker.is_finished());
    }

    #[test]
    fn test_floor_hop_is_reported() {
        let route = vec![
            Node::new("a", 0.0, 0.0, "g"),
            Node::new("s0", 1.0, 0.0, "g").stairs("core"),
            Node::new("s1", 1.0, 0.0, "1").stairs("core"),
            Node::new("b", 1.0, 10.0, "1"),
        ];
        let mut walker =
            SimulatedWalker::new(route, SensorFeed::new(), WalkerConfig::default());

        let truth = walker.step().unwrap();

        assert!(truth.changed_floor);
        assert_eq!(truth.floor, FloorId::from("1"));
        assert!((truth.point.y - 0.4).abs() < 1e-9);
        assert!(truth.heading.abs() < 1e-9);
    }
}
