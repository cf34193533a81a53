//! Route model: an ordered node sequence plus turn-by-turn instructions

use crate::domain::types::Node;
use serde::Serialize;

/// An ordered sequence of nodes from origin to destination
///
/// An empty path means "no route".
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Path {
    pub nodes: Vec<Node>,
    /// Walking distance of each leg; `legs[i]` joins node `i` and `i + 1`
    #[serde(skip)]
    pub legs: Vec<f64>,
    /// Meters walked, summed leg by leg
    pub total_distance: f64,
    /// Seconds at the configured walking speed
    pub estimated_time_secs: f64,
    pub crosses_floors: bool,
}

impl Path {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a path and its aggregates from a node sequence, planar legs
    pub fn from_nodes(nodes: Vec<Node>, walking_speed_mps: f64) -> Self {
        let legs = nodes.windows(2).map(|w| w[0].position().distance(&w[1].position())).collect();
        Self::with_legs(nodes, legs, walking_speed_mps)
    }

    /// Build a path with known leg lengths
    ///
    /// Missing legs fall back to the planar distance between their nodes.
    pub fn with_legs(nodes: Vec<Node>, mut legs: Vec<f64>, walking_speed_mps: f64) -> Self {
        let leg_count = nodes.len().saturating_sub(1);
        legs.truncate(leg_count);
        for w in nodes[legs.len().min(leg_count)..].windows(2) {
            legs.push(w[0].position().distance(&w[1].position()));
        }

        let total_distance = legs.iter().sum::<f64>();
        let crosses_floors = nodes.windows(2).any(|w| w[0].floor != w[1].floor);
        let estimated_time_secs = if walking_speed_mps > 0.0 {
            total_distance / walking_speed_mps
        } else {
            0.0
        };

        Self { nodes, legs, total_distance, estimated_time_secs, crosses_floors }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn origin(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn destination(&self) -> Option<&Node> {
        self.nodes.last()
    }

    /// Remaining distance from node `step` to the destination
    pub fn remaining_distance(&self, step: usize) -> f64 {
        self.legs.get(step..).map_or(0.0, |rest| rest.iter().sum())
    }

    /// Next-step instruction for a traveller standing at node `step`
    pub fn instruction_at(&self, step: usize) -> Instruction {
        let (Some(current), Some(next)) = (self.nodes.get(step), self.nodes.get(step + 1)) else {
            return Instruction {
                step_index: step.min(self.nodes.len().saturating_sub(1)),
                text: "You have arrived".to_string(),
                distance_m: 0.0,
                kind: InstructionKind::Arrive,
            };
        };

        if current.floor != next.floor {
            let (kind, what) = if current.is_elevator || next.is_elevator {
                (InstructionKind::Elevator, "elevator")
            } else {
                (InstructionKind::Stairs, "stairs")
            };
            return Instruction {
                step_index: step,
                text: format!("Take the {} to floor {}", what, next.floor),
                distance_m: self.legs.get(step).copied().unwrap_or(0.0),
                kind,
            };
        }

        let distance_m = self
            .legs
            .get(step)
            .copied()
            .unwrap_or_else(|| current.position().distance(&next.position()));
        Instruction {
            step_index: step,
            text: format!("Walk {:.0} m to {}", distance_m, next.display_name()),
            distance_m,
            kind: InstructionKind::Walk,
        }
    }
}

/// Kind of manoeuvre an instruction asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstructionKind {
    Walk,
    Stairs,
    Elevator,
    Arrive,
}

/// Human-readable next step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub step_index: usize,
    pub text: String,
    pub distance_m: f64,
    pub kind: InstructionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> Vec<Node> {
        vec![
            Node::new("a", 0.0, 0.0, "g"),
            Node::new("b", 10.0, 0.0, "g").with_label("Lobby"),
            Node::new("s1", 10.0, 5.0, "g").stairs("core"),
            Node::new("s2", 10.0, 5.0, "1").stairs("core"),
            Node::new("c", 20.0, 5.0, "1"),
        ]
    }

    #[test]
    fn test_aggregates() {
        let path = Path::from_nodes(corridor(), 1.0);
        assert!((path.total_distance - 25.0).abs() < 1e-9);
        assert!((path.estimated_time_secs - 25.0).abs() < 1e-9);
        assert!(path.crosses_floors);
        assert_eq!(path.destination().map(|n| n.id.0.as_str()), Some("c"));
    }

    #[test]
    fn test_empty_path() {
        let path = Path::from_nodes(Vec::new(), 1.4);
        assert!(path.is_empty());
        assert_eq!(path.total_distance, 0.0);
        assert!(!path.crosses_floors);
        assert_eq!(path.instruction_at(0).kind, InstructionKind::Arrive);
    }

    #[test]
    fn test_instructions() {
        let path = Path::from_nodes(corridor(), 1.4);

        let walk = path.instruction_at(0);
        assert_eq!(walk.kind, InstructionKind::Walk);
        assert_eq!(walk.text, "Walk 10 m to Lobby");

        let stairs = path.instruction_at(2);
        assert_eq!(stairs.kind, InstructionKind::Stairs);
        assert_eq!(stairs.text, "Take the stairs to floor 1");

        let done = path.instruction_at(4);
        assert_eq!(done.kind, InstructionKind::Arrive);
        assert_eq!(done.step_index, 4);
    }

    #[test]
    fn test_leg_lengths_override_planar() {
        // 12 m of stairs between co-located connectors
        let path = Path::with_legs(corridor(), vec![10.0, 5.0, 12.0, 10.0], 1.0);
        assert!((path.total_distance - 37.0).abs() < 1e-9);
        assert!((path.estimated_time_secs - 37.0).abs() < 1e-9);
        assert!((path.remaining_distance(2) - 22.0).abs() < 1e-9);
        assert_eq!(path.instruction_at(2).distance_m, 12.0);

        // Short leg list is completed from the floor plan
        let path = Path::with_legs(corridor(), vec![10.0], 1.0);
        assert_eq!(path.legs, vec![10.0, 5.0, 0.0, 10.0]);
    }

    #[test]
    fn test_remaining_distance() {
        let path = Path::from_nodes(corridor(), 1.4);
        assert!((path.remaining_distance(1) - 15.0).abs() < 1e-9);
        assert_eq!(path.remaining_distance(4), 0.0);
        assert_eq!(path.remaining_distance(99), 0.0);
    }
}
