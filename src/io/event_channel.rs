//! Broadcast streams for positions and navigation events
//!
//! Each subscriber receives messages in emission order. Sending with no
//! subscribers is not an error; lagging subscribers lose the oldest messages.

use crate::domain::route::Instruction;
use crate::domain::types::{epoch_ms, EdgeKey, FusedPosition, NavigationStatus, NodeId};
use crate::services::fusion::PositioningEvent;
use serde::Serialize;
use tokio::sync::broadcast;

/// Messages on the navigation stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationEvent {
    /// Active route, current step and next instruction
    Route(RoutePayload),
    /// State machine transition
    Status(StatusPayload),
    /// Advisory or mode change from the positioning layer
    Positioning(PositioningPayload),
    /// An edge was blocked or unblocked
    Edge(EdgePayload),
}

/// Payload for route updates (start, reroute, step advance)
#[derive(Debug, Clone, Serialize)]
pub struct RoutePayload {
    /// Site identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Timestamp (epoch ms)
    pub ts: u64,
    /// Navigation session id
    pub session: String,
    pub path: Vec<NodeId>,
    pub step_index: usize,
    pub instruction: Instruction,
    /// Meters left from the current step
    pub remaining_m: f64,
    /// Seconds left at walking speed
    pub eta_secs: f64,
    pub crosses_floors: bool,
}

/// Payload for state transitions
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    /// Site identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Timestamp (epoch ms)
    pub ts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub from: NavigationStatus,
    pub to: NavigationStatus,
    /// Failure reason when entering Error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload wrapping a positioning event
#[derive(Debug, Clone, Serialize)]
pub struct PositioningPayload {
    /// Site identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Timestamp (epoch ms)
    pub ts: u64,
    pub event: PositioningEvent,
}

/// Payload for blocked-edge changes
#[derive(Debug, Clone, Serialize)]
pub struct EdgePayload {
    /// Site identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Timestamp (epoch ms)
    pub ts: u64,
    pub edge: EdgeKey,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Sender handle for both streams
///
/// Clone this to share across producers. Never blocks.
#[derive(Clone)]
pub struct EventSender {
    positions: broadcast::Sender<FusedPosition>,
    events: broadcast::Sender<NavigationEvent>,
    site_id: String,
}

impl EventSender {
    /// Publish a fused position
    pub fn send_position(&self, position: &FusedPosition) {
        // No subscribers is fine
        let _ = self.positions.send(position.clone());
    }

    /// Publish a route update
    /// Injects site_id into the payload
    pub fn send_route(&self, mut payload: RoutePayload) {
        payload.site = Some(self.site_id.clone());
        let _ = self.events.send(NavigationEvent::Route(payload));
    }

    /// Publish a status transition
    /// Injects site_id into the payload
    pub fn send_status(&self, mut payload: StatusPayload) {
        payload.site = Some(self.site_id.clone());
        let _ = self.events.send(NavigationEvent::Status(payload));
    }

    /// Publish a positioning advisory or mode change
    pub fn send_positioning(&self, event: PositioningEvent) {
        let payload =
            PositioningPayload { site: Some(self.site_id.clone()), ts: epoch_ms(), event };
        let _ = self.events.send(NavigationEvent::Positioning(payload));
    }

    /// Publish a blocked-edge change
    /// Injects site_id into the payload
    pub fn send_edge(&self, mut payload: EdgePayload) {
        payload.site = Some(self.site_id.clone());
        let _ = self.events.send(NavigationEvent::Edge(payload));
    }

    pub fn subscribe_positions(&self) -> broadcast::Receiver<FusedPosition> {
        self.positions.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<NavigationEvent> {
        self.events.subscribe()
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }
}

/// Create the position and navigation streams
///
/// `capacity` bounds how far a subscriber may lag before losing messages.
pub fn create_event_channel(capacity: usize, site_id: String) -> EventSender {
    let (positions, _) = broadcast::channel(capacity.max(1));
    let (events, _) = broadcast::channel(capacity.max(1));
    EventSender { positions, events, site_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Confidence, FloorId, PositionSource};

    fn position(x: f64) -> FusedPosition {
        FusedPosition {
            x,
            y: 0.0,
            floor: FloorId::from("g"),
            heading: 0.0,
            confidence: Confidence::High,
            source: PositionSource::Qr,
            timestamp: epoch_ms(),
        }
    }

    #[test]
    fn test_send_without_subscribers() {
        let sender = create_event_channel(4, "site".to_string());
        sender.send_position(&position(1.0));
        sender.send_positioning(PositioningEvent::OffPath { distance: None });
    }

    #[test]
    fn test_each_subscriber_sees_emission_order() {
        let sender = create_event_channel(8, "site".to_string());
        let mut a = sender.subscribe_positions();
        let mut b = sender.subscribe_positions();
        for x in 0..3 {
            sender.send_position(&position(x as f64));
        }
        for rx in [&mut a, &mut b] {
            let xs: Vec<f64> = (0..3).map(|_| rx.try_recv().unwrap().x).collect();
            assert_eq!(xs, vec![0.0, 1.0, 2.0]);
        }
    }

    #[test]
    fn test_site_is_injected() {
        let sender = create_event_channel(4, "hq".to_string());
        let mut rx = sender.subscribe_events();
        sender.send_edge(EdgePayload {
            site: None,
            ts: 0,
            edge: EdgeKey::new(&NodeId::from("a"), &NodeId::from("b")),
            blocked: true,
            reason: Some("spill".to_string()),
        });
        match rx.try_recv().unwrap() {
            NavigationEvent::Edge(p) => assert_eq!(p.site.as_deref(), Some("hq")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let payload = StatusPayload {
            site: Some("hq".to_string()),
            ts: 1,
            session: None,
            from: NavigationStatus::Calculating,
            to: NavigationStatus::Error,
            reason: Some("no route".to_string()),
        };
        let json = serde_json::to_string(&NavigationEvent::Status(payload)).unwrap();
        assert!(json.contains(r#""kind":"status""#));
        assert!(json.contains(r#""to":"Error""#));
        assert!(!json.contains("session"));
    }
}
