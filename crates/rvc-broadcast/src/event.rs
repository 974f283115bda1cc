//! The three event kinds the Broadcaster fans out (§4.8).

use chrono::{DateTime, Utc};
use rvc_store::EntityDelta;
use serde::Serialize;

/// An event handed to the Broadcaster for fan-out to matching subscriptions.
#[derive(Clone, Debug)]
pub enum BroadcastEvent {
    EntityDelta(EntityDelta),
    RawFrame { interface: String, arbitration_id: u32, payload: Vec<u8>, timestamp: DateTime<Utc> },
    SystemEvent { kind: String, detail: String, timestamp: DateTime<Utc> },
}

/// Wire rendering for the WebSocket surface: newline-delimited JSON with
/// a `type` discriminator (§6).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum WireEvent {
    #[serde(rename = "entity_update")]
    EntityUpdate { id: String, changed_fields: Vec<String>, state: rvc_store::EntitySnapshot, timestamp: DateTime<Utc> },
    #[serde(rename = "can_message")]
    CanMessage { interface: String, arbitration_id: u32, payload: Vec<u8>, timestamp: DateTime<Utc> },
    #[serde(rename = "system_event")]
    SystemEventWire { kind: String, detail: String, timestamp: DateTime<Utc> },
}

impl From<BroadcastEvent> for WireEvent {
    fn from(event: BroadcastEvent) -> Self {
        match event {
            BroadcastEvent::EntityDelta(delta) => WireEvent::EntityUpdate {
                id: delta.id,
                changed_fields: delta.changed_fields,
                state: delta.new_state_snapshot,
                timestamp: delta.timestamp,
            },
            BroadcastEvent::RawFrame { interface, arbitration_id, payload, timestamp } => {
                WireEvent::CanMessage { interface, arbitration_id, payload, timestamp }
            }
            BroadcastEvent::SystemEvent { kind, detail, timestamp } => {
                WireEvent::SystemEventWire { kind, detail, timestamp }
            }
        }
    }
}
