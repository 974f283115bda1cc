//! Subscription filters, optionally supplied by a client as its first
//! WebSocket message (§6).

use crate::event::BroadcastEvent;
use rvc_mapping::DeviceType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What a subscription wants to see. Default: all entity updates, no
/// raw CAN traffic, no device-type/area restriction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionFilter {
    pub entity_updates: bool,
    pub raw_can: bool,
    pub system_events: bool,
    pub device_types: Option<HashSet<DeviceType>>,
    pub areas: Option<HashSet<String>>,
}

impl Default for SubscriptionFilter {
    fn default() -> Self {
        Self { entity_updates: true, raw_can: false, system_events: true, device_types: None, areas: None }
    }
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &BroadcastEvent) -> bool {
        match event {
            BroadcastEvent::EntityDelta(delta) => {
                self.entity_updates
                    && self.device_types.as_ref().map(|types| types.contains(&delta.new_state_snapshot.device_type)).unwrap_or(true)
                    && self.areas.as_ref().map(|areas| areas.contains(&delta.new_state_snapshot.area)).unwrap_or(true)
            }
            BroadcastEvent::RawFrame { .. } => self.raw_can,
            BroadcastEvent::SystemEvent { .. } => self.system_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw_frame() -> BroadcastEvent {
        BroadcastEvent::RawFrame { interface: "house".into(), arbitration_id: 0x1FEDA80, payload: vec![], timestamp: Utc::now() }
    }

    #[test]
    fn default_filter_admits_entity_updates_not_raw_can() {
        let filter = SubscriptionFilter::default();
        assert!(!filter.matches(&raw_frame()));
    }

    #[test]
    fn raw_can_opt_in_admits_raw_frames() {
        let filter = SubscriptionFilter { raw_can: true, ..Default::default() };
        assert!(filter.matches(&raw_frame()));
    }
}
