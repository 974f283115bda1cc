//! The `Entity` record and its REST-facing snapshot (§3).

use chrono::{DateTime, Utc};
use rvc_codec::decode::SignalValue;
use rvc_mapping::{Capability, DeviceType};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

pub const HISTORY_DEPTH: usize = 256;

/// One point in an entity's bounded history ring buffer.
#[derive(Clone, Debug)]
pub struct HistoryPoint {
    pub timestamp_ns: u64,
    pub state: HashMap<String, SignalValue>,
}

/// Serializable rendering of one history point for `GET /entities/{id}/history`.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub state: HashMap<String, SignalValue>,
    pub source: String,
}

/// One logical device's authoritative, in-memory state.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: String,
    pub device_type: DeviceType,
    pub protocol: String,
    pub area: String,
    pub capabilities: std::collections::HashSet<Capability>,
    pub state: HashMap<String, SignalValue>,
    pub last_updated_ns: u64,
    pub available: bool,
    pub history: VecDeque<HistoryPoint>,
}

impl Entity {
    pub fn new(
        id: String,
        device_type: DeviceType,
        protocol: String,
        area: String,
        capabilities: std::collections::HashSet<Capability>,
    ) -> Self {
        Self {
            id,
            device_type,
            protocol,
            area,
            capabilities,
            state: HashMap::new(),
            last_updated_ns: 0,
            available: false,
            history: VecDeque::with_capacity(HISTORY_DEPTH),
        }
    }

    pub fn push_history(&mut self, timestamp_ns: u64) {
        if self.history.len() >= HISTORY_DEPTH {
            self.history.pop_front();
        }
        self.history.push_back(HistoryPoint { timestamp_ns, state: self.state.clone() });
    }
}

/// Read-only rendering of an [`Entity`] for the REST/WS boundary.
#[derive(Clone, Debug, Serialize)]
pub struct EntitySnapshot {
    pub id: String,
    pub device_type: DeviceType,
    pub protocol: String,
    pub area: String,
    pub capabilities: Vec<Capability>,
    pub state: HashMap<String, SignalValue>,
    pub last_updated: DateTime<Utc>,
    pub available: bool,
}
