//! Entity Store (C5) internals: the authoritative entity map, its
//! secondary indices, and the pure state-transition functions the actor
//! loop (see [`crate::handle`]) drives.

use crate::canonical;
use crate::entity::{Entity, EntitySnapshot, HistoryEntry};
use chrono::{DateTime, Utc};
use rvc_codec::decode::SignalValue;
use rvc_mapping::{DeviceBinding, DeviceType};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A change to one entity, published to the Broadcaster after each
/// applied frame or staleness transition.
#[derive(Clone, Debug)]
pub struct EntityDelta {
    pub id: String,
    pub changed_fields: Vec<String>,
    pub new_state_snapshot: EntitySnapshot,
    pub timestamp: DateTime<Utc>,
}

/// The private, single-writer entity map plus its secondary indices.
pub struct EntityStore {
    entities: HashMap<String, Entity>,
    by_type: HashMap<DeviceType, HashSet<String>>,
    by_area: HashMap<String, HashSet<String>>,
    origin_wall: DateTime<Utc>,
    pub(crate) out_of_order_drops: u64,
}

impl EntityStore {
    pub fn new(origin_wall: DateTime<Utc>) -> Self {
        Self {
            entities: HashMap::new(),
            by_type: HashMap::new(),
            by_area: HashMap::new(),
            origin_wall,
            out_of_order_drops: 0,
        }
    }

    /// Apply a decoded update. Returns the resulting delta, or `None` if
    /// the update was rejected (out-of-order) or produced no change.
    pub fn apply_decoded(
        &mut self,
        binding: &DeviceBinding,
        signals: HashMap<String, SignalValue>,
        timestamp_ns: u64,
    ) -> Option<EntityDelta> {
        if !self.entities.contains_key(&binding.entity_id) {
            self.entities.insert(
                binding.entity_id.clone(),
                Entity::new(
                    binding.entity_id.clone(),
                    binding.device_type,
                    binding.protocol.clone(),
                    binding.area.clone(),
                    binding.capabilities.clone(),
                ),
            );
            self.by_type.entry(binding.device_type).or_default().insert(binding.entity_id.clone());
            self.by_area.entry(binding.area.clone()).or_default().insert(binding.entity_id.clone());
        }

        let entity = self.entities.get_mut(&binding.entity_id).expect("just inserted");

        // (I2) monotonicity: reject updates older than the current watermark.
        if timestamp_ns < entity.last_updated_ns {
            self.out_of_order_drops += 1;
            debug!(entity = %binding.entity_id, "out-of-order frame dropped (out_of_order_drop)");
            return None;
        }

        let before = entity.state.clone();

        // (I1/P2) signal-level merge: only the signals this PGN carries
        // are replaced; everything bound by other PGNs survives.
        for (name, value) in signals {
            entity.state.insert(name, value);
        }
        canonical::apply(entity.device_type, &mut entity.state);

        entity.last_updated_ns = timestamp_ns;
        let was_available = entity.available;
        entity.available = true;
        entity.push_history(timestamp_ns);

        let mut changed_fields: Vec<String> = entity
            .state
            .iter()
            .filter(|(name, value)| before.get(*name) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect();
        if !was_available {
            changed_fields.push("available".to_string());
        }
        changed_fields.sort();

        if changed_fields.is_empty() {
            return None;
        }

        Some(EntityDelta {
            id: entity.id.clone(),
            changed_fields,
            new_state_snapshot: build_snapshot(entity, self.origin_wall),
            timestamp: ns_to_datetime(self.origin_wall, timestamp_ns),
        })
    }

    /// Run one staleness pass; returns deltas for entities that just
    /// transitioned to unavailable.
    pub fn scan_staleness(&mut self, now_ns: u64) -> Vec<EntityDelta> {
        let mut went_stale = Vec::new();
        for entity in self.entities.values_mut() {
            if !entity.available {
                continue;
            }
            let window_ns = entity.device_type.staleness_window().as_nanos() as u64;
            if now_ns.saturating_sub(entity.last_updated_ns) > window_ns {
                entity.available = false;
                went_stale.push(entity.id.clone());
            }
        }

        went_stale
            .into_iter()
            .filter_map(|id| {
                let entity = self.entities.get(&id)?;
                Some(EntityDelta {
                    id: id.clone(),
                    changed_fields: vec!["available".to_string()],
                    new_state_snapshot: build_snapshot(entity, self.origin_wall),
                    timestamp: ns_to_datetime(self.origin_wall, now_ns),
                })
            })
            .collect()
    }

    pub fn snapshot(&self, entity_id: &str) -> Option<EntitySnapshot> {
        self.entities.get(entity_id).map(|e| build_snapshot(e, self.origin_wall))
    }

    pub fn snapshot_all(&self, device_type: Option<DeviceType>, area: Option<&str>) -> Vec<EntitySnapshot> {
        self.entities
            .values()
            .filter(|e| device_type.map(|t| t == e.device_type).unwrap_or(true))
            .filter(|e| area.map(|a| a == e.area).unwrap_or(true))
            .map(|e| build_snapshot(e, self.origin_wall))
            .collect()
    }

    pub fn history(&self, entity_id: &str, limit: Option<usize>, since_ns: Option<u64>) -> Option<Vec<HistoryEntry>> {
        let entity = self.entities.get(entity_id)?;
        let mut points: Vec<_> = entity
            .history
            .iter()
            .filter(|p| since_ns.map(|since| p.timestamp_ns >= since).unwrap_or(true))
            .collect();
        points.sort_by_key(|p| p.timestamp_ns);
        if let Some(limit) = limit {
            let start = points.len().saturating_sub(limit);
            points = points.split_off(start);
        }
        Some(
            points
                .into_iter()
                .map(|p| HistoryEntry {
                    timestamp: ns_to_datetime(self.origin_wall, p.timestamp_ns),
                    state: p.state.clone(),
                    source: entity_id.to_string(),
                })
                .collect(),
        )
    }
}

fn build_snapshot(entity: &Entity, origin_wall: DateTime<Utc>) -> EntitySnapshot {
    EntitySnapshot {
        id: entity.id.clone(),
        device_type: entity.device_type,
        protocol: entity.protocol.clone(),
        area: entity.area.clone(),
        capabilities: entity.capabilities.iter().copied().collect(),
        state: entity.state.clone(),
        last_updated: ns_to_datetime(origin_wall, entity.last_updated_ns),
        available: entity.available,
    }
}

fn ns_to_datetime(origin_wall: DateTime<Utc>, ns: u64) -> DateTime<Utc> {
    origin_wall + chrono::Duration::nanoseconds(ns as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvc_mapping::{Capability, DeviceType};

    fn binding() -> DeviceBinding {
        DeviceBinding {
            pgn: 0x1FEDA,
            instance: 4,
            entity_id: "light.main_galley".into(),
            friendly_name: "Main Galley Light".into(),
            device_type: DeviceType::Light,
            area: "galley".into(),
            capabilities: [Capability::OnOff, Capability::Brightness].into_iter().collect(),
            protocol: "rvc".into(),
            interface: "house".into(),
        }
    }

    fn signals(pct: f64) -> HashMap<String, SignalValue> {
        [("operating_status".to_string(), SignalValue::Number(pct))].into_iter().collect()
    }

    #[test]
    fn first_decode_produces_canonical_state_and_brightness() {
        let mut store = EntityStore::new(Utc::now());
        let delta = store.apply_decoded(&binding(), signals(100.0), 1_000).unwrap();

        assert_eq!(delta.id, "light.main_galley");
        let mut changed = delta.changed_fields.clone();
        changed.sort();
        assert_eq!(changed, vec!["available", "brightness", "operating_status", "state"]);
        assert_eq!(
            delta.new_state_snapshot.state.get("state"),
            Some(&SignalValue::Label("on".to_string()))
        );
        assert_eq!(delta.new_state_snapshot.state.get("brightness"), Some(&SignalValue::Number(100.0)));
    }

    #[test]
    fn repeat_identical_update_emits_no_delta() {
        let mut store = EntityStore::new(Utc::now());
        store.apply_decoded(&binding(), signals(100.0), 1_000).unwrap();
        let second = store.apply_decoded(&binding(), signals(100.0), 2_000);
        assert!(second.is_none());
    }

    #[test]
    fn out_of_order_update_is_dropped() {
        let mut store = EntityStore::new(Utc::now());
        store.apply_decoded(&binding(), signals(100.0), 2_000).unwrap();
        let dropped = store.apply_decoded(&binding(), signals(50.0), 1_000);
        assert!(dropped.is_none());
        assert_eq!(store.out_of_order_drops, 1);
        // state untouched by the rejected update
        assert_eq!(store.snapshot("light.main_galley").unwrap().state.get("brightness"), Some(&SignalValue::Number(100.0)));
    }

    #[test]
    fn staleness_scan_marks_entity_unavailable_after_window() {
        let mut store = EntityStore::new(Utc::now());
        store.apply_decoded(&binding(), signals(100.0), 0).unwrap();

        let window_ns = DeviceType::Light.staleness_window().as_nanos() as u64;
        let deltas = store.scan_staleness(window_ns + 1);

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].changed_fields, vec!["available".to_string()]);
        assert!(!store.snapshot("light.main_galley").unwrap().available);
    }

    #[test]
    fn other_pgns_signals_survive_a_merge_from_this_pgn() {
        let mut store = EntityStore::new(Utc::now());
        // Simulate a prior signal from a different PGN bound to the same entity.
        store.apply_decoded(&binding(), signals(100.0), 1_000).unwrap();
        store
            .entities
            .get_mut("light.main_galley")
            .unwrap()
            .state
            .insert("other_pgn_signal".to_string(), SignalValue::Number(7.0));

        store.apply_decoded(&binding(), signals(50.0), 2_000);

        let snap = store.snapshot("light.main_galley").unwrap();
        assert_eq!(snap.state.get("other_pgn_signal"), Some(&SignalValue::Number(7.0)));
    }
}
