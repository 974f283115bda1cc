//! Device-type canonicalization.
//!
//! The spec catalog's raw per-PGN signal names (`operating_status`,
//! `lock_status`, ...) vary by protocol and PGN. Above the raw signal
//! map, the store layers a small, stable set of REST-facing field names
//! so `GET /entities/{id}` reads the same shape regardless of which PGN
//! produced the update: `state` (`"on"`/`"off"`/a lock label) and
//! `brightness` (0..100) for dimmable/switchable devices.

use rvc_codec::decode::SignalValue;
use rvc_mapping::DeviceType;
use std::collections::HashMap;

pub fn apply(device_type: DeviceType, state: &mut HashMap<String, SignalValue>) {
    match device_type {
        DeviceType::Light | DeviceType::Switch => {
            if let Some(SignalValue::Number(pct)) = state.get("operating_status").cloned() {
                state.insert("brightness".to_string(), SignalValue::Number(pct));
                let label = if pct > 0.0 { "on" } else { "off" };
                state.insert("state".to_string(), SignalValue::Label(label.to_string()));
            }
        }
        DeviceType::Lock => {
            if let Some(label) = state.get("lock_status").cloned() {
                state.insert("state".to_string(), label);
            }
        }
        DeviceType::Tank | DeviceType::Temperature | DeviceType::Other => {}
    }
}
