//! Device binding, device type, and capability types (§3, §4.2)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Closed set of device types the daemon understands. Staleness
/// windows (§4.5) and the capability closure below are keyed on this.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Light,
    Lock,
    Tank,
    Temperature,
    Switch,
    Other,
}

impl DeviceType {
    /// Default staleness window per §4.5.
    pub fn staleness_window(&self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            DeviceType::Light => Duration::from_secs(60),
            DeviceType::Lock => Duration::from_secs(30),
            DeviceType::Tank => Duration::from_secs(600),
            DeviceType::Temperature => Duration::from_secs(300),
            DeviceType::Switch | DeviceType::Other => Duration::from_secs(300),
        }
    }

    /// Capabilities a device of this type may declare.
    pub fn allowed_capabilities(&self) -> HashSet<Capability> {
        match self {
            DeviceType::Light => [Capability::OnOff, Capability::Brightness].into_iter().collect(),
            DeviceType::Lock => [Capability::LockUnlock].into_iter().collect(),
            DeviceType::Switch => [Capability::OnOff].into_iter().collect(),
            DeviceType::Tank | DeviceType::Temperature | DeviceType::Other => HashSet::new(),
        }
    }
}

/// Closed set of controllable capabilities. `Command Encoder` (C4)
/// requires the matching capability before it will encode a command.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    OnOff,
    Brightness,
    LockUnlock,
}

/// A coach-specific binding of (PGN, instance) to a logical entity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeviceBinding {
    pub pgn: u32,
    pub instance: u8,
    pub entity_id: String,
    pub friendly_name: String,
    pub device_type: DeviceType,
    pub area: String,
    pub capabilities: HashSet<Capability>,
    pub protocol: String,
    /// Logical CAN interface name this entity's traffic/commands are
    /// routed over (e.g. "house", "chassis"); resolved to a physical
    /// interface by CAN Transport (C6) configuration.
    pub interface: String,
}
