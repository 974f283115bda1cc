//! Command Encoder (C4): turns a [`ControlCommand`] into the CAN frame(s)
//! that carry it, given a device binding, the spec catalog, and — for the
//! commands that need it — a snapshot of current entity state.

use crate::decode::SignalValue;
use crate::error::EncodeError;
use crate::frame::Frame;
use crate::pgn_id::build_can_id;
use rvc_mapping::{Capability, DeviceBinding};
use rvc_spec::pgn::{ByteOrder, PgnDescriptor, SignalDef};
use rvc_spec::Catalog;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Command priority used for all outbound RV-C control frames.
const DEFAULT_COMMAND_PRIORITY: u8 = 6;

/// The set of control commands this bridge can encode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Set,
    Toggle,
    BrightnessUp,
    BrightnessDown,
    Lock,
    Unlock,
}

/// A control command as received over the REST boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlCommand {
    pub command: CommandKind,
    #[serde(default)]
    pub state: Option<bool>,
    #[serde(default)]
    pub brightness: Option<f64>,
}

/// A read-only snapshot of an entity's current decoded state, as held by
/// the Entity Store, passed in so the encoder can resolve toggle and
/// relative-brightness commands without mutating anything itself.
#[derive(Clone, Debug, Default)]
pub struct CurrentState {
    pub available: bool,
    pub state: HashMap<String, SignalValue>,
}

impl CurrentState {
    fn operating_value(&self) -> Option<f64> {
        match self.state.get("operating_status") {
            Some(SignalValue::Number(n)) => Some(*n),
            _ => None,
        }
    }
}

/// Encode `command` for `binding` into the outbound CAN frame(s) needed
/// to carry it. `source_address` is this bridge's own node address.
pub fn encode(
    binding: &DeviceBinding,
    catalog: &Catalog,
    current: Option<&CurrentState>,
    command: &ControlCommand,
    source_address: u8,
) -> Result<Vec<Frame>, EncodeError> {
    let descriptor = catalog.lookup(binding.pgn).ok_or_else(|| {
        EncodeError::InvalidParameter(format!("pgn {:#x} not present in spec catalog", binding.pgn))
    })?;

    let mut buf = [0xFFu8; 8];

    if let Some(instance_signal) = descriptor.signal("instance") {
        write_numeric_signal(&mut buf, instance_signal, binding.instance as f64);
    }

    match command.command {
        CommandKind::Lock | CommandKind::Unlock => {
            require_capability(binding, Capability::LockUnlock)?;
            let label = if matches!(command.command, CommandKind::Lock) { "locked" } else { "unlocked" };
            let signal = descriptor.signal("lock_status").ok_or_else(|| {
                EncodeError::InvalidParameter("device binding has no lock_status signal".into())
            })?;
            write_enum_signal(&mut buf, catalog, signal, label)?;
        }
        CommandKind::Set => {
            if command.state.is_none() && command.brightness.is_none() {
                return Err(EncodeError::InvalidParameter(
                    "set command requires state and/or brightness".into(),
                ));
            }
            if command.brightness.is_some() {
                require_capability(binding, Capability::Brightness)?;
            } else {
                require_any_capability(binding, &[Capability::OnOff, Capability::Brightness])?;
            }

            let target = resolve_set_target(binding, current, command)?;
            write_operating_status(&mut buf, descriptor, target)?;
        }
        CommandKind::Toggle => {
            require_any_capability(binding, &[Capability::OnOff, Capability::Brightness])?;
            let current = current.filter(|c| c.available).ok_or(EncodeError::EntityUnavailable)?;
            let now_on = current.operating_value().unwrap_or(0.0) > 0.0;
            let target = if now_on { 0.0 } else { last_nonzero_or_full(current) };
            write_operating_status(&mut buf, descriptor, target)?;
        }
        CommandKind::BrightnessUp | CommandKind::BrightnessDown => {
            require_capability(binding, Capability::Brightness)?;
            let current = current.filter(|c| c.available).ok_or(EncodeError::EntityUnavailable)?;
            let cur = current.operating_value().unwrap_or(0.0);
            let delta = if matches!(command.command, CommandKind::BrightnessUp) { 10.0 } else { -10.0 };
            let target = (cur + delta).clamp(0.0, 100.0);
            write_operating_status(&mut buf, descriptor, target)?;
        }
    }

    let needed_bytes = ((descriptor.max_end_bit() as usize + 7) / 8).max(1).min(8);
    let id = build_can_id(DEFAULT_COMMAND_PRIORITY, binding.pgn, source_address);
    Ok(vec![Frame::new(id, buf[..needed_bytes].to_vec(), binding.interface.clone(), 0)])
}

fn resolve_set_target(
    binding: &DeviceBinding,
    current: Option<&CurrentState>,
    command: &ControlCommand,
) -> Result<f64, EncodeError> {
    if let Some(brightness) = command.brightness {
        if !brightness.is_finite() {
            return Err(EncodeError::InvalidParameter(format!("brightness {brightness} is not a finite number")));
        }
        return Ok(brightness.clamp(0.0, 100.0));
    }

    match command.state {
        Some(true) => {
            if binding.capabilities.contains(&Capability::Brightness) {
                Ok(current.map(last_nonzero_or_full).unwrap_or(100.0))
            } else {
                Ok(100.0)
            }
        }
        Some(false) => Ok(0.0),
        None => unreachable!("checked by caller"),
    }
}

fn last_nonzero_or_full(current: &CurrentState) -> f64 {
    match current.operating_value() {
        Some(v) if v > 0.0 => v,
        _ => 100.0,
    }
}

fn require_capability(binding: &DeviceBinding, capability: Capability) -> Result<(), EncodeError> {
    if binding.capabilities.contains(&capability) {
        Ok(())
    } else {
        Err(EncodeError::UnsupportedCommand { device_type: format!("{:?}", binding.device_type) })
    }
}

fn require_any_capability(binding: &DeviceBinding, capabilities: &[Capability]) -> Result<(), EncodeError> {
    if capabilities.iter().any(|c| binding.capabilities.contains(c)) {
        Ok(())
    } else {
        Err(EncodeError::UnsupportedCommand { device_type: format!("{:?}", binding.device_type) })
    }
}

/// Write a 0..100 engineering-unit brightness target into the
/// `operating_status` signal, mapping the 0..100 user scale onto the
/// PGN's native 0..200 bus scale via `round(value * 2)`.
fn write_operating_status(buf: &mut [u8; 8], descriptor: &PgnDescriptor, value_0_100: f64) -> Result<(), EncodeError> {
    let signal = descriptor
        .signal("operating_status")
        .ok_or_else(|| EncodeError::InvalidParameter("device binding has no operating_status signal".into()))?;
    write_numeric_signal(buf, signal, value_0_100);
    Ok(())
}

fn write_numeric_signal(buf: &mut [u8; 8], signal: &SignalDef, value: f64) {
    let raw = ((value - signal.offset) / signal.scale).round();
    let sentinel = signal.not_available_sentinel();
    let max = sentinel.saturating_sub(1);
    let raw = raw.clamp(0.0, max as f64) as u64;
    pack_bits(buf, signal.start_bit, signal.length_bits, signal.byte_order, raw);
}

fn write_enum_signal(buf: &mut [u8; 8], catalog: &Catalog, signal: &SignalDef, label: &str) -> Result<(), EncodeError> {
    let enum_ref = signal
        .enum_ref
        .as_deref()
        .ok_or_else(|| EncodeError::InvalidParameter(format!("signal {} has no enum table", signal.name)))?;

    let raw = (0..=signal.not_available_sentinel())
        .find(|&raw| catalog.enum_label(enum_ref, raw) == Some(label))
        .ok_or_else(|| EncodeError::InvalidParameter(format!("no raw value maps to label {label:?}")))?;

    pack_bits(buf, signal.start_bit, signal.length_bits, signal.byte_order, raw);
    Ok(())
}

fn pack_bits(buf: &mut [u8; 8], start_bit: u16, length_bits: u16, byte_order: ByteOrder, value: u64) {
    let mask = if length_bits >= 64 { u64::MAX } else { (1u64 << length_bits) - 1 };
    let value = value & mask;

    match byte_order {
        ByteOrder::LittleEndian => {
            let mut composite = u64::from_le_bytes(*buf);
            composite &= !(mask << start_bit);
            composite |= value << start_bit;
            *buf = composite.to_le_bytes();
        }
        ByteOrder::BigEndian => {
            let shift = 64 - start_bit as u32 - length_bits as u32;
            let mut composite = u64::from_be_bytes(*buf);
            composite &= !(mask << shift);
            composite |= value << shift;
            *buf = composite.to_be_bytes();
        }
    }
}
