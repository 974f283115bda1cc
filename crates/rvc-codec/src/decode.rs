//! Frame Decoder (C3): PGN lookup, bit-level signal extraction, and
//! binding resolution. Pure function of (frame, catalog, mapping).

use crate::frame::Frame;
use crate::pgn_id::{parse_can_id, NETWORK_MANAGEMENT_PGNS};
use rvc_mapping::{DeviceBinding, Mapping};
use rvc_spec::pgn::{ByteOrder, SignalDef};
use rvc_spec::Catalog;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A decoded signal value: a scaled number, a resolved enum label, or the
/// RV-C "not available" sentinel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Number(f64),
    Label(String),
    NotAvailable,
}

/// Reason a frame produced no entity-relevant output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// PGN is a network-management/transport message, never entity state.
    NotOfInterest,
    /// Payload too short for the PGN's widest signal (`FRAME_MALFORMED`).
    LengthUnderrun,
}

/// Result of decoding one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodeOutcome {
    /// PGN known, instance bound to an entity.
    Decoded {
        binding: DeviceBinding,
        signals: HashMap<String, SignalValue>,
    },
    /// PGN known, but no binding exists for this instance.
    Unmapped {
        pgn: u32,
        instance: u8,
        signals: HashMap<String, SignalValue>,
    },
    /// PGN not present in the spec catalog.
    Unknown { pgn: u32, raw: Vec<u8> },
    /// Frame carries no entity-relevant information.
    Ignore { reason: IgnoreReason },
}

/// Decode one CAN frame against the loaded spec catalog and device mapping.
pub fn decode(frame: &Frame, catalog: &Catalog, mapping: &Mapping) -> DecodeOutcome {
    let parts = parse_can_id(frame.arbitration_id);

    if NETWORK_MANAGEMENT_PGNS.contains(&parts.pgn) {
        return DecodeOutcome::Ignore { reason: IgnoreReason::NotOfInterest };
    }

    let Some(descriptor) = catalog.lookup(parts.pgn) else {
        return DecodeOutcome::Unknown { pgn: parts.pgn, raw: frame.data.clone() };
    };

    let available_bits = (frame.data.len() as u32) * 8;
    if descriptor.max_end_bit() > available_bits {
        return DecodeOutcome::Ignore { reason: IgnoreReason::LengthUnderrun };
    }

    let mut signals = HashMap::with_capacity(descriptor.signals.len());
    for signal in &descriptor.signals {
        signals.insert(signal.name.clone(), decode_signal(&frame.data, signal, catalog));
    }

    let instance = match signals.get("instance") {
        Some(SignalValue::Number(n)) => *n as u8,
        _ => 0,
    };

    match mapping.resolve(parts.pgn, instance) {
        Some(binding) => DecodeOutcome::Decoded { binding: binding.clone(), signals },
        None => DecodeOutcome::Unmapped { pgn: parts.pgn, instance, signals },
    }
}

fn decode_signal(data: &[u8], signal: &SignalDef, catalog: &Catalog) -> SignalValue {
    let mut raw = extract_bits(data, signal.start_bit, signal.length_bits, signal.byte_order);
    if let Some(mask) = signal.value_mask {
        raw &= mask;
    }

    if raw == signal.not_available_sentinel() {
        return SignalValue::NotAvailable;
    }

    if let Some(enum_ref) = &signal.enum_ref {
        if let Some(label) = catalog.enum_label(enum_ref, raw) {
            return SignalValue::Label(label.to_string());
        }
    }

    SignalValue::Number(raw as f64 * signal.scale + signal.offset)
}

/// Extract `length_bits` starting at `start_bit` from up to 8 payload
/// bytes. For little-endian fields, bit 0 is the least-significant bit
/// of byte 0. For big-endian fields, bit 0 is the most-significant bit
/// of the composed 64-bit buffer.
fn extract_bits(data: &[u8], start_bit: u16, length_bits: u16, byte_order: ByteOrder) -> u64 {
    let mut buf = [0u8; 8];
    let n = data.len().min(8);
    buf[..n].copy_from_slice(&data[..n]);

    let mask = if length_bits >= 64 { u64::MAX } else { (1u64 << length_bits) - 1 };

    match byte_order {
        ByteOrder::LittleEndian => {
            let composite = u64::from_le_bytes(buf);
            (composite >> start_bit) & mask
        }
        ByteOrder::BigEndian => {
            let composite = u64::from_be_bytes(buf);
            let shift = 64 - start_bit as u32 - length_bits as u32;
            (composite >> shift) & mask
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgn_id::build_can_id;
    use rvc_mapping::{Capability, DeviceType, Mapping, MappingDocument};
    use rvc_spec::pgn::{CatalogDocument, PgnDescriptor};
    use std::collections::HashMap as StdHashMap;

    fn dimmer_catalog() -> Catalog {
        Catalog::from_document(CatalogDocument {
            pgns: vec![PgnDescriptor {
                pgn: 0x1FEDA,
                name: "DC_DIMMER_STATUS_3".into(),
                signals: vec![
                    SignalDef {
                        name: "instance".into(),
                        start_bit: 0,
                        length_bits: 8,
                        byte_order: ByteOrder::LittleEndian,
                        scale: 1.0,
                        offset: 0.0,
                        unit: None,
                        enum_ref: None,
                        value_mask: None,
                    },
                    SignalDef {
                        name: "operating_status".into(),
                        start_bit: 16,
                        length_bits: 8,
                        byte_order: ByteOrder::LittleEndian,
                        scale: 0.5,
                        offset: 0.0,
                        unit: Some("%".into()),
                        enum_ref: None,
                        value_mask: None,
                    },
                ],
            }],
            enums: StdHashMap::new(),
        })
        .unwrap()
    }

    fn dimmer_mapping(catalog: &Catalog) -> Mapping {
        Mapping::from_document(
            MappingDocument {
                bindings: vec![rvc_mapping::DeviceBinding {
                    pgn: 0x1FEDA,
                    instance: 4,
                    entity_id: "light.main_galley".into(),
                    friendly_name: "Main Galley Light".into(),
                    device_type: DeviceType::Light,
                    area: "galley".into(),
                    capabilities: [Capability::OnOff, Capability::Brightness].into_iter().collect(),
                    protocol: "rvc".into(),
                    interface: "house".into(),
                }],
            },
            catalog,
        )
        .unwrap()
    }

    #[test]
    fn decodes_bound_instance_to_entity() {
        let catalog = dimmer_catalog();
        let mapping = dimmer_mapping(&catalog);
        let id = build_can_id(6, 0x1FEDA, 0x80);
        // instance=4, reserved byte, operating_status raw=200 (=100.0%)
        let frame = Frame::new(id, vec![4, 0xFF, 200, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], "house", 0);

        match decode(&frame, &catalog, &mapping) {
            DecodeOutcome::Decoded { binding, signals } => {
                assert_eq!(binding.entity_id, "light.main_galley");
                assert_eq!(signals.get("operating_status"), Some(&SignalValue::Number(100.0)));
            }
            other => panic!("expected Decoded, got {other:?}"),
        }
    }

    #[test]
    fn unbound_instance_is_unmapped() {
        let catalog = dimmer_catalog();
        let mapping = dimmer_mapping(&catalog);
        let id = build_can_id(6, 0x1FEDA, 0x80);
        let frame = Frame::new(id, vec![9, 0xFF, 200, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], "house", 0);

        match decode(&frame, &catalog, &mapping) {
            DecodeOutcome::Unmapped { instance, .. } => assert_eq!(instance, 9),
            other => panic!("expected Unmapped, got {other:?}"),
        }
    }

    #[test]
    fn unknown_pgn_is_reported_with_raw_payload() {
        let catalog = dimmer_catalog();
        let mapping = dimmer_mapping(&catalog);
        let id = build_can_id(6, 0x1AAAA, 0x80);
        let frame = Frame::new(id, vec![1, 2, 3], "house", 0);

        match decode(&frame, &catalog, &mapping) {
            DecodeOutcome::Unknown { pgn, raw } => {
                assert_eq!(pgn, 0x1AAAA);
                assert_eq!(raw, vec![1, 2, 3]);
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn length_underrun_is_ignored_not_crashed() {
        let catalog = dimmer_catalog();
        let mapping = dimmer_mapping(&catalog);
        let id = build_can_id(6, 0x1FEDA, 0x80);
        // operating_status needs bytes through index 2; only 2 bytes supplied
        let frame = Frame::new(id, vec![4, 0xFF], "house", 0);

        assert_eq!(
            decode(&frame, &catalog, &mapping),
            DecodeOutcome::Ignore { reason: IgnoreReason::LengthUnderrun }
        );
    }

    #[test]
    fn not_available_sentinel_decodes_to_not_available() {
        let catalog = dimmer_catalog();
        let mapping = dimmer_mapping(&catalog);
        let id = build_can_id(6, 0x1FEDA, 0x80);
        let frame = Frame::new(id, vec![4, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], "house", 0);

        match decode(&frame, &catalog, &mapping) {
            DecodeOutcome::Decoded { signals, .. } => {
                assert_eq!(signals.get("operating_status"), Some(&SignalValue::NotAvailable));
            }
            other => panic!("expected Decoded, got {other:?}"),
        }
    }

    #[test]
    fn network_management_pgn_is_ignored() {
        let catalog = dimmer_catalog();
        let mapping = dimmer_mapping(&catalog);
        let id = build_can_id(6, 0x00EA00, 0x80);
        let frame = Frame::new(id, vec![0xFF; 3], "house", 0);

        assert_eq!(
            decode(&frame, &catalog, &mapping),
            DecodeOutcome::Ignore { reason: IgnoreReason::NotOfInterest }
        );
    }
}
