//! End-to-end pipeline tests (§8 literal scenarios), assembled the way
//! the composition root assembles the real daemon but against the
//! `test-support` mock CAN interface instead of `socketcan`.

use rvc_bus::{Transport, TransportConfig};
use rvc_codec::decode::{decode, DecodeOutcome, SignalValue};
use rvc_codec::pgn_id::{build_can_id, parse_can_id};
use rvc_codec::{CommandKind, ControlCommand, Frame};
use rvc_mapping::{Capability, DeviceBinding, DeviceType, Mapping, MappingDocument};
use rvc_spec::pgn::{ByteOrder, CatalogDocument, PgnDescriptor, SignalDef};
use rvc_spec::Catalog;
use rvc_store::{BulkOptions, EntityStoreHandle, OperationStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

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
        enums: HashMap::new(),
    })
    .unwrap()
}

fn light_binding(entity_id: &str, instance: u8, interface: &str) -> DeviceBinding {
    DeviceBinding {
        pgn: 0x1FEDA,
        instance,
        entity_id: entity_id.to_string(),
        friendly_name: entity_id.to_string(),
        device_type: DeviceType::Light,
        area: "galley".into(),
        capabilities: [Capability::OnOff, Capability::Brightness].into_iter().collect(),
        protocol: "rvc".into(),
        interface: interface.to_string(),
    }
}

/// Scenario 2 (§8): a control command is encoded, transmitted, and the
/// resulting bus echo is decoded back into an `EntityDelta`.
#[tokio::test]
async fn brightness_up_round_trips_through_the_bus() {
    let catalog = Arc::new(dimmer_catalog());
    let binding = light_binding("light.main_galley", 4, "house");
    let mapping = Arc::new(Mapping::from_document(MappingDocument { bindings: vec![binding] }, &catalog).unwrap());

    let transport_config =
        TransportConfig { interface_mappings: [("house".to_string(), "vcan0".to_string())].into_iter().collect(), ..TransportConfig::default() };
    let (inbound_tx, _inbound_rx) = rvc_bus::channel(64);
    let (transport, mocks) = Transport::spawn_mock(transport_config, inbound_tx);
    let transport = Arc::new(transport);
    let house = mocks.get("house").unwrap().clone();

    let (store, mut delta_rx) = EntityStoreHandle::spawn(catalog.clone(), mapping.clone(), transport.clone(), 0x80, Duration::from_secs(5));

    // Prime the entity at brightness 80 (on-bus 160).
    let seed_id = build_can_id(6, 0x1FEDA, 0x20);
    let seed = Frame::new(seed_id, vec![4, 0xFF, 160, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], "house", 0);
    store
        .apply_decoded(mapping.resolve(0x1FEDA, 4).unwrap().clone(), decode_signals(&seed, &catalog, &mapping), 1)
        .await;
    let _ = delta_rx.recv().await;

    let command = ControlCommand { command: CommandKind::BrightnessUp, state: None, brightness: None };
    store.control("light.main_galley", &command).await.unwrap();

    let outbound = house.drain_outbound();
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].data[2], 180); // round(90 * 2)

    // Loop the transmitted frame back in as the bus echo and confirm it
    // decodes to the expected delta.
    let echoed_id = build_can_id(6, 0x1FEDA, 0x80);
    let echoed = Frame::new(echoed_id, outbound[0].data.clone(), "house", 2);
    let signals = decode_signals(&echoed, &catalog, &mapping);
    store.apply_decoded(mapping.resolve(0x1FEDA, 4).unwrap().clone(), signals, 2).await;

    let delta = delta_rx.recv().await;
    assert!(delta.changed_fields.contains(&"brightness".to_string()));

    let snapshot = store.snapshot("light.main_galley").await.unwrap();
    assert_eq!(snapshot.state.get("brightness"), Some(&SignalValue::Number(90.0)));
}

/// Scenario 3 (§8): bulk control against a mix of known and unknown
/// entities with `ignore_errors: true` completes all three and reports
/// per-entity outcomes individually.
#[tokio::test]
async fn bulk_control_reports_per_entity_outcomes_with_ignore_errors() {
    let catalog = dimmer_catalog();
    let binding_a = light_binding("light.a", 1, "house");
    let binding_c = light_binding("light.c", 2, "house");
    let mapping = Mapping::from_document(MappingDocument { bindings: vec![binding_a, binding_c] }, &catalog).unwrap();

    let transport_config =
        TransportConfig { interface_mappings: [("house".to_string(), "vcan0".to_string())].into_iter().collect(), ..TransportConfig::default() };
    let (inbound_tx, _inbound_rx) = rvc_bus::channel(64);
    let (transport, _mocks) = Transport::spawn_mock(transport_config, inbound_tx);

    let (store, _delta_rx) =
        EntityStoreHandle::spawn(Arc::new(catalog), Arc::new(mapping), Arc::new(transport), 0x80, Duration::from_secs(5));

    let command = ControlCommand { command: CommandKind::Set, state: Some(false), brightness: None };
    let entity_ids = vec!["light.a".to_string(), "light.b".to_string(), "light.c".to_string()];
    let options = BulkOptions { ignore_errors: true, ..BulkOptions::default() };

    let result = store.apply_bulk(&entity_ids, &command, &options).await;

    assert_eq!(result.total_count, 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failed_count, 1);

    let by_id: HashMap<_, _> = result.results.iter().map(|r| (r.entity_id.clone(), r.status)).collect();
    assert_eq!(by_id["light.a"], OperationStatus::Success);
    assert_eq!(by_id["light.b"], OperationStatus::Failed);
    assert_eq!(by_id["light.c"], OperationStatus::Success);
}

/// Scenario 5 (§8): a command for an entity bound to the `chassis`
/// logical interface is transmitted on `can1` only, never `can0`.
#[tokio::test]
async fn control_command_is_routed_to_the_bindings_own_interface() {
    let catalog = dimmer_catalog();
    let binding = light_binding("light.chassis_marker", 9, "chassis");
    let mapping = Mapping::from_document(MappingDocument { bindings: vec![binding] }, &catalog).unwrap();

    let transport_config = TransportConfig {
        interface_mappings: [("house".to_string(), "can0".to_string()), ("chassis".to_string(), "can1".to_string())].into_iter().collect(),
        ..TransportConfig::default()
    };
    let (inbound_tx, _inbound_rx) = rvc_bus::channel(64);
    let (transport, mocks) = Transport::spawn_mock(transport_config, inbound_tx);
    let house = mocks.get("house").unwrap().clone();
    let chassis = mocks.get("chassis").unwrap().clone();

    let (store, _delta_rx) =
        EntityStoreHandle::spawn(Arc::new(catalog), Arc::new(mapping), Arc::new(transport), 0x80, Duration::from_secs(5));

    let command = ControlCommand { command: CommandKind::Set, state: Some(true), brightness: None };
    store.control("light.chassis_marker", &command).await.unwrap();

    assert!(house.drain_outbound().is_empty());
    assert_eq!(chassis.drain_outbound().len(), 1);
}

fn decode_signals(frame: &Frame, catalog: &Catalog, mapping: &Mapping) -> HashMap<String, SignalValue> {
    match decode(frame, catalog, mapping) {
        DecodeOutcome::Decoded { signals, .. } => signals,
        DecodeOutcome::Unmapped { signals, .. } => signals,
        other => panic!("expected a decodable frame, got {other:?} (id {:#x})", parse_can_id(frame.arbitration_id).pgn),
    }
}
