//! The Dispatcher (C7): central ingress. Decodes every frame, routes
//! the result to the Entity Store or the observed-but-unhandled
//! tables, fans the raw frame out to subscribers, and consults
//! sibling-protocol decoders for frames RV-C's catalog doesn't claim.

use chrono::Utc;
use rvc_broadcast::{BroadcastEvent, BroadcasterHandle};
use rvc_codec::decode::{decode, DecodeOutcome};
use rvc_codec::Frame;
use rvc_diag::{decode_sibling_frame, DecoderCapability, DiagHandle};
use rvc_mapping::observed::ObservedTable;
use rvc_mapping::Mapping;
use rvc_spec::Catalog;
use rvc_store::EntityStoreHandle;
use std::sync::Arc;
use tracing::debug;

/// Bound on the "observed but unhandled" tables (§4.2).
pub const OBSERVED_TABLE_CAPACITY: usize = 1024;

pub struct Dispatcher {
    catalog: Arc<Catalog>,
    mapping: Arc<Mapping>,
    entity_store: EntityStoreHandle,
    broadcaster: BroadcasterHandle,
    diag: DiagHandle,
    sibling_decoders: Vec<Box<dyn DecoderCapability>>,
    unmapped: Arc<ObservedTable<(u32, u8)>>,
    unknown: Arc<ObservedTable<u32>>,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<Catalog>,
        mapping: Arc<Mapping>,
        entity_store: EntityStoreHandle,
        broadcaster: BroadcasterHandle,
        diag: DiagHandle,
        sibling_decoders: Vec<Box<dyn DecoderCapability>>,
        unmapped: Arc<ObservedTable<(u32, u8)>>,
        unknown: Arc<ObservedTable<u32>>,
    ) -> Self {
        Self { catalog, mapping, entity_store, broadcaster, diag, sibling_decoders, unmapped, unknown }
    }

    /// Drain `inbound` forever, dispatching each frame in receipt order.
    /// Frames across interfaces may interleave arbitrarily (§4.7).
    pub async fn run(self, mut inbound: rvc_bus::DropOldestReceiver<Frame>) {
        loop {
            let frame = inbound.recv().await;
            self.dispatch(frame).await;
        }
    }

    async fn dispatch(&self, frame: Frame) {
        self.broadcaster.publish(BroadcastEvent::RawFrame {
            interface: frame.interface.clone(),
            arbitration_id: frame.arbitration_id,
            payload: frame.data.clone(),
            timestamp: Utc::now(),
        });

        let outcome = decode(&frame, &self.catalog, &self.mapping);
        match outcome {
            DecodeOutcome::Decoded { binding, signals } => {
                self.entity_store.apply_decoded(binding, signals, frame.timestamp_ns).await;
            }
            DecodeOutcome::Unmapped { pgn, instance, .. } => {
                self.unmapped.record((pgn, instance), &frame.data);
                self.try_sibling_decode(&frame).await;
            }
            DecodeOutcome::Unknown { pgn, raw } => {
                self.unknown.record(pgn, &raw);
                self.try_sibling_decode(&frame).await;
            }
            DecodeOutcome::Ignore { reason } => {
                debug!(?reason, interface = %frame.interface, "frame ignored by decoder");
            }
        }
    }

    async fn try_sibling_decode(&self, frame: &Frame) {
        let Some((protocol, fault)) = decode_sibling_frame(&self.sibling_decoders, frame) else {
            return;
        };

        if fault.raised {
            self.diag.raise_fault(protocol, fault.source_address, &fault.code, fault.severity).await;
            self.broadcaster.publish(BroadcastEvent::SystemEvent {
                kind: "fault_raised".to_string(),
                detail: format!("{protocol}:{:#04x}:{}", fault.source_address, fault.code),
                timestamp: Utc::now(),
            });
        } else {
            self.diag.clear_fault(protocol, fault.source_address, &fault.code).await;
            self.broadcaster.publish(BroadcastEvent::SystemEvent {
                kind: "fault_cleared".to_string(),
                detail: format!("{protocol}:{:#04x}:{}", fault.source_address, fault.code),
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvc_codec::pgn_id::build_can_id;
    use rvc_diag::J1939Decoder;
    use rvc_mapping::{Capability, DeviceType, MappingDocument};
    use rvc_spec::pgn::{ByteOrder, CatalogDocument, PgnDescriptor, SignalDef};
    use std::collections::HashMap;
    use std::time::Duration;

    fn empty_catalog() -> Catalog {
        Catalog::from_document(CatalogDocument { pgns: vec![], enums: HashMap::new() }).unwrap()
    }

    fn dimmer_catalog_and_mapping() -> (Catalog, Mapping) {
        let catalog = Catalog::from_document(CatalogDocument {
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
        .unwrap();

        let mapping = Mapping::from_document(
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
            &catalog,
        )
        .unwrap();

        (catalog, mapping)
    }

    async fn test_handles() -> (EntityStoreHandle, rvc_bus::DropOldestReceiver<rvc_store::EntityDelta>, BroadcasterHandle, DiagHandle) {
        let (catalog, mapping) = dimmer_catalog_and_mapping();
        let transport_config = rvc_bus::TransportConfig {
            interface_mappings: [("house".to_string(), "vcan0".to_string())].into_iter().collect(),
            ..rvc_bus::TransportConfig::default()
        };
        let (inbound_tx, _inbound_rx) = rvc_bus::channel(16);
        let (transport, _mocks) = rvc_bus::Transport::spawn_mock(transport_config, inbound_tx);
        let (store, delta_rx) =
            EntityStoreHandle::spawn(Arc::new(catalog), Arc::new(mapping), Arc::new(transport), 0x80, Duration::from_secs(5));
        (store, delta_rx, BroadcasterHandle::spawn(), DiagHandle::spawn())
    }

    #[tokio::test]
    async fn decoded_frame_reaches_entity_store_and_raw_frame_reaches_broadcaster() {
        let (catalog, mapping) = dimmer_catalog_and_mapping();
        let (store, _delta_rx, broadcaster, diag) = test_handles().await;

        let (_, mut raw_rx) = broadcaster.subscribe(rvc_broadcast::SubscriptionFilter { raw_can: true, ..Default::default() }).await;

        let dispatcher = Dispatcher::new(
            Arc::new(catalog),
            Arc::new(mapping),
            store.clone(),
            broadcaster,
            diag,
            vec![Box::new(J1939Decoder)],
            Arc::new(ObservedTable::new(OBSERVED_TABLE_CAPACITY)),
            Arc::new(ObservedTable::new(OBSERVED_TABLE_CAPACITY)),
        );

        let id = build_can_id(6, 0x1FEDA, 0x80);
        let frame = Frame::new(id, vec![4, 0xFF, 200, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], "house", 0);
        dispatcher.dispatch(frame).await;

        let raw_event = raw_rx.recv().await.unwrap();
        assert!(matches!(raw_event, BroadcastEvent::RawFrame { .. }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let snapshot = store.snapshot("light.main_galley").await.unwrap();
        assert_eq!(snapshot.state.get("brightness"), Some(&rvc_codec::decode::SignalValue::Number(100.0)));
    }

    #[tokio::test]
    async fn unknown_pgn_is_recorded_and_offered_to_sibling_decoders() {
        let (store, _delta_rx, broadcaster, diag) = test_handles().await;
        let unknown = Arc::new(ObservedTable::new(OBSERVED_TABLE_CAPACITY));

        let dispatcher = Dispatcher::new(
            Arc::new(empty_catalog()),
            Arc::new(Mapping::from_document(MappingDocument { bindings: vec![] }, &empty_catalog()).unwrap()),
            store,
            broadcaster,
            diag.clone(),
            vec![Box::new(J1939Decoder)],
            Arc::new(ObservedTable::new(OBSERVED_TABLE_CAPACITY)),
            unknown.clone(),
        );

        let id = (6u32 << 26) | (rvc_diag::stubs::J1939_DM1_PGN << 8) | 0x20;
        let frame = Frame::new(id, vec![0, 0, 12, 3, 0, 0, 0, 0], "chassis", 0);
        dispatcher.dispatch(frame).await;

        assert_eq!(unknown.len(), 1);
        let active = diag.active_faults().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, "SPN12-FMI3");
    }
}
