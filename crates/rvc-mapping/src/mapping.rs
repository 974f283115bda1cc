//! Device Mapping loading, validation, and lookup (C2)

use crate::binding::{DeviceBinding, DeviceType};
use crate::error::{MappingError, Result};
use rvc_spec::Catalog;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// On-disk document shape for the device mapping table (pre-validation).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MappingDocument {
    pub bindings: Vec<DeviceBinding>,
}

/// Immutable, indexed coach-specific device binding table.
#[derive(Debug)]
pub struct Mapping {
    /// Keyed by (pgn, instance); unique per protocol within this table.
    by_pgn_instance: HashMap<(u32, u8), DeviceBinding>,
    by_entity_id: HashMap<String, (u32, u8)>,
    by_device_type: HashMap<DeviceType, Vec<String>>,
}

impl Mapping {
    pub fn load_from_path(path: impl AsRef<Path>, catalog: &Catalog) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::load_from_slice(&bytes, catalog)
    }

    pub fn load_from_reader(mut reader: impl Read, catalog: &Catalog) -> Result<Self> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::load_from_slice(buf.as_bytes(), catalog)
    }

    pub fn load_from_slice(bytes: &[u8], catalog: &Catalog) -> Result<Self> {
        let doc: MappingDocument = serde_json::from_slice(bytes)?;
        Self::from_document(doc, catalog)
    }

    pub fn from_document(doc: MappingDocument, catalog: &Catalog) -> Result<Self> {
        let mut by_pgn_instance = HashMap::with_capacity(doc.bindings.len());
        let mut by_entity_id = HashMap::with_capacity(doc.bindings.len());
        let mut by_device_type: HashMap<DeviceType, Vec<String>> = HashMap::new();

        for binding in doc.bindings {
            if by_entity_id.contains_key(&binding.entity_id) {
                return Err(MappingError::DuplicateEntity(binding.entity_id));
            }

            if catalog.lookup(binding.pgn).is_none() {
                return Err(MappingError::UnknownPgn {
                    entity_id: binding.entity_id,
                    pgn: binding.pgn,
                });
            }

            let allowed = binding.device_type.allowed_capabilities();
            for cap in &binding.capabilities {
                if !allowed.contains(cap) {
                    return Err(MappingError::InvalidCapability {
                        entity_id: binding.entity_id,
                        capability: *cap,
                        device_type: binding.device_type,
                    });
                }
            }

            let key = (binding.pgn, binding.instance);
            if let Some(existing) = by_pgn_instance.get(&key) {
                let existing: &DeviceBinding = existing;
                return Err(MappingError::DuplicateBinding {
                    entity_id: binding.entity_id,
                    pgn: binding.pgn,
                    instance: binding.instance,
                    existing: existing.entity_id.clone(),
                });
            }

            by_entity_id.insert(binding.entity_id.clone(), key);
            by_device_type
                .entry(binding.device_type)
                .or_default()
                .push(binding.entity_id.clone());
            by_pgn_instance.insert(key, binding);
        }

        info!(binding_count = by_pgn_instance.len(), "device mapping loaded");

        Ok(Self {
            by_pgn_instance,
            by_entity_id,
            by_device_type,
        })
    }

    pub fn resolve(&self, pgn: u32, instance: u8) -> Option<&DeviceBinding> {
        self.by_pgn_instance.get(&(pgn, instance))
    }

    pub fn binding_for_entity(&self, entity_id: &str) -> Option<&DeviceBinding> {
        let key = self.by_entity_id.get(entity_id)?;
        self.by_pgn_instance.get(key)
    }

    pub fn entities_by_type(&self, device_type: DeviceType) -> impl Iterator<Item = &str> {
        self.by_device_type
            .get(&device_type)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn all_entity_ids(&self) -> impl Iterator<Item = &str> {
        self.by_entity_id.keys().map(String::as_str)
    }

    pub fn binding_count(&self) -> usize {
        self.by_pgn_instance.len()
    }
}
