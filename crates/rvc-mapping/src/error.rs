//! Error types for the Device Mapping

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MappingError>;

/// Device Mapping load/validation errors (`MAPPING_INVALID`, fatal at startup).
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to read device mapping: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed device mapping document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate entity id: {0:?}")]
    DuplicateEntity(String),

    #[error("binding for entity {entity_id:?} references unknown PGN {pgn:#x}")]
    UnknownPgn { entity_id: String, pgn: u32 },

    #[error("binding for entity {entity_id:?}: (pgn {pgn:#x}, instance {instance}) already bound to {existing:?}")]
    DuplicateBinding {
        entity_id: String,
        pgn: u32,
        instance: u8,
        existing: String,
    },

    #[error("binding for entity {entity_id:?}: capability {capability:?} not valid for device type {device_type:?}")]
    InvalidCapability {
        entity_id: String,
        capability: Capability,
        device_type: DeviceType,
    },
}

use crate::binding::{Capability, DeviceType};
