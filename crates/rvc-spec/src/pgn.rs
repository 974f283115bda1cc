//! PGN descriptor and signal layout types (RV-C spec catalog, §3/§4.1)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Byte order a signal is packed in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// A single signal's bit-level layout within a PGN payload, plus the
/// engineering-unit transform applied to the raw integer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SignalDef {
    pub name: String,
    /// Bit offset from the start of the payload (bit 0 = first bit of byte 0).
    pub start_bit: u16,
    pub length_bits: u16,
    pub byte_order: ByteOrder,
    pub scale: f64,
    pub offset: f64,
    pub unit: Option<String>,
    /// Name of a shared enumeration table, if raw values map to labels.
    pub enum_ref: Option<String>,
    /// Optional mask applied to the raw value before the enum/scale transform.
    pub value_mask: Option<u64>,
}

impl SignalDef {
    /// Exclusive end bit, i.e. `start_bit + length_bits`.
    pub fn end_bit(&self) -> u32 {
        self.start_bit as u32 + self.length_bits as u32
    }

    /// The raw integer value that represents "not available" for this
    /// signal's bit width — all-ones, per the RV-C convention.
    pub fn not_available_sentinel(&self) -> u64 {
        if self.length_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.length_bits) - 1
        }
    }
}

/// A PGN's full signal layout, as loaded from the spec catalog.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PgnDescriptor {
    pub pgn: u32,
    pub name: String,
    pub signals: Vec<SignalDef>,
}

impl PgnDescriptor {
    /// Find a signal by name.
    pub fn signal(&self, name: &str) -> Option<&SignalDef> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// Highest end bit among this PGN's signals, used to check a frame
    /// carries enough payload bytes to decode.
    pub fn max_end_bit(&self) -> u32 {
        self.signals.iter().map(SignalDef::end_bit).max().unwrap_or(0)
    }
}

/// Raw enumeration table: raw integer -> human label.
pub type EnumTable = HashMap<u64, String>;

/// On-disk document shape for the spec catalog (pre-validation).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub pgns: Vec<PgnDescriptor>,
    #[serde(default)]
    pub enums: HashMap<String, EnumTable>,
}
