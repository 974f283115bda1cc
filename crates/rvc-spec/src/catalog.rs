//! Spec Catalog loading, validation, and lookup (C1)

use crate::error::{CatalogError, Result};
use crate::pgn::{CatalogDocument, EnumTable, PgnDescriptor};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{error, info};

/// Immutable, indexed RV-C spec catalog. Safe to share across tasks
/// via `Arc` without further coordination once loaded — publication is
/// a one-shot at startup.
#[derive(Debug)]
pub struct Catalog {
    pgns: HashMap<u32, PgnDescriptor>,
    enums: HashMap<String, EnumTable>,
}

impl Catalog {
    /// Load and validate a catalog document from a path.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::load_from_slice(&bytes)
    }

    /// Load and validate a catalog document from a reader.
    pub fn load_from_reader(mut reader: impl Read) -> Result<Self> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::load_from_slice(buf.as_bytes())
    }

    /// Load and validate a catalog document from raw JSON bytes.
    pub fn load_from_slice(bytes: &[u8]) -> Result<Self> {
        let doc: CatalogDocument = serde_json::from_slice(bytes)?;
        Self::from_document(doc)
    }

    /// Validate a parsed document and build the indexed catalog.
    pub fn from_document(doc: CatalogDocument) -> Result<Self> {
        let mut pgns = HashMap::with_capacity(doc.pgns.len());

        for pgn in doc.pgns {
            if pgns.contains_key(&pgn.pgn) {
                error!(pgn = format!("{:#x}", pgn.pgn), "duplicate PGN definition");
                return Err(CatalogError::DuplicatePgn { pgn: pgn.pgn });
            }
            validate_pgn(&pgn, &doc.enums)?;
            pgns.insert(pgn.pgn, pgn);
        }

        info!(pgn_count = pgns.len(), enum_count = doc.enums.len(), "spec catalog loaded");

        Ok(Self {
            pgns,
            enums: doc.enums,
        })
    }

    /// O(1) lookup of a PGN descriptor.
    pub fn lookup(&self, pgn: u32) -> Option<&PgnDescriptor> {
        self.pgns.get(&pgn)
    }

    /// Iterate every loaded PGN descriptor.
    pub fn enumerate(&self) -> impl Iterator<Item = &PgnDescriptor> {
        self.pgns.values()
    }

    /// Resolve a raw value through a named enumeration table, or `None`
    /// if the table doesn't exist.
    pub fn enum_label(&self, enum_ref: &str, raw: u64) -> Option<&str> {
        self.enums.get(enum_ref)?.get(&raw).map(String::as_str)
    }

    pub fn pgn_count(&self) -> usize {
        self.pgns.len()
    }
}

fn validate_pgn(pgn: &PgnDescriptor, enums: &HashMap<String, EnumTable>) -> Result<()> {
    let mut seen = std::collections::HashSet::new();

    for signal in &pgn.signals {
        if !seen.insert(signal.name.clone()) {
            return Err(CatalogError::DuplicateSignal {
                pgn: pgn.pgn,
                signal: signal.name.clone(),
            });
        }

        if signal.length_bits == 0 {
            return Err(CatalogError::SignalInvalid {
                pgn: pgn.pgn,
                signal: signal.name.clone(),
                reason: "zero-length signal".into(),
            });
        }

        if signal.end_bit() > 64 {
            return Err(CatalogError::SignalInvalid {
                pgn: pgn.pgn,
                signal: signal.name.clone(),
                reason: format!(
                    "signal end bit {} exceeds max 8-byte payload (64 bits)",
                    signal.end_bit()
                ),
            });
        }

        if let Some(enum_ref) = &signal.enum_ref {
            if !enums.contains_key(enum_ref) {
                return Err(CatalogError::UnknownEnum {
                    pgn: pgn.pgn,
                    signal: signal.name.clone(),
                    enum_ref: enum_ref.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgn::{ByteOrder, SignalDef};

    fn sample_signal(name: &str, start_bit: u16, length_bits: u16) -> SignalDef {
        SignalDef {
            name: name.to_string(),
            start_bit,
            length_bits,
            byte_order: ByteOrder::LittleEndian,
            scale: 1.0,
            offset: 0.0,
            unit: None,
            enum_ref: None,
            value_mask: None,
        }
    }

    #[test]
    fn loads_valid_catalog() {
        let doc = CatalogDocument {
            pgns: vec![PgnDescriptor {
                pgn: 0x1FEDA,
                name: "DC_DIMMER_STATUS_3".into(),
                signals: vec![
                    sample_signal("instance", 0, 8),
                    sample_signal("operating_status", 16, 8),
                ],
            }],
            enums: HashMap::new(),
        };

        let catalog = Catalog::from_document(doc).unwrap();
        assert_eq!(catalog.pgn_count(), 1);
        let pgn = catalog.lookup(0x1FEDA).unwrap();
        assert_eq!(pgn.signal("instance").unwrap().start_bit, 0);
    }

    #[test]
    fn rejects_signal_overrunning_payload() {
        let doc = CatalogDocument {
            pgns: vec![PgnDescriptor {
                pgn: 1,
                name: "TOO_BIG".into(),
                signals: vec![sample_signal("overrun", 60, 8)],
            }],
            enums: HashMap::new(),
        };

        let err = Catalog::from_document(doc).unwrap_err();
        assert!(matches!(err, CatalogError::SignalInvalid { .. }));
    }

    #[test]
    fn rejects_duplicate_signal_names() {
        let doc = CatalogDocument {
            pgns: vec![PgnDescriptor {
                pgn: 1,
                name: "DUP".into(),
                signals: vec![sample_signal("a", 0, 8), sample_signal("a", 8, 8)],
            }],
            enums: HashMap::new(),
        };

        let err = Catalog::from_document(doc).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateSignal { .. }));
    }

    #[test]
    fn rejects_unresolved_enum_ref() {
        let mut sig = sample_signal("state", 0, 8);
        sig.enum_ref = Some("missing_table".into());
        let doc = CatalogDocument {
            pgns: vec![PgnDescriptor {
                pgn: 1,
                name: "ENUM_TEST".into(),
                signals: vec![sig],
            }],
            enums: HashMap::new(),
        };

        let err = Catalog::from_document(doc).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownEnum { .. }));
    }

    #[test]
    fn rejects_duplicate_pgn() {
        let doc = CatalogDocument {
            pgns: vec![
                PgnDescriptor { pgn: 1, name: "A".into(), signals: vec![] },
                PgnDescriptor { pgn: 1, name: "B".into(), signals: vec![] },
            ],
            enums: HashMap::new(),
        };

        let err = Catalog::from_document(doc).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicatePgn { .. }));
    }

    #[test]
    fn loads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"pgns":[{"pgn":1,"name":"A","signals":[]}],"enums":{}}"#,
        )
        .unwrap();

        let catalog = Catalog::load_from_path(&path).unwrap();
        assert_eq!(catalog.pgn_count(), 1);
    }
}
