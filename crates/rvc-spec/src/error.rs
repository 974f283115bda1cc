//! Error types for the Spec Catalog

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Spec Catalog load/validation errors. Every variant is fatal at
/// startup (`SPEC_INVALID`) — the catalog is immutable once published
/// and no caller ever observes a partially-loaded catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read spec catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed spec catalog document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("PGN {pgn:#x} signal {signal:?}: {reason}")]
    SignalInvalid {
        pgn: u32,
        signal: String,
        reason: String,
    },

    #[error("PGN {pgn:#x}: duplicate signal name {signal:?}")]
    DuplicateSignal { pgn: u32, signal: String },

    #[error("PGN {pgn:#x}: duplicate PGN definition")]
    DuplicatePgn { pgn: u32 },

    #[error("PGN {pgn:#x} signal {signal:?}: unknown enumeration table {enum_ref:?}")]
    UnknownEnum {
        pgn: u32,
        signal: String,
        enum_ref: String,
    },
}
