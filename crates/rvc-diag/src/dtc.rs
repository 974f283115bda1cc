//! The DTC (diagnostic trouble code) record (§3).

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultSeverity {
    Info,
    Warning,
    Critical,
}

/// One fault, keyed by `(protocol, source_address, code)`.
#[derive(Clone, Debug, Serialize)]
pub struct Dtc {
    pub protocol: String,
    pub source_address: u8,
    pub code: String,
    pub severity: FaultSeverity,
    pub active: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u32,
}

/// Faults from different protocols correlated by a shared
/// `(source_address, code)` with overlapping active windows (§4.10).
#[derive(Clone, Debug, Serialize)]
pub struct CorrelationGroup {
    pub source_address: u8,
    pub code: String,
    pub faults: Vec<Dtc>,
}
