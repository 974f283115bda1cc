//! 29-bit arbitration id <-> PGN/source-address decomposition.
//!
//! Layout mirrors the SAE J1939 convention RV-C is built on: priority
//! (3 bits), reserved/data-page (2 bits, only the low one used here),
//! PDU format (8 bits), PDU specific (8 bits), source address (8 bits).
//! When PDU format >= 240 the PDU-specific byte is a group extension and
//! folds into the PGN itself; below that it's a destination address and
//! the PGN is the PDU format alone.

/// The decomposed fields of a 29-bit extended CAN arbitration id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanIdParts {
    pub priority: u8,
    pub pgn: u32,
    pub source_address: u8,
    /// Destination address, only meaningful for PDU1 (PF < 240) frames.
    pub destination_address: Option<u8>,
}

/// Decompose a 29-bit arbitration id into its RV-C/J1939 fields.
pub fn parse_can_id(arbitration_id: u32) -> CanIdParts {
    let id = arbitration_id & 0x1FFF_FFFF;
    let priority = ((id >> 26) & 0x7) as u8;
    let data_page = ((id >> 24) & 0x1) as u8;
    let pdu_format = ((id >> 16) & 0xFF) as u8;
    let pdu_specific = ((id >> 8) & 0xFF) as u8;
    let source_address = (id & 0xFF) as u8;

    if pdu_format >= 240 {
        let pgn = ((data_page as u32) << 16) | ((pdu_format as u32) << 8) | pdu_specific as u32;
        CanIdParts { priority, pgn, source_address, destination_address: None }
    } else {
        let pgn = ((data_page as u32) << 16) | ((pdu_format as u32) << 8);
        CanIdParts { priority, pgn, source_address, destination_address: Some(pdu_specific) }
    }
}

/// Compose a 29-bit arbitration id for an outbound PDU2-style frame
/// (PGN's PDU format implies a broadcast, group-extension PGN).
pub fn build_can_id(priority: u8, pgn: u32, source_address: u8) -> u32 {
    let data_page = ((pgn >> 16) & 0x1) as u32;
    let pdu_format = (pgn >> 8) & 0xFF;
    let pdu_specific = pgn & 0xFF;
    ((priority as u32 & 0x7) << 26)
        | (data_page << 24)
        | (pdu_format << 16)
        | (pdu_specific << 8)
        | source_address as u32
}

/// Network-management / transport PGNs that never carry entity state.
/// The decoder ignores these outright rather than reporting them unknown.
pub const NETWORK_MANAGEMENT_PGNS: &[u32] = &[0x00EA00, 0x00E800, 0x00EE00, 0x00EC00, 0x00EB00];
