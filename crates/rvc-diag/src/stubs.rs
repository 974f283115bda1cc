//! Minimal sibling-protocol decoders (§2, §9). RV-C has a full Spec
//! Catalog; these three exist only to drive DTC correlation and
//! deliberately decode the smallest slice of each protocol that does
//! that — a handful of fixed PGNs and byte offsets, not a general
//! decode table.

use crate::decoder::{DecodedFault, DecoderCapability};
use crate::dtc::FaultSeverity;
use rvc_codec::pgn_id::parse_can_id;
use rvc_codec::Frame;

/// SAE J1939 DM1 ("Active Diagnostic Trouble Codes"). Real, standardised
/// PGN; this decoder reads only the first SPN/FMI pair in the message.
pub const J1939_DM1_PGN: u32 = 0x00FECA;

pub struct J1939Decoder;

impl DecoderCapability for J1939Decoder {
    fn protocol_name(&self) -> &'static str {
        "j1939"
    }

    fn claims(&self, frame: &Frame) -> bool {
        parse_can_id(frame.arbitration_id).pgn == J1939_DM1_PGN
    }

    fn decode(&self, frame: &Frame) -> Option<DecodedFault> {
        if frame.data.len() < 4 {
            return None;
        }
        let source_address = parse_can_id(frame.arbitration_id).source_address;
        let spn_low = frame.data[2];
        let fmi = frame.data[3] & 0x1F;

        let raised = !(spn_low == 0 && fmi == 0);
        let severity = match fmi {
            0 => FaultSeverity::Info,
            1..=2 => FaultSeverity::Warning,
            _ => FaultSeverity::Critical,
        };

        Some(DecodedFault { source_address, code: format!("SPN{spn_low}-FMI{fmi}"), severity, raised })
    }
}

/// Placeholder PGN for a Firefly Integrations coach-control fault
/// frame; Firefly's wire format is not publicly specified, so this
/// claims a fixed PGN and reads a fixed 3-byte layout
/// `[code, severity, active]` sufficient for correlation.
pub const FIREFLY_FAULT_PGN: u32 = 0x01FFF0;

pub struct FireflyDecoder;

impl DecoderCapability for FireflyDecoder {
    fn protocol_name(&self) -> &'static str {
        "firefly"
    }

    fn claims(&self, frame: &Frame) -> bool {
        parse_can_id(frame.arbitration_id).pgn == FIREFLY_FAULT_PGN
    }

    fn decode(&self, frame: &Frame) -> Option<DecodedFault> {
        decode_fixed_fault_layout(frame)
    }
}

/// Placeholder PGN for a Spartan K2 chassis fault frame, same rationale
/// and layout as [`FireflyDecoder`].
pub const SPARTAN_K2_FAULT_PGN: u32 = 0x01FFF1;

pub struct SpartanK2Decoder;

impl DecoderCapability for SpartanK2Decoder {
    fn protocol_name(&self) -> &'static str {
        "spartan_k2"
    }

    fn claims(&self, frame: &Frame) -> bool {
        parse_can_id(frame.arbitration_id).pgn == SPARTAN_K2_FAULT_PGN
    }

    fn decode(&self, frame: &Frame) -> Option<DecodedFault> {
        decode_fixed_fault_layout(frame)
    }
}

fn decode_fixed_fault_layout(frame: &Frame) -> Option<DecodedFault> {
    if frame.data.len() < 3 {
        return None;
    }
    let source_address = parse_can_id(frame.arbitration_id).source_address;
    let code = frame.data[0];
    let severity = match frame.data[1] {
        0 => FaultSeverity::Info,
        1 => FaultSeverity::Warning,
        _ => FaultSeverity::Critical,
    };
    let raised = frame.data[2] != 0;

    Some(DecodedFault { source_address, code: format!("CODE{code}"), severity, raised })
}
