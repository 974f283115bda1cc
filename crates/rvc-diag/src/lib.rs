//! Cross-Protocol Diagnostics (C10)
//!
//! Owns the DTC table and the `DecoderCapability` contract through
//! which sibling-protocol decoders (J1939, Firefly, Spartan K2) are
//! consulted for frames RV-C's Frame Decoder did not claim.

pub mod decoder;
pub mod dtc;
pub mod stubs;
pub mod store;

pub use decoder::{decode_sibling_frame, DecodedFault, DecoderCapability};
pub use dtc::{CorrelationGroup, Dtc, FaultSeverity};
pub use store::DiagHandle;
pub use stubs::{FireflyDecoder, J1939Decoder, SpartanK2Decoder};
