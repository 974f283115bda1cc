//! The `DecoderCapability` contract (§9 design note): a closed set of
//! sibling-protocol decoders the Dispatcher consults, in fixed
//! priority, for frames RV-C's Frame Decoder did not claim.

use crate::dtc::FaultSeverity;
use rvc_codec::Frame;

/// What a sibling decoder extracted from a claimed frame.
#[derive(Clone, Debug)]
pub struct DecodedFault {
    pub source_address: u8,
    pub code: String,
    pub severity: FaultSeverity,
    /// `true` if this frame reports the fault as currently active,
    /// `false` if it reports the fault as cleared.
    pub raised: bool,
}

/// A sibling-protocol decoder. `claims` is a cheap, non-allocating
/// check; `decode` is only called on a frame this decoder claimed.
pub trait DecoderCapability: Send + Sync {
    fn protocol_name(&self) -> &'static str;
    fn claims(&self, frame: &Frame) -> bool;
    fn decode(&self, frame: &Frame) -> Option<DecodedFault>;
}

/// Consults `decoders` in order and returns the first claim's result.
/// RV-C itself is not in this list — the Dispatcher only reaches here
/// once the Frame Decoder has reported `Unknown`/`Unmapped`.
pub fn decode_sibling_frame(decoders: &[Box<dyn DecoderCapability>], frame: &Frame) -> Option<(&'static str, DecodedFault)> {
    for decoder in decoders {
        if decoder.claims(frame) {
            return decoder.decode(frame).map(|fault| (decoder.protocol_name(), fault));
        }
    }
    None
}
