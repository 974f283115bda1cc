//! The immutable CAN frame type shared by transport, decoder, and encoder.

/// A single CAN frame as observed on, or destined for, the bus.
///
/// Frames are immutable once constructed: nothing downstream of the
/// transport layer ever mutates one in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// 29-bit extended arbitration id (only the low 29 bits are significant).
    pub arbitration_id: u32,
    pub data: Vec<u8>,
    /// Logical interface name this frame was received from, or is destined for.
    pub interface: String,
    /// Monotonic receive timestamp, nanosecond precision. Used only for
    /// ordering and staleness math; never rendered directly at a boundary.
    pub timestamp_ns: u64,
    pub is_error: bool,
}

impl Frame {
    pub fn new(arbitration_id: u32, data: Vec<u8>, interface: impl Into<String>, timestamp_ns: u64) -> Self {
        Self {
            arbitration_id: arbitration_id & 0x1FFF_FFFF,
            data,
            interface: interface.into(),
            timestamp_ns,
            is_error: false,
        }
    }
}
