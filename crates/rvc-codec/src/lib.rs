//! Frame Decoder (C3) and Command Encoder (C4).
//!
//! Decoding is pure: `decode` takes an immutable [`Frame`] plus the spec
//! catalog and device mapping and returns a [`DecodeOutcome`] with no side
//! effects. Encoding is pure in the same sense: `encode` takes a binding,
//! catalog, optional current-state snapshot, and a [`ControlCommand`] and
//! returns the CAN frames to transmit, or a reason it can't.

pub mod command;
pub mod decode;
pub mod error;
pub mod frame;
pub mod pgn_id;

pub use command::{ControlCommand, CommandKind, CurrentState};
pub use decode::{decode, DecodeOutcome, IgnoreReason, SignalValue};
pub use error::EncodeError;
pub use frame::Frame;
pub use pgn_id::CanIdParts;
