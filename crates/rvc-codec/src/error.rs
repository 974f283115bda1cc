//! Error and warning types for decode/encode paths.

use thiserror::Error;

/// Command Encoder failure modes (`§7` taxonomy, control path).
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("device type {device_type:?} has no capability for this command")]
    UnsupportedCommand { device_type: String },

    #[error("entity is unavailable (stale or never observed)")]
    EntityUnavailable,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
