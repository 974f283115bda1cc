//! Entity Store error types and the control-path error-code taxonomy.

use rvc_bus::TransportError;
use rvc_codec::EncodeError;
use serde::Serialize;
use thiserror::Error;

/// Internal store errors (encoding/lookup failures during command handling).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The `error_code` taxonomy (§7) for control-path failures, as rendered
/// on `OperationResult`/`BulkOperationResult`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownEntity,
    UnsupportedCommand,
    InvalidParameter,
    EntityUnavailable,
    InterfaceDown,
    TxFailed,
    TxTimeout,
}

impl From<&StoreError> for ErrorCode {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::UnknownEntity(_) => ErrorCode::UnknownEntity,
            StoreError::Encode(EncodeError::UnsupportedCommand { .. }) => ErrorCode::UnsupportedCommand,
            StoreError::Encode(EncodeError::InvalidParameter(_)) => ErrorCode::InvalidParameter,
            StoreError::Encode(EncodeError::EntityUnavailable) => ErrorCode::EntityUnavailable,
            StoreError::Transport(TransportError::InterfaceDown(_)) => ErrorCode::InterfaceDown,
            StoreError::Transport(TransportError::TxTimeout(_)) => ErrorCode::TxTimeout,
            StoreError::Transport(_) => ErrorCode::TxFailed,
        }
    }
}
