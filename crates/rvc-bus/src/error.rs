//! CAN Transport (C6) error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unknown logical interface: {0}")]
    UnknownInterface(String),

    #[error("interface {0} is down")]
    InterfaceDown(String),

    #[error("send to {interface} failed: {reason}")]
    TxFailed { interface: String, reason: String },

    #[error("send to {0} timed out")]
    TxTimeout(String),

    #[error("socketcan error on {interface}: {source}")]
    Socket {
        interface: String,
        #[source]
        source: std::io::Error,
    },
}
