//! The `CanLike` contract workers are generic over, plus the real
//! socketcan-backed implementation. Kept generic (not a trait object) so
//! ingress/egress loops monomorphize over either the real interface or
//! the `test-support` mock with no dynamic dispatch.

use crate::error::TransportError;
use socketcan::tokio::CanSocket;
use socketcan::{CanFrame, ExtendedId, Frame as SocketCanFrameExt, Id};

/// A raw frame at the transport boundary — no interface name or
/// timestamp yet; those are stamped on by the ingress/egress loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub arbitration_id: u32,
    pub data: Vec<u8>,
}

pub trait CanLike: Send + 'static {
    async fn recv_frame(&mut self) -> Result<RawFrame, TransportError>;
    async fn send_frame(&mut self, frame: RawFrame) -> Result<(), TransportError>;
}

pub struct SocketCanInterface {
    physical_name: String,
    socket: CanSocket,
}

impl SocketCanInterface {
    pub fn open(physical_name: &str) -> Result<Self, TransportError> {
        let socket = CanSocket::open(physical_name).map_err(|source| TransportError::Socket {
            interface: physical_name.to_string(),
            source,
        })?;
        Ok(Self { physical_name: physical_name.to_string(), socket })
    }
}

impl CanLike for SocketCanInterface {
    async fn recv_frame(&mut self) -> Result<RawFrame, TransportError> {
        let frame = self.socket.read_frame().await.map_err(|source| TransportError::Socket {
            interface: self.physical_name.clone(),
            source,
        })?;
        let arbitration_id = match frame.id() {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        };
        Ok(RawFrame { arbitration_id, data: frame.data().to_vec() })
    }

    async fn send_frame(&mut self, frame: RawFrame) -> Result<(), TransportError> {
        let id = ExtendedId::new(frame.arbitration_id).ok_or_else(|| TransportError::TxFailed {
            interface: self.physical_name.clone(),
            reason: format!("arbitration id {:#x} out of 29-bit range", frame.arbitration_id),
        })?;
        let can_frame = CanFrame::new(Id::Extended(id), &frame.data).ok_or_else(|| TransportError::TxFailed {
            interface: self.physical_name.clone(),
            reason: "payload exceeds 8 bytes".to_string(),
        })?;
        self.socket.write_frame(&can_frame).await.map_err(|source| TransportError::Socket {
            interface: self.physical_name.clone(),
            source,
        })
    }
}
