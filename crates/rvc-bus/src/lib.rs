//! CAN Transport (C6)
//!
//! One multiplexed ingress/egress task per configured logical interface,
//! bounded drop-oldest ingress, bounded block-with-timeout egress, and
//! per-interface link statistics.

pub mod error;
pub mod interface;
pub mod queue;
pub mod stats;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use error::TransportError;
pub use interface::{CanLike, RawFrame};
pub use queue::{channel, DropOldestReceiver, DropOldestSender};
pub use stats::{InterfaceStats, InterfaceStatsSnapshot};
pub use transport::{Transport, TransportConfig, DEFAULT_INBOUND_CAPACITY, DEFAULT_OUTBOUND_CAPACITY, DEFAULT_SEND_TIMEOUT};

#[cfg(any(test, feature = "test-support"))]
pub use mock::{MockCanInterface, MockHandle};
