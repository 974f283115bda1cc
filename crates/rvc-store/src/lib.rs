//! Entity Store (C5)
//!
//! In-memory authoritative state of all logical entities, history ring
//! buffers, and derived metadata indices. A single-writer actor: all
//! mutations go through one inbox, reads are served as immutable
//! snapshots produced at the serialization point.

pub mod canonical;
pub mod entity;
pub mod error;
pub mod handle;
pub mod operation;
pub mod store;

pub use entity::{Entity, EntitySnapshot};
pub use error::{ErrorCode, StoreError};
pub use handle::EntityStoreHandle;
pub use operation::{BulkOptions, BulkOperationResult, OperationResult, OperationStatus};
pub use store::{EntityDelta, EntityStore};
