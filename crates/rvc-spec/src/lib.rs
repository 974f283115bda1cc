//! RV-C Spec Catalog
//!
//! Loads and indexes the declarative protocol description: the PGN/DGN
//! table, signal layouts, and shared enumeration tables. The loaded
//! catalog is immutable after load and safe to share across tasks
//! without coordination.
//!
//! # Modules
//!
//! - [`pgn`]: PGN descriptor and signal layout types
//! - [`catalog`]: loading, validation, and lookup
//! - [`error`]: error types

pub mod catalog;
pub mod error;
pub mod pgn;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
pub use pgn::{ByteOrder, PgnDescriptor, SignalDef};
