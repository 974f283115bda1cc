//! `rvcd`: bridges RV-C-over-CAN traffic to REST/WebSocket clients.
//!
//! The composition root ([`composition::Daemon`]) constructs the Spec
//! Catalog, Device Mapping, CAN Transport, Entity Store, Broadcaster,
//! Cross-Protocol Diagnostics, and Dispatcher once, wires them
//! together, and registers them with a [`rvc_features::FeatureManager`]
//! for lifecycle reporting and ordered shutdown.

pub mod composition;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod features;
pub mod http;

pub use composition::Daemon;
pub use config::Config;
pub use error::RvcdError;
