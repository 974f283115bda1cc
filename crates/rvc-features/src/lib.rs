//! Feature Manager (C9)
//!
//! Registers the daemon's subsystems as named, dependency-ordered
//! features with init/start/stop hooks, prunes features whose
//! dependencies are disabled, and reports lifecycle + health state for
//! `GET /features`.

pub mod error;
pub mod feature;
pub mod registry;

pub use error::FeatureError;
pub use feature::{Feature, FeatureState, HealthState};
pub use registry::{FeatureManager, FeatureReport};
