//! Feature Manager error taxonomy (§7: `FEATURE_INIT_FAILED`,
//! `FEATURE_STOP_UNCLEAN`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("dependency cycle detected among features: {features:?}")]
    CycleDetected { features: Vec<String> },

    #[error("feature {name} failed to initialize: {reason}")]
    InitFailed { name: String, reason: String },

    #[error("feature {name} failed to start: {reason}")]
    StartFailed { name: String, reason: String },

    #[error("feature {name} depends on unregistered feature {dependency}")]
    UnknownDependency { name: String, dependency: String },
}
