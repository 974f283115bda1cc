//! The `Feature` contract (§3, §4.9): a registered subsystem with
//! dependencies and init/start/stop lifecycle hooks.

use crate::error::FeatureError;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown,
    Healthy,
    Degraded,
    Failed,
}

/// Lifecycle + health, combined per §4.9's state machine:
/// `registered -> initialized -> started -> (degraded <-> healthy) -> stopped`,
/// with `failed` terminal and `disabled_due_to_dependency` a startup-only
/// outcome for features pruned before they ever run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeatureState {
    Registered,
    Disabled,
    DisabledDueToDependency { dependency: String },
    Initialized,
    Started,
    Healthy,
    Degraded,
    Stopped,
    Failed { reason: String },
}

/// A named subsystem the daemon's composition root registers with the
/// Feature Manager. Implementors are consulted through `dyn Feature`,
/// so the lifecycle hooks go through `async_trait` rather than plain
/// async-fn-in-trait (which isn't object-safe).
#[async_trait]
pub trait Feature: Send + Sync {
    fn name(&self) -> &str;
    fn dependencies(&self) -> &[String];

    async fn init(&self) -> Result<(), FeatureError>;
    async fn start(&self) -> Result<(), FeatureError>;
    async fn stop(&self) -> Result<(), FeatureError>;

    async fn health(&self) -> HealthState {
        HealthState::Unknown
    }
}
