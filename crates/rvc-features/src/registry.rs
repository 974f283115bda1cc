//! The Feature Manager (C9): registration, topological start/stop
//! ordering, dependency pruning, and health reporting.

use crate::error::FeatureError;
use crate::feature::{Feature, FeatureState, HealthState};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

struct Registration {
    feature: Box<dyn Feature>,
    enabled: bool,
    state: FeatureState,
}

/// Owns every registered feature and drives its lifecycle. Not
/// `Clone`/`Send`-shared across tasks; the composition root owns one
/// instance and calls it from a single place (startup and shutdown).
pub struct FeatureManager {
    registrations: HashMap<String, Registration>,
    stop_timeout: Duration,
    started_order: Vec<String>,
}

/// Rendering of one feature's current state for `GET /features`.
#[derive(Clone, Debug, Serialize)]
pub struct FeatureReport {
    pub name: String,
    pub dependencies: Vec<String>,
    #[serde(flatten)]
    pub state: FeatureState,
}

impl Default for FeatureManager {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_TIMEOUT)
    }
}

impl FeatureManager {
    pub fn new(stop_timeout: Duration) -> Self {
        Self { registrations: HashMap::new(), stop_timeout, started_order: Vec::new() }
    }

    /// Register a feature with its file/env-resolved enabled flag.
    /// Panics on duplicate names — that's a composition-root wiring bug,
    /// not a runtime condition.
    pub fn register(&mut self, feature: Box<dyn Feature>, enabled: bool) {
        let name = feature.name().to_string();
        assert!(!self.registrations.contains_key(&name), "feature {name} registered twice");
        self.registrations.insert(name, Registration { feature, enabled, state: FeatureState::Registered });
    }

    fn topo_order(&self) -> Result<Vec<String>, FeatureError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for (name, reg) in &self.registrations {
            in_degree.entry(name).or_insert(0);
            for dep in reg.feature.dependencies() {
                if !self.registrations.contains_key(dep) {
                    return Err(FeatureError::UnknownDependency { name: name.clone(), dependency: dep.clone() });
                }
                *in_degree.entry(name.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }

        let mut queue: VecDeque<&str> = in_degree.iter().filter(|(_, &d)| d == 0).map(|(&n, _)| n).collect();
        let mut ordered_names: Vec<&str> = queue.iter().copied().collect();
        ordered_names.sort_unstable();
        queue = ordered_names.into_iter().collect();

        let mut order = Vec::with_capacity(self.registrations.len());
        while let Some(name) = queue.pop_front() {
            order.push(name.to_string());
            if let Some(deps) = dependents.get(name) {
                let mut ready = Vec::new();
                for &dependent in deps {
                    let degree = in_degree.get_mut(dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(dependent);
                    }
                }
                ready.sort_unstable();
                queue.extend(ready);
            }
        }

        if order.len() != self.registrations.len() {
            let mut stuck: Vec<String> = in_degree.iter().filter(|(_, &d)| d > 0).map(|(&n, _)| n.to_string()).collect();
            stuck.sort();
            return Err(FeatureError::CycleDetected { features: stuck });
        }

        Ok(order)
    }

    /// Prune, initialize, and start every enabled feature in
    /// dependency order. On any init/start failure, already-started
    /// features are stopped in reverse and the error is returned.
    pub async fn start_all(&mut self) -> Result<(), FeatureError> {
        let order = self.topo_order()?;
        let mut effectively_enabled: HashSet<String> = HashSet::new();

        for name in &order {
            let reg = self.registrations.get(name).expect("topo_order only names registered features");
            let disabling_dependency = reg
                .feature
                .dependencies()
                .iter()
                .find(|dep| !effectively_enabled.contains(*dep))
                .cloned();

            let enabled = reg.enabled && disabling_dependency.is_none();
            if enabled {
                effectively_enabled.insert(name.clone());
            } else if let Some(dependency) = disabling_dependency {
                info!(feature = name, dependency, "feature disabled_due_to_dependency");
                self.registrations.get_mut(name).unwrap().state = FeatureState::DisabledDueToDependency { dependency };
            } else {
                self.registrations.get_mut(name).unwrap().state = FeatureState::Disabled;
            }
        }

        for name in &order {
            if !effectively_enabled.contains(name) {
                continue;
            }

            let reg = self.registrations.get(name).unwrap();
            if let Err(err) = reg.feature.init().await {
                warn!(feature = name, error = %err, "feature init failed");
                self.registrations.get_mut(name).unwrap().state = FeatureState::Failed { reason: err.to_string() };
                self.rollback().await;
                return Err(FeatureError::InitFailed { name: name.clone(), reason: err.to_string() });
            }
            self.registrations.get_mut(name).unwrap().state = FeatureState::Initialized;

            let reg = self.registrations.get(name).unwrap();
            if let Err(err) = reg.feature.start().await {
                warn!(feature = name, error = %err, "feature start failed");
                self.registrations.get_mut(name).unwrap().state = FeatureState::Failed { reason: err.to_string() };
                self.rollback().await;
                return Err(FeatureError::StartFailed { name: name.clone(), reason: err.to_string() });
            }
            self.registrations.get_mut(name).unwrap().state = FeatureState::Started;
            self.started_order.push(name.clone());
            info!(feature = name, "feature started");
        }

        Ok(())
    }

    async fn rollback(&mut self) {
        let started = std::mem::take(&mut self.started_order);
        for name in started.into_iter().rev() {
            self.stop_one(&name).await;
        }
    }

    /// Stop every started feature in reverse topological order, each
    /// bounded by the configured per-feature stop timeout. Timeouts are
    /// logged as unclean stops; shutdown always continues.
    pub async fn shutdown(&mut self) {
        let started = std::mem::take(&mut self.started_order);
        for name in started.into_iter().rev() {
            self.stop_one(&name).await;
        }
    }

    async fn stop_one(&mut self, name: &str) {
        let Some(reg) = self.registrations.get(name) else { return };
        match tokio::time::timeout(self.stop_timeout, reg.feature.stop()).await {
            Ok(Ok(())) => {
                self.registrations.get_mut(name).unwrap().state = FeatureState::Stopped;
                info!(feature = name, "feature stopped");
            }
            Ok(Err(err)) => {
                warn!(feature = name, error = %err, "feature stop returned an error (unclean)");
                self.registrations.get_mut(name).unwrap().state = FeatureState::Stopped;
            }
            Err(_elapsed) => {
                warn!(feature = name, timeout_secs = self.stop_timeout.as_secs(), "feature stop timed out (FEATURE_STOP_UNCLEAN)");
                self.registrations.get_mut(name).unwrap().state = FeatureState::Stopped;
            }
        }
    }

    /// Sample health for every currently-started feature and fold it
    /// into that feature's reported state.
    pub async fn refresh_health(&mut self) {
        let started: Vec<String> = self.started_order.clone();
        for name in started {
            let reg = self.registrations.get(&name).unwrap();
            let health = reg.feature.health().await;
            let state = match health {
                HealthState::Healthy => FeatureState::Healthy,
                HealthState::Degraded => FeatureState::Degraded,
                HealthState::Failed => FeatureState::Failed { reason: "health check reported failed".to_string() },
                HealthState::Unknown => continue,
            };
            self.registrations.get_mut(&name).unwrap().state = state;
        }
    }

    pub fn reports(&self) -> Vec<FeatureReport> {
        let mut reports: Vec<FeatureReport> = self
            .registrations
            .values()
            .map(|reg| FeatureReport {
                name: reg.feature.name().to_string(),
                dependencies: reg.feature.dependencies().to_vec(),
                state: reg.state.clone(),
            })
            .collect();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct StubFeature {
        name: String,
        deps: Vec<String>,
        started: Arc<AtomicBool>,
        fail_init: bool,
        start_order: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Feature for StubFeature {
        fn name(&self) -> &str {
            &self.name
        }
        fn dependencies(&self) -> &[String] {
            &self.deps
        }
        async fn init(&self) -> Result<(), FeatureError> {
            if self.fail_init {
                return Err(FeatureError::InitFailed { name: self.name.clone(), reason: "boom".into() });
            }
            Ok(())
        }
        async fn start(&self) -> Result<(), FeatureError> {
            self.started.store(true, Ordering::SeqCst);
            self.start_order.lock().unwrap().push(self.name.clone());
            Ok(())
        }
        async fn stop(&self) -> Result<(), FeatureError> {
            self.started.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn stub(name: &str, deps: &[&str], order: Arc<std::sync::Mutex<Vec<String>>>) -> StubFeature {
        StubFeature {
            name: name.to_string(),
            deps: deps.iter().map(|s| s.to_string()).collect(),
            started: Arc::new(AtomicBool::new(false)),
            fail_init: false,
            start_order: order,
        }
    }

    #[tokio::test]
    async fn starts_in_dependency_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut manager = FeatureManager::default();
        manager.register(Box::new(stub("b", &["a"], order.clone())), true);
        manager.register(Box::new(stub("a", &[], order.clone())), true);

        manager.start_all().await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn disabled_dependency_disables_dependent_feature() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut manager = FeatureManager::default();
        manager.register(Box::new(stub("a", &[], order.clone())), false);
        manager.register(Box::new(stub("b", &["a"], order.clone())), true);

        manager.start_all().await.unwrap();

        let reports = manager.reports();
        let b = reports.iter().find(|r| r.name == "b").unwrap();
        assert_eq!(b.state, FeatureState::DisabledDueToDependency { dependency: "a".to_string() });
        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cycle_is_rejected_and_names_participants() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut manager = FeatureManager::default();
        manager.register(Box::new(stub("a", &["b"], order.clone())), true);
        manager.register(Box::new(stub("b", &["a"], order.clone())), true);

        let err = manager.start_all().await.unwrap_err();
        match err {
            FeatureError::CycleDetected { features } => assert_eq!(features, vec!["a".to_string(), "b".to_string()]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn init_failure_rolls_back_already_started_features() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let started_a = Arc::new(AtomicBool::new(false));
        let a = StubFeature { started: started_a.clone(), ..stub("a", &[], order.clone()) };
        let mut b = stub("b", &["a"], order.clone());
        b.fail_init = true;

        let mut manager = FeatureManager::default();
        manager.register(Box::new(a), true);
        manager.register(Box::new(b), true);

        let err = manager.start_all().await.unwrap_err();
        assert!(matches!(err, FeatureError::InitFailed { .. }));
        assert!(!started_a.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_stops_in_reverse_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut manager = FeatureManager::default();
        manager.register(Box::new(stub("a", &[], order.clone())), true);
        manager.register(Box::new(stub("b", &["a"], order.clone())), true);
        manager.start_all().await.unwrap();

        manager.shutdown().await;

        let reports = manager.reports();
        assert!(reports.iter().all(|r| r.state == FeatureState::Stopped));
    }
}
