//! Lightweight [`Feature`] wrappers around the pipeline objects the
//! composition root constructs eagerly. Most of this daemon's
//! subsystems are actors that start running the moment they're
//! spawned; these wrappers exist so the Feature Manager can report
//! their lifecycle/health through `GET /features` and order the one
//! stage that genuinely benefits from being started last: the HTTP
//! listener.

use async_trait::async_trait;
use axum::Router;
use rvc_bus::Transport;
use rvc_broadcast::BroadcasterHandle;
use rvc_diag::DiagHandle;
use rvc_features::{Feature, FeatureError, HealthState};
use rvc_store::EntityStoreHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Wraps the already-running CAN Transport. Its only real lifecycle
/// hook is `stop`, which closes every interface task.
pub struct TransportFeature {
    dependencies: Vec<String>,
    transport: Arc<Transport>,
    logical_interfaces: Vec<String>,
}

impl TransportFeature {
    pub fn new(transport: Arc<Transport>) -> Self {
        let logical_interfaces = transport.interface_names().map(str::to_string).collect();
        Self { dependencies: Vec::new(), transport, logical_interfaces }
    }
}

#[async_trait]
impl Feature for TransportFeature {
    fn name(&self) -> &str {
        "transport"
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn init(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), FeatureError> {
        self.transport.shutdown();
        Ok(())
    }

    async fn health(&self) -> HealthState {
        let up_count = self.logical_interfaces.iter().filter(|name| self.transport.is_up(name).unwrap_or(false)).count();
        if self.logical_interfaces.is_empty() {
            HealthState::Unknown
        } else if up_count == self.logical_interfaces.len() {
            HealthState::Healthy
        } else if up_count == 0 {
            HealthState::Failed
        } else {
            HealthState::Degraded
        }
    }
}

/// Wraps the Entity Store actor. It has no explicit teardown: it runs
/// for the process lifetime and is dropped along with the daemon.
pub struct EntityStoreFeature {
    dependencies: Vec<String>,
    store: EntityStoreHandle,
}

impl EntityStoreFeature {
    pub fn new(store: EntityStoreHandle) -> Self {
        Self { dependencies: vec!["transport".to_string()], store }
    }
}

#[async_trait]
impl Feature for EntityStoreFeature {
    fn name(&self) -> &str {
        "entity_store"
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn init(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn health(&self) -> HealthState {
        if self.store.out_of_order_drop_count() > 0 {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }
}

pub struct BroadcasterFeature {
    dependencies: Vec<String>,
    broadcaster: BroadcasterHandle,
}

impl BroadcasterFeature {
    pub fn new(broadcaster: BroadcasterHandle) -> Self {
        Self { dependencies: vec!["entity_store".to_string()], broadcaster }
    }
}

#[async_trait]
impl Feature for BroadcasterFeature {
    fn name(&self) -> &str {
        "broadcaster"
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn init(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn health(&self) -> HealthState {
        let _ = &self.broadcaster;
        HealthState::Healthy
    }
}

pub struct DiagFeature {
    dependencies: Vec<String>,
    diag: DiagHandle,
}

impl DiagFeature {
    pub fn new(diag: DiagHandle) -> Self {
        Self { dependencies: vec!["transport".to_string()], diag }
    }
}

#[async_trait]
impl Feature for DiagFeature {
    fn name(&self) -> &str {
        "diag"
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn init(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn health(&self) -> HealthState {
        let _ = &self.diag;
        HealthState::Healthy
    }
}

/// Wraps the Dispatcher's ingress task. Unlike the actor handles
/// above, the composition root holds a `JoinHandle` for this one
/// because it's a plain loop rather than a request/reply actor, so
/// `stop` can actually cancel it.
pub struct DispatcherFeature {
    dependencies: Vec<String>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DispatcherFeature {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { dependencies: vec!["entity_store".to_string(), "broadcaster".to_string(), "diag".to_string()], handle: std::sync::Mutex::new(Some(handle)) }
    }
}

#[async_trait]
impl Feature for DispatcherFeature {
    fn name(&self) -> &str {
        "dispatcher"
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn init(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), FeatureError> {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
        Ok(())
    }

    async fn health(&self) -> HealthState {
        match self.handle.lock().unwrap().as_ref() {
            Some(handle) if handle.is_finished() => HealthState::Failed,
            Some(_) => HealthState::Healthy,
            None => HealthState::Failed,
        }
    }
}

/// The HTTP/WebSocket listener. Unlike the wrappers above, this one
/// does real work in `start`/`stop`: it binds the socket only once
/// every dependency is running, and tears it down with a graceful
/// shutdown signal rather than an abort.
pub struct HttpFeature {
    dependencies: Vec<String>,
    addr: SocketAddr,
    router: std::sync::Mutex<Option<Router>>,
    running: std::sync::Mutex<Option<(JoinHandle<()>, oneshot::Sender<()>)>>,
}

impl HttpFeature {
    pub fn new(addr: SocketAddr, router: Router) -> Self {
        Self {
            dependencies: vec!["dispatcher".to_string()],
            addr,
            router: std::sync::Mutex::new(Some(router)),
            running: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl Feature for HttpFeature {
    fn name(&self) -> &str {
        "http"
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn init(&self) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), FeatureError> {
        let router = self
            .router
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| FeatureError::StartFailed { name: self.name().to_string(), reason: "http feature already started".to_string() })?;

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|err| FeatureError::StartFailed { name: self.name().to_string(), reason: err.to_string() })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let addr = self.addr;
        let join = tokio::spawn(async move {
            info!(%addr, "http listener bound");
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                })
                .await;
            if let Err(err) = result {
                warn!(%err, "http listener exited with error");
            }
        });

        *self.running.lock().unwrap() = Some((join, shutdown_tx));
        Ok(())
    }

    async fn stop(&self) -> Result<(), FeatureError> {
        let Some((join, shutdown_tx)) = self.running.lock().unwrap().take() else {
            return Ok(());
        };
        let _ = shutdown_tx.send(());
        let _ = join.await;
        Ok(())
    }

    async fn health(&self) -> HealthState {
        match self.running.lock().unwrap().as_ref() {
            Some((join, _)) if join.is_finished() => HealthState::Failed,
            Some(_) => HealthState::Healthy,
            None => HealthState::Unknown,
        }
    }
}
