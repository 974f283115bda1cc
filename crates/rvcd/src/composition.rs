//! The composition root (§9 design note): constructs every pipeline
//! object once, in dependency order, and threads the resulting handles
//! through the Dispatcher, the HTTP router, and the Feature Manager.
//! The Feature Manager does not construct anything itself — it wraps
//! already-running handles for lifecycle reporting and ordered
//! shutdown, with the one exception (`HttpFeature`) that genuinely
//! benefits from being started last.

use crate::config::Config;
use crate::dispatcher::{Dispatcher, OBSERVED_TABLE_CAPACITY};
use crate::error::RvcdError;
use crate::features::{BroadcasterFeature, DiagFeature, DispatcherFeature, EntityStoreFeature, HttpFeature, TransportFeature};
use crate::http::{build_router, AppState};
use rvc_broadcast::{BroadcastEvent, BroadcasterHandle};
use rvc_bus::{Transport, TransportConfig};
use rvc_diag::{DecoderCapability, DiagHandle, FireflyDecoder, J1939Decoder, SpartanK2Decoder};
use rvc_features::FeatureManager;
use rvc_mapping::observed::ObservedTable;
use rvc_mapping::Mapping;
use rvc_spec::Catalog;
use rvc_store::EntityStoreHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

pub struct Daemon {
    feature_manager: Arc<Mutex<FeatureManager>>,
    server_addr: SocketAddr,
}

impl Daemon {
    pub async fn new(config: &Config) -> Result<Self, RvcdError> {
        let catalog = Arc::new(Catalog::load_from_path(&config.catalog_path)?);
        let mapping = Arc::new(Mapping::load_from_path(&config.mapping_path, &catalog)?);

        let interface_mappings = config.interface_mappings().map_err(RvcdError::Config)?;
        let transport_config = TransportConfig { interface_mappings, ..TransportConfig::default() };

        let (inbound_tx, inbound_rx) = rvc_bus::channel(rvc_bus::DEFAULT_INBOUND_CAPACITY);
        let transport = Arc::new(Transport::spawn(transport_config, inbound_tx)?);

        let command_timeout = Duration::from_secs(config.command_timeout_secs);
        let (entity_store, delta_rx) =
            EntityStoreHandle::spawn(catalog.clone(), mapping.clone(), transport.clone(), config.can_source_address, command_timeout);

        let broadcaster = BroadcasterHandle::spawn();
        let diag = DiagHandle::spawn();

        spawn_delta_forwarder(delta_rx, broadcaster.clone());

        let sibling_decoders: Vec<Box<dyn DecoderCapability>> = vec![Box::new(J1939Decoder), Box::new(FireflyDecoder), Box::new(SpartanK2Decoder)];
        let unmapped = Arc::new(ObservedTable::new(OBSERVED_TABLE_CAPACITY));
        let unknown_pgns = Arc::new(ObservedTable::new(OBSERVED_TABLE_CAPACITY));

        let dispatcher = Dispatcher::new(
            catalog,
            mapping,
            entity_store.clone(),
            broadcaster.clone(),
            diag.clone(),
            sibling_decoders,
            unmapped.clone(),
            unknown_pgns.clone(),
        );
        let dispatcher_handle = tokio::spawn(dispatcher.run(inbound_rx));

        let app_state = AppState {
            entity_store: entity_store.clone(),
            broadcaster: broadcaster.clone(),
            diag: diag.clone(),
            transport: transport.clone(),
            feature_manager: Arc::new(Mutex::new(FeatureManager::default())),
            unmapped,
            unknown_pgns,
            default_bulk_concurrency: config.bulk_concurrency,
            default_bulk_timeout_secs: config.bulk_timeout_secs,
        };

        let server_addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
            .parse()
            .map_err(|err| RvcdError::Config(anyhow::anyhow!("invalid server bind address: {err}")))?;
        let router = build_router(app_state.clone());

        let mut manager = FeatureManager::new(Duration::from_secs(config.feature_stop_timeout_secs));
        let disabled: std::collections::HashSet<&str> = config.disabled_features.iter().map(String::as_str).collect();

        manager.register(Box::new(TransportFeature::new(transport)), !disabled.contains("transport"));
        manager.register(Box::new(EntityStoreFeature::new(entity_store)), !disabled.contains("entity_store"));
        manager.register(Box::new(BroadcasterFeature::new(broadcaster)), !disabled.contains("broadcaster"));
        manager.register(Box::new(DiagFeature::new(diag)), !disabled.contains("diag"));
        manager.register(Box::new(DispatcherFeature::new(dispatcher_handle)), !disabled.contains("dispatcher"));
        manager.register(Box::new(HttpFeature::new(server_addr, router)), !disabled.contains("http"));

        manager.start_all().await?;

        *app_state.feature_manager.lock().await = manager;
        let feature_manager = app_state.feature_manager.clone();

        Ok(Self { feature_manager, server_addr })
    }

    /// Block until a shutdown signal arrives, then stop every feature
    /// in reverse dependency order.
    pub async fn run(self) -> Result<(), RvcdError> {
        info!(addr = %self.server_addr, "rvcd running");
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received");
        self.shutdown().await;
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.feature_manager.lock().await.shutdown().await;
    }
}

fn spawn_delta_forwarder(mut delta_rx: rvc_bus::DropOldestReceiver<rvc_store::EntityDelta>, broadcaster: BroadcasterHandle) {
    tokio::spawn(async move {
        loop {
            let delta = delta_rx.recv().await;
            broadcaster.publish(BroadcastEvent::EntityDelta(delta));
        }
    });
}
