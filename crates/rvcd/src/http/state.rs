//! Shared state threaded through every axum handler (§6).

use rvc_broadcast::BroadcasterHandle;
use rvc_bus::Transport;
use rvc_diag::DiagHandle;
use rvc_features::FeatureManager;
use rvc_mapping::observed::ObservedTable;
use rvc_store::EntityStoreHandle;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cheaply clonable: every field is already a handle or an `Arc`.
/// `FeatureManager` is the one piece of genuinely mutable state
/// (`refresh_health`/`shutdown` need `&mut self`), so it's the only
/// field behind a lock.
#[derive(Clone)]
pub struct AppState {
    pub entity_store: EntityStoreHandle,
    pub broadcaster: BroadcasterHandle,
    pub diag: DiagHandle,
    pub transport: Arc<Transport>,
    pub feature_manager: Arc<Mutex<FeatureManager>>,
    pub unmapped: Arc<ObservedTable<(u32, u8)>>,
    pub unknown_pgns: Arc<ObservedTable<u32>>,
    /// Configured defaults (§4.5) for bulk-control requests that don't
    /// override them.
    pub default_bulk_concurrency: usize,
    pub default_bulk_timeout_secs: u64,
}
