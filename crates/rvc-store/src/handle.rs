//! [`EntityStoreHandle`]: the cloneable, single-writer-respecting public
//! face of the Entity Store. All mutations are serialized through one
//! actor task's inbox; reads and control submission are regular async
//! calls that talk to that actor (for reads) or to CAN Transport
//! directly (for frame submission, which needs no serialization beyond
//! what Transport already provides per interface).

use crate::entity::{EntitySnapshot, HistoryEntry};
use crate::error::{ErrorCode, StoreError};
use crate::operation::{BulkOperationResult, BulkOptions, OperationResult};
use crate::store::{EntityDelta, EntityStore};
use chrono::Utc;
use rvc_codec::{encode, ControlCommand, CurrentState};
use rvc_mapping::{DeviceType, Mapping};
use rvc_spec::Catalog;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{error, warn};

const STORE_INBOX_CAPACITY: usize = 2048;
const DELTA_QUEUE_CAPACITY: usize = 4096;
const STALENESS_TICK: Duration = Duration::from_secs(1);

pub(crate) enum StoreMsg {
    ApplyDecoded { binding: Box<rvc_mapping::DeviceBinding>, signals: HashMap<String, rvc_codec::decode::SignalValue>, timestamp_ns: u64 },
    Snapshot { entity_id: String, reply: oneshot::Sender<Option<EntitySnapshot>> },
    SnapshotAll { device_type: Option<DeviceType>, area: Option<String>, reply: oneshot::Sender<Vec<EntitySnapshot>> },
    History { entity_id: String, limit: Option<usize>, since_ns: Option<u64>, reply: oneshot::Sender<Option<Vec<HistoryEntry>>> },
}

/// Cloneable handle to the running Entity Store actor.
#[derive(Clone)]
pub struct EntityStoreHandle {
    inbox: mpsc::Sender<StoreMsg>,
    catalog: Arc<Catalog>,
    mapping: Arc<Mapping>,
    transport: Arc<rvc_bus::Transport>,
    source_address: u8,
    send_timeout: Duration,
    out_of_order_drops: Arc<AtomicU64>,
}

impl EntityStoreHandle {
    /// Spawn the Entity Store actor. Returns the handle plus the
    /// drop-oldest receiver of [`EntityDelta`] events for the
    /// Broadcaster to consume.
    pub fn spawn(
        catalog: Arc<Catalog>,
        mapping: Arc<Mapping>,
        transport: Arc<rvc_bus::Transport>,
        source_address: u8,
        send_timeout: Duration,
    ) -> (Self, rvc_bus::DropOldestReceiver<EntityDelta>) {
        let (inbox_tx, mut inbox_rx) = mpsc::channel(STORE_INBOX_CAPACITY);
        let (delta_tx, delta_rx) = rvc_bus::channel(DELTA_QUEUE_CAPACITY);
        let out_of_order_drops = Arc::new(AtomicU64::new(0));
        let out_of_order_drops_task = out_of_order_drops.clone();

        let origin_instant = Instant::now();
        let origin_wall = Utc::now();

        tokio::spawn(async move {
            let mut store = EntityStore::new(origin_wall);
            let mut ticker = tokio::time::interval(STALENESS_TICK);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now_ns = origin_instant.elapsed().as_nanos() as u64;
                        for delta in store.scan_staleness(now_ns) {
                            delta_tx.push(delta);
                        }
                    }
                    msg = inbox_rx.recv() => {
                        let Some(msg) = msg else { break };
                        match msg {
                            StoreMsg::ApplyDecoded { binding, signals, timestamp_ns } => {
                                if let Some(delta) = store.apply_decoded(&binding, signals, timestamp_ns) {
                                    delta_tx.push(delta);
                                }
                                out_of_order_drops_task.store(store.out_of_order_drops, Ordering::Relaxed);
                            }
                            StoreMsg::Snapshot { entity_id, reply } => {
                                let _ = reply.send(store.snapshot(&entity_id));
                            }
                            StoreMsg::SnapshotAll { device_type, area, reply } => {
                                let _ = reply.send(store.snapshot_all(device_type, area.as_deref()));
                            }
                            StoreMsg::History { entity_id, limit, since_ns, reply } => {
                                let _ = reply.send(store.history(&entity_id, limit, since_ns));
                            }
                        }
                    }
                }
            }
        });

        (
            Self {
                inbox: inbox_tx,
                catalog,
                mapping,
                transport,
                source_address,
                send_timeout,
                out_of_order_drops,
            },
            delta_rx,
        )
    }

    /// Apply a decoded frame. Fire-and-forget from the Dispatcher's point
    /// of view; blocks briefly if the actor's inbox is momentarily full.
    pub async fn apply_decoded(
        &self,
        binding: rvc_mapping::DeviceBinding,
        signals: HashMap<String, rvc_codec::decode::SignalValue>,
        timestamp_ns: u64,
    ) {
        let msg = StoreMsg::ApplyDecoded { binding: Box::new(binding), signals, timestamp_ns };
        if self.inbox.send(msg).await.is_err() {
            warn!("entity store actor is gone, dropping decoded update");
        }
    }

    pub fn out_of_order_drop_count(&self) -> u64 {
        self.out_of_order_drops.load(Ordering::Relaxed)
    }

    pub async fn snapshot(&self, entity_id: &str) -> Option<EntitySnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inbox.send(StoreMsg::Snapshot { entity_id: entity_id.to_string(), reply: reply_tx }).await.ok()?;
        reply_rx.await.ok().flatten()
    }

    pub async fn snapshot_all(&self, device_type: Option<DeviceType>, area: Option<String>) -> Vec<EntitySnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.inbox.send(StoreMsg::SnapshotAll { device_type, area, reply: reply_tx }).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    pub async fn history(&self, entity_id: &str, limit: Option<usize>, since_ns: Option<u64>) -> Option<Vec<HistoryEntry>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inbox
            .send(StoreMsg::History { entity_id: entity_id.to_string(), limit, since_ns, reply: reply_tx })
            .await
            .ok()?;
        reply_rx.await.ok().flatten()
    }

    /// Encode and submit a single control command (`POST /entities/{id}/control`).
    pub async fn control(&self, entity_id: &str, command: &ControlCommand) -> Result<(), StoreError> {
        let binding = self.mapping.binding_for_entity(entity_id).ok_or_else(|| StoreError::UnknownEntity(entity_id.to_string()))?;
        let snapshot = self.snapshot(entity_id).await;
        let current = snapshot.map(|s| CurrentState { available: s.available, state: s.state });

        let frames = encode(binding, &self.catalog, current.as_ref(), command, self.source_address)?;
        for frame in frames {
            self.transport.send(frame, self.send_timeout).await?;
        }
        Ok(())
    }

    /// Encode and submit the same command against many entities with
    /// bounded parallelism (`POST /entities/bulk-control`).
    pub async fn apply_bulk(&self, entity_ids: &[String], command: &ControlCommand, options: &BulkOptions) -> BulkOperationResult {
        let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
        let abort = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let started = Instant::now();

        let futures = entity_ids.iter().cloned().map(|entity_id| {
            let semaphore = semaphore.clone();
            let abort = abort.clone();
            let handle = self.clone();
            let command = command.clone();
            let ignore_errors = options.ignore_errors;
            let per_op_timeout = Duration::from_secs(options.timeout_seconds);

            async move {
                if !ignore_errors && abort.load(Ordering::Relaxed) {
                    return OperationResult {
                        entity_id,
                        status: crate::operation::OperationStatus::Failed,
                        error_message: Some("not attempted: an earlier entity failed and ignore_errors is false".to_string()),
                        error_code: None,
                        execution_time_ms: 0,
                    };
                }

                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let op_started = Instant::now();
                let outcome = tokio::time::timeout(per_op_timeout, handle.control(&entity_id, &command)).await;
                let execution_time_ms = op_started.elapsed().as_millis() as u64;

                match outcome {
                    Ok(Ok(())) => OperationResult::success(entity_id, execution_time_ms),
                    Ok(Err(err)) => {
                        if !ignore_errors {
                            abort.store(true, Ordering::Relaxed);
                        }
                        let code = ErrorCode::from(&err);
                        error!(entity_id, error = %err, "bulk control entity failed");
                        OperationResult::failed(entity_id, code, err.to_string(), execution_time_ms)
                    }
                    Err(_elapsed) => {
                        if !ignore_errors {
                            abort.store(true, Ordering::Relaxed);
                        }
                        OperationResult::timeout(entity_id, execution_time_ms)
                    }
                }
            }
        });

        let results: Vec<OperationResult> = futures::future::join_all(futures).await;
        let success_count = results.iter().filter(|r| r.status == crate::operation::OperationStatus::Success).count();
        let failed_count = results.len() - success_count;

        BulkOperationResult {
            operation_id: uuid::Uuid::new_v4(),
            total_count: results.len(),
            success_count,
            failed_count,
            results,
            total_execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}
