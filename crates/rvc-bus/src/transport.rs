//! CAN Transport (C6): one task per configured interface, bounded
//! ingress/egress, logical-to-physical interface routing, and
//! per-interface link statistics.

use crate::error::TransportError;
use crate::interface::{CanLike, RawFrame, SocketCanInterface};
use crate::queue::DropOldestSender;
use crate::stats::{InterfaceStats, InterfaceStatsSnapshot};
use rvc_codec::pgn_id::parse_can_id;
use rvc_codec::Frame;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

#[cfg(any(test, feature = "test-support"))]
use crate::mock::{MockCanInterface, MockHandle};

pub const DEFAULT_INBOUND_CAPACITY: usize = 4096;
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TransportConfig {
    /// logical name -> physical interface name (e.g. "house" -> "can0")
    pub interface_mappings: HashMap<String, String>,
    pub inbound_capacity: usize,
    pub outbound_capacity: usize,
    pub send_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            interface_mappings: HashMap::new(),
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

struct OutboundJob {
    frame: RawFrame,
    reply: oneshot::Sender<Result<(), TransportError>>,
}

struct InterfaceHandle {
    physical_name: String,
    outbound_tx: mpsc::Sender<OutboundJob>,
    stats: Arc<InterfaceStats>,
}

/// Handle to the running CAN Transport. Cheaply cloneable (an `Arc`
/// internally would be natural once wired into the composition root;
/// kept a plain owned handle here since the daemon holds exactly one).
pub struct Transport {
    interfaces: HashMap<String, InterfaceHandle>,
    shutdown_tx: watch::Sender<bool>,
}

impl Transport {
    /// Spawn one multiplexed ingress/egress task per configured logical
    /// interface against real hardware via socketcan.
    pub fn spawn(config: TransportConfig, inbound_tx: DropOldestSender<Frame>) -> Result<Self, TransportError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let origin = Instant::now();
        let mut interfaces = HashMap::with_capacity(config.interface_mappings.len());

        for (logical, physical) in &config.interface_mappings {
            let socket = SocketCanInterface::open(physical)?;
            let handle = spawn_interface_task(
                logical.clone(),
                physical.clone(),
                socket,
                inbound_tx.clone(),
                config.outbound_capacity,
                shutdown_rx.clone(),
                origin,
            );
            interfaces.insert(logical.clone(), handle);
        }

        Ok(Self { interfaces, shutdown_tx })
    }

    /// Spawn against in-memory mock interfaces, for tests.
    #[cfg(any(test, feature = "test-support"))]
    pub fn spawn_mock(
        config: TransportConfig,
        inbound_tx: DropOldestSender<Frame>,
    ) -> (Self, HashMap<String, MockHandle>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let origin = Instant::now();
        let mut interfaces = HashMap::with_capacity(config.interface_mappings.len());
        let mut mock_handles = HashMap::with_capacity(config.interface_mappings.len());

        for (logical, physical) in &config.interface_mappings {
            let (mock, mock_handle) = MockCanInterface::new();
            let handle = spawn_interface_task(
                logical.clone(),
                physical.clone(),
                mock,
                inbound_tx.clone(),
                config.outbound_capacity,
                shutdown_rx.clone(),
                origin,
            );
            interfaces.insert(logical.clone(), handle);
            mock_handles.insert(logical.clone(), mock_handle);
        }

        (Self { interfaces, shutdown_tx }, mock_handles)
    }

    /// Submit one frame for transmission on the logical interface named
    /// by `frame.interface`. Blocks (with timeout) if the egress queue is
    /// full; fails immediately if the interface is unknown or marked down.
    pub async fn send(&self, frame: Frame, timeout: Duration) -> Result<(), TransportError> {
        let handle = self
            .interfaces
            .get(&frame.interface)
            .ok_or_else(|| TransportError::UnknownInterface(frame.interface.clone()))?;

        if !handle.stats.up.load(Ordering::Relaxed) {
            return Err(TransportError::InterfaceDown(frame.interface.clone()));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let job = OutboundJob {
            frame: RawFrame { arbitration_id: frame.arbitration_id, data: frame.data },
            reply: reply_tx,
        };

        tokio::time::timeout(timeout, handle.outbound_tx.send(job))
            .await
            .map_err(|_| TransportError::TxTimeout(frame.interface.clone()))?
            .map_err(|_| TransportError::TxFailed {
                interface: frame.interface.clone(),
                reason: "egress task stopped".to_string(),
            })?;

        tokio::time::timeout(timeout, reply_rx)
            .await
            .map_err(|_| TransportError::TxTimeout(frame.interface.clone()))?
            .map_err(|_| TransportError::TxFailed {
                interface: frame.interface.clone(),
                reason: "egress task dropped reply".to_string(),
            })?
    }

    pub fn interface_names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    pub fn statistics(&self) -> Vec<InterfaceStatsSnapshot> {
        self.interfaces
            .iter()
            .map(|(logical, handle)| handle.stats.snapshot(logical, &handle.physical_name))
            .collect()
    }

    pub fn is_up(&self, logical: &str) -> Option<bool> {
        self.interfaces.get(logical).map(|h| h.stats.up.load(Ordering::Relaxed))
    }

    /// Signal all interface tasks to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

fn spawn_interface_task<I: CanLike>(
    logical: String,
    physical: String,
    mut iface: I,
    inbound_tx: DropOldestSender<Frame>,
    outbound_capacity: usize,
    mut shutdown_rx: watch::Receiver<bool>,
    origin: Instant,
) -> InterfaceHandle {
    let stats = Arc::new(InterfaceStats::new());
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundJob>(outbound_capacity);
    let task_stats = stats.clone();
    let task_logical = logical.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(interface = %task_logical, "transport task stopping");
                        break;
                    }
                }

                job = outbound_rx.recv() => {
                    let Some(job) = job else { break };
                    let len = job.frame.data.len();
                    let result = iface.send_frame(job.frame).await;
                    match &result {
                        Ok(()) => task_stats.record_tx(len),
                        Err(err) => {
                            warn!(interface = %task_logical, error = %err, "outbound send failed");
                            task_stats.tx_errors.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    let _ = job.reply.send(result);
                }

                received = iface.recv_frame() => {
                    match received {
                        Ok(raw) => {
                            let pgn = parse_can_id(raw.arbitration_id).pgn;
                            task_stats.record_rx(raw.data.len(), pgn);
                            let timestamp_ns = origin.elapsed().as_nanos() as u64;
                            let frame = Frame::new(raw.arbitration_id, raw.data, task_logical.clone(), timestamp_ns);
                            inbound_tx.push(frame);
                        }
                        Err(err) => {
                            warn!(interface = %task_logical, error = %err, "inbound read failed");
                            task_stats.rx_errors.fetch_add(1, Ordering::Relaxed);
                            task_stats.bus_errors.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
        }
    });

    InterfaceHandle { physical_name: physical, outbound_tx, stats }
}
