//! Per-interface link-layer statistics (§4.6).

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct InterfaceStats {
    pub rx_frames: AtomicU64,
    pub rx_bytes: AtomicU64,
    pub tx_frames: AtomicU64,
    pub tx_bytes: AtomicU64,
    pub rx_errors: AtomicU64,
    pub tx_errors: AtomicU64,
    pub bus_errors: AtomicU64,
    pub restarts: AtomicU64,
    pub input_overflow: AtomicU64,
    pub up: AtomicBool,
    last_pgns: RwLock<HashSet<u32>>,
}

/// Read-only rendering of [`InterfaceStats`], suitable for the
/// `GET /can/statistics` boundary.
#[derive(Clone, Debug, Serialize)]
pub struct InterfaceStatsSnapshot {
    pub logical_name: String,
    pub physical_name: String,
    pub up: bool,
    pub rx_frames: u64,
    pub rx_bytes: u64,
    pub tx_frames: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub bus_errors: u64,
    pub restarts: u64,
    pub input_overflow: u64,
    pub last_observed_pgns: Vec<u32>,
}

impl InterfaceStats {
    pub fn new() -> Self {
        let stats = Self::default();
        stats.up.store(true, Ordering::Relaxed);
        stats
    }

    pub fn record_rx(&self, byte_len: usize, pgn: u32) {
        self.rx_frames.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(byte_len as u64, Ordering::Relaxed);
        self.last_pgns.write().insert(pgn);
    }

    pub fn record_tx(&self, byte_len: usize) {
        self.tx_frames.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes.fetch_add(byte_len as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, logical_name: &str, physical_name: &str) -> InterfaceStatsSnapshot {
        InterfaceStatsSnapshot {
            logical_name: logical_name.to_string(),
            physical_name: physical_name.to_string(),
            up: self.up.load(Ordering::Relaxed),
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            bus_errors: self.bus_errors.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            input_overflow: self.input_overflow.load(Ordering::Relaxed),
            last_observed_pgns: self.last_pgns.read().iter().copied().collect(),
        }
    }
}
