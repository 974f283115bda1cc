//! Deterministic in-memory CAN interface for tests, behind the
//! `test-support` feature. A `VecDeque`-backed fake bus: pushes become
//! inbound frames, sends are captured for assertions, no real hardware
//! or root privileges required.

use crate::error::TransportError;
use crate::interface::{CanLike, RawFrame};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct MockHandle {
    inbound: Arc<Mutex<VecDeque<RawFrame>>>,
    inbound_notify: Arc<Notify>,
    outbound: Arc<Mutex<Vec<RawFrame>>>,
}

impl MockHandle {
    pub fn push_inbound(&self, frame: RawFrame) {
        self.inbound.lock().push_back(frame);
        self.inbound_notify.notify_one();
    }

    pub fn drain_outbound(&self) -> Vec<RawFrame> {
        std::mem::take(&mut self.outbound.lock())
    }
}

pub struct MockCanInterface {
    inbound: Arc<Mutex<VecDeque<RawFrame>>>,
    inbound_notify: Arc<Notify>,
    outbound: Arc<Mutex<Vec<RawFrame>>>,
}

impl MockCanInterface {
    pub fn new() -> (Self, MockHandle) {
        let inbound = Arc::new(Mutex::new(VecDeque::new()));
        let inbound_notify = Arc::new(Notify::new());
        let outbound = Arc::new(Mutex::new(Vec::new()));
        let handle = MockHandle {
            inbound: inbound.clone(),
            inbound_notify: inbound_notify.clone(),
            outbound: outbound.clone(),
        };
        (Self { inbound, inbound_notify, outbound }, handle)
    }
}

impl CanLike for MockCanInterface {
    async fn recv_frame(&mut self) -> Result<RawFrame, TransportError> {
        loop {
            if let Some(frame) = self.inbound.lock().pop_front() {
                return Ok(frame);
            }
            self.inbound_notify.notified().await;
        }
    }

    async fn send_frame(&mut self, frame: RawFrame) -> Result<(), TransportError> {
        self.outbound.lock().push(frame);
        Ok(())
    }
}
