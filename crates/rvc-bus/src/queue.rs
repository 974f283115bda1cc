//! A bounded, async, drop-oldest-on-overflow queue.
//!
//! Used for producer-side queues (CAN ingress, broadcaster fan-out) where
//! unbounded buffering is forbidden and a slow or stalled consumer must
//! never apply backpressure to the producer. Ordering is FIFO; overflow
//! drops the oldest unconsumed item and bumps a counter.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

/// Producer handle. Cheaply cloneable.
pub struct DropOldestSender<T> {
    inner: Arc<Inner<T>>,
}

/// Single consumer handle.
pub struct DropOldestReceiver<T> {
    inner: Arc<Inner<T>>,
}

pub fn channel<T>(capacity: usize) -> (DropOldestSender<T>, DropOldestReceiver<T>) {
    let inner = Arc::new(Inner {
        items: Mutex::new(VecDeque::with_capacity(capacity)),
        notify: Notify::new(),
        capacity,
        dropped: AtomicU64::new(0),
    });
    (DropOldestSender { inner: inner.clone() }, DropOldestReceiver { inner })
}

impl<T> Clone for DropOldestSender<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> DropOldestSender<T> {
    /// Push an item, dropping the oldest queued item if at capacity.
    pub fn push(&self, item: T) {
        let mut items = self.inner.items.lock();
        if items.len() >= self.inner.capacity {
            items.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        items.push_back(item);
        drop(items);
        self.inner.notify.notify_one();
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl<T> DropOldestReceiver<T> {
    pub async fn recv(&mut self) -> T {
        loop {
            if let Some(item) = self.inner.items.lock().pop_front() {
                return item;
            }
            self.inner.notify.notified().await;
        }
    }
}
