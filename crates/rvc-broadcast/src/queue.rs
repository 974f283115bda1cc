//! The per-subscription bounded event queue (§4.8).
//!
//! Drop-oldest with a counter, same policy as `rvc-bus`'s ingress queue,
//! extended with an explicit close: once the dropped count crosses
//! [`OVERFLOW_THRESHOLD`] the queue stops accepting pushes and its
//! receiver drains whatever is left before reporting end-of-stream.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Drop counts above this close the subscription; the client must reconnect.
pub const OVERFLOW_THRESHOLD: u64 = 1024;

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    closed: AtomicBool,
}

pub struct SubscriptionSender<T> {
    inner: Arc<Inner<T>>,
}

pub struct SubscriptionReceiver<T> {
    inner: Arc<Inner<T>>,
}

pub fn channel<T>(capacity: usize) -> (SubscriptionSender<T>, SubscriptionReceiver<T>) {
    let inner = Arc::new(Inner {
        items: Mutex::new(VecDeque::with_capacity(capacity)),
        notify: Notify::new(),
        capacity,
        dropped: AtomicU64::new(0),
        closed: AtomicBool::new(false),
    });
    (SubscriptionSender { inner: inner.clone() }, SubscriptionReceiver { inner })
}

impl<T> Clone for SubscriptionSender<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> SubscriptionSender<T> {
    /// Enqueue an event. Returns `false` once the subscription has
    /// overflowed past [`OVERFLOW_THRESHOLD`] and is closed.
    pub fn push(&self, item: T) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }

        let mut items = self.inner.items.lock();
        if items.len() >= self.inner.capacity {
            items.pop_front();
            let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped > OVERFLOW_THRESHOLD {
                self.inner.closed.store(true, Ordering::Release);
            }
        }
        items.push_back(item);
        drop(items);
        self.inner.notify.notify_one();
        true
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl<T> SubscriptionReceiver<T> {
    /// Waits for the next event, or returns `None` once the subscription
    /// is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.inner.items.lock().pop_front() {
                return Some(item);
            }
            if self.inner.closed.load(Ordering::Acquire) {
                return None;
            }
            self.inner.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drops_oldest_and_counts_overflow() {
        let (tx, mut rx) = channel::<u32>(2);
        tx.push(1);
        tx.push(2);
        tx.push(3);

        assert_eq!(tx.dropped_count(), 1);
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn closes_after_threshold_and_drains_then_ends() {
        let (tx, mut rx) = channel::<u32>(1);
        tx.push(0);
        for i in 0..=OVERFLOW_THRESHOLD {
            tx.push(i as u32);
        }

        assert!(tx.is_closed());
        // the single remaining slot still drains before end-of-stream.
        assert!(rx.recv().await.is_some());
        assert_eq!(rx.recv().await, None);
    }
}
