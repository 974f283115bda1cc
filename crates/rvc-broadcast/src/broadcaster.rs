//! The Broadcaster (C8) actor: holds the subscription set, fans
//! published events out to matching subscriptions, and enforces the
//! per-subscription overflow-close policy.

use crate::event::BroadcastEvent;
use crate::filter::SubscriptionFilter;
use crate::queue::{self, SubscriptionReceiver, SubscriptionSender};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use uuid::Uuid;

const DEFAULT_INBOX_CAPACITY: usize = 256;
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 4096;
pub const DEFAULT_SUBSCRIPTION_QUEUE_DEPTH: usize = 256;

enum ControlMsg {
    Subscribe { filter: SubscriptionFilter, reply: oneshot::Sender<(Uuid, SubscriptionReceiver<BroadcastEvent>)> },
    Unsubscribe { id: Uuid },
    SubscriptionCount { reply: oneshot::Sender<usize> },
}

struct Subscription {
    filter: SubscriptionFilter,
    sender: SubscriptionSender<BroadcastEvent>,
}

/// Cloneable handle to the running Broadcaster actor.
#[derive(Clone)]
pub struct BroadcasterHandle {
    control: mpsc::Sender<ControlMsg>,
    events: rvc_bus::DropOldestSender<BroadcastEvent>,
}

impl BroadcasterHandle {
    pub fn spawn() -> Self {
        let (control_tx, mut control_rx) = mpsc::channel(DEFAULT_INBOX_CAPACITY);
        let (event_tx, mut event_rx) = rvc_bus::channel(DEFAULT_EVENT_QUEUE_CAPACITY);

        tokio::spawn(async move {
            let mut subscriptions: HashMap<Uuid, Subscription> = HashMap::new();

            loop {
                tokio::select! {
                    event = event_rx.recv() => {
                        subscriptions.retain(|id, sub| {
                            if sub.sender.is_closed() {
                                warn!(subscription = %id, "subscription closed after overflow (SUBSCRIPTION_OVERFLOW)");
                                return false;
                            }
                            if sub.filter.matches(&event) {
                                sub.sender.push(event.clone());
                            }
                            true
                        });
                    }
                    msg = control_rx.recv() => {
                        let Some(msg) = msg else { break };
                        match msg {
                            ControlMsg::Subscribe { filter, reply } => {
                                let id = Uuid::new_v4();
                                let (tx, rx) = queue::channel(DEFAULT_SUBSCRIPTION_QUEUE_DEPTH);
                                subscriptions.insert(id, Subscription { filter, sender: tx });
                                let _ = reply.send((id, rx));
                            }
                            ControlMsg::Unsubscribe { id } => {
                                subscriptions.remove(&id);
                            }
                            ControlMsg::SubscriptionCount { reply } => {
                                let _ = reply.send(subscriptions.len());
                            }
                        }
                    }
                }
            }
        });

        Self { control: control_tx, events: event_tx }
    }

    /// Register a new subscription; returns its id and event receiver.
    pub async fn subscribe(&self, filter: SubscriptionFilter) -> (Uuid, SubscriptionReceiver<BroadcastEvent>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control.send(ControlMsg::Subscribe { filter, reply: reply_tx }).await.expect("broadcaster actor running");
        reply_rx.await.expect("broadcaster actor replies")
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        let _ = self.control.send(ControlMsg::Unsubscribe { id }).await;
    }

    pub async fn subscription_count(&self) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.control.send(ControlMsg::SubscriptionCount { reply: reply_tx }).await.is_err() {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    /// Publish an event for fan-out. Never blocks the caller: the event
    /// inbox itself is a drop-oldest queue so a slow broadcaster task
    /// never applies backpressure to the Dispatcher.
    pub fn publish(&self, event: BroadcastEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw_frame(id: u32) -> BroadcastEvent {
        BroadcastEvent::RawFrame { interface: "house".into(), arbitration_id: id, payload: vec![1, 2], timestamp: Utc::now() }
    }

    #[tokio::test]
    async fn subscriber_receives_matching_events() {
        let broadcaster = BroadcasterHandle::spawn();
        let (_, mut rx) = broadcaster.subscribe(SubscriptionFilter { raw_can: true, ..Default::default() }).await;

        broadcaster.publish(raw_frame(0x100));
        tokio::task::yield_now().await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, BroadcastEvent::RawFrame { arbitration_id: 0x100, .. }));
    }

    #[tokio::test]
    async fn unmatched_filter_receives_nothing() {
        let broadcaster = BroadcasterHandle::spawn();
        let (_, mut rx) = broadcaster.subscribe(SubscriptionFilter::default()).await;

        broadcaster.publish(raw_frame(0x200));
        tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv()).await.expect_err("no event should arrive");
    }

    #[tokio::test]
    async fn unsubscribe_removes_from_count() {
        let broadcaster = BroadcasterHandle::spawn();
        let (id, _rx) = broadcaster.subscribe(SubscriptionFilter::default()).await;
        assert_eq!(broadcaster.subscription_count().await, 1);

        broadcaster.unsubscribe(id).await;
        tokio::task::yield_now().await;
        assert_eq!(broadcaster.subscription_count().await, 0);
    }
}
