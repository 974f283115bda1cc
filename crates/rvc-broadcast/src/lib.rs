//! Broadcaster (C8)
//!
//! Single-writer actor owning the subscription set. Publishes fan out
//! to every subscription whose filter matches; each subscription has
//! its own bounded, drop-oldest queue that self-closes past a drop
//! threshold (§4.8).

pub mod broadcaster;
pub mod event;
pub mod filter;
pub mod queue;

pub use broadcaster::{BroadcasterHandle, DEFAULT_SUBSCRIPTION_QUEUE_DEPTH};
pub use event::{BroadcastEvent, WireEvent};
pub use filter::SubscriptionFilter;
pub use queue::{SubscriptionReceiver, SubscriptionSender, OVERFLOW_THRESHOLD};
