//! VeilNet Event Bus
//!
//! A topic-keyed publish/subscribe broker. Fan-out is synchronous: a
//! publish invokes every current subscriber of the event's topic before
//! returning, FIFO with respect to publish order on that topic. Handlers
//! must therefore be cheap; anything long-running belongs on a spawned
//! task. A panicking handler is caught and logged; it never blocks
//! delivery to the remaining subscribers.
//!
//! The bus is an ordinary value passed by reference through constructor
//! dependencies, never process-global state.

mod recording;
pub mod trace;

pub use recording::RecordingBus;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::error;

use veilnet_core::event::{AppEvent, Topic};

/// Anything that can publish application events.
///
/// Components take `Arc<dyn Publisher>` so tests can substitute a
/// recording implementation.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: AppEvent);
}

type Handler = Arc<dyn Fn(&AppEvent) + Send + Sync>;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId {
    topic: Topic,
    id: u64,
}

struct TopicEntry {
    handlers: Vec<(u64, Handler)>,
    /// Serializes delivery so per-topic FIFO holds even with concurrent
    /// publishers. Handlers must not publish to their own topic.
    delivery: Arc<Mutex<()>>,
}

impl TopicEntry {
    fn new() -> Self {
        Self {
            handlers: Vec::new(),
            delivery: Arc::new(Mutex::new(())),
        }
    }
}

/// The broker.
#[derive(Default)]
pub struct EventBus {
    topics: Mutex<HashMap<Topic, TopicEntry>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for a topic. Returns a token for
    /// [`EventBus::unsubscribe`].
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.topics.lock().expect("bus registry poisoned");
        topics
            .entry(topic)
            .or_insert_with(TopicEntry::new)
            .handlers
            .push((id, Arc::new(handler)));
        SubscriptionId { topic, id }
    }

    /// Remove a previously registered handler. Unknown tokens are ignored.
    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        let mut topics = self.topics.lock().expect("bus registry poisoned");
        if let Some(entry) = topics.get_mut(&subscription.topic) {
            entry.handlers.retain(|(id, _)| *id != subscription.id);
        }
    }

    /// Deliver an event to every current subscriber of its topic.
    pub fn publish(&self, event: AppEvent) {
        let (handlers, delivery) = {
            let topics = self.topics.lock().expect("bus registry poisoned");
            match topics.get(&event.topic()) {
                Some(entry) => (
                    entry.handlers.iter().map(|(_, h)| h.clone()).collect::<Vec<_>>(),
                    entry.delivery.clone(),
                ),
                None => return,
            }
        };

        let _ordered = delivery.lock().expect("bus delivery poisoned");
        for handler in handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                error!(topic = ?event.topic(), "event handler panicked: {:?}", panic_message(&panic));
            }
        }
    }
}

impl Publisher for EventBus {
    fn publish(&self, event: AppEvent) {
        EventBus::publish(self, event)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
