//! A bus wrapper that records everything it delivers.
//!
//! Used by tests to assert on exact event histories while still fanning
//! events out to real subscribers.

use std::sync::Mutex;

use veilnet_core::event::{AppEvent, Topic};

use crate::{EventBus, Publisher, SubscriptionId};

/// Records the full publish history in addition to normal delivery.
#[derive(Default)]
pub struct RecordingBus {
    inner: EventBus,
    history: Mutex<Vec<AppEvent>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event published so far, in publish order.
    pub fn history(&self) -> Vec<AppEvent> {
        self.history.lock().expect("history poisoned").clone()
    }

    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        self.inner.subscribe(topic, handler)
    }
}

impl Publisher for RecordingBus {
    fn publish(&self, event: AppEvent) {
        self.history.lock().expect("history poisoned").push(event.clone());
        self.inner.publish(event);
    }
}
