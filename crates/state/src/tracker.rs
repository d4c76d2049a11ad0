//! Last-known NAT traversal outcome.

use std::sync::{Arc, Mutex};

use veilnet_bus::EventBus;
use veilnet_core::event::{AppEvent, Topic};
use veilnet_core::nat::{NatEvent, NatStatus};

use crate::keeper::NatStatusProvider;

/// Retains the most recent NAT traversal/mapping event seen on the bus
/// and derives the node's NAT status from it.
#[derive(Default)]
pub struct NatTracker {
    last: Mutex<Option<NatEvent>>,
}

impl NatTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start consuming NAT events from the bus.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        let tracker = self.clone();
        bus.subscribe(Topic::NatEvent, move |ev| {
            if let AppEvent::Nat(event) = ev {
                tracker.consume(event.clone());
            }
        });
    }

    pub fn consume(&self, event: NatEvent) {
        *self.last.lock().expect("nat tracker poisoned") = Some(event);
    }

    pub fn last_event(&self) -> Option<NatEvent> {
        self.last.lock().expect("nat tracker poisoned").clone()
    }
}

impl NatStatusProvider for NatTracker {
    fn status(&self) -> NatStatus {
        self.last_event()
            .map(|ev| NatStatus::from_event(&ev))
            .unwrap_or_else(NatStatus::not_finished)
    }
}
