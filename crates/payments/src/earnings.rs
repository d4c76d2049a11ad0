//! Per-identity earnings accounting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use veilnet_bus::Publisher;
use veilnet_core::event::{AppEvent, EarningsChanged};
use veilnet_core::identity::Identity;
use veilnet_core::payment::Earnings;

/// Tracks what each provider identity has earned.
///
/// `lifetime_balance` only grows; `unsettled_balance` grows with
/// acknowledged invoices and shrinks only when a settlement lands
/// on-chain. Every change is announced so the state keeper can fold it
/// into the node snapshot.
pub struct EarningsTracker {
    publisher: Arc<dyn Publisher>,
    entries: Mutex<HashMap<Identity, Earnings>>,
}

impl EarningsTracker {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record newly acknowledged earnings for an identity.
    pub fn register(&self, identity: &Identity, amount: u64) {
        if amount == 0 {
            return;
        }
        let (previous, current) = {
            let mut entries = self.entries.lock().expect("earnings poisoned");
            let entry = entries.entry(identity.clone()).or_default();
            let previous = *entry;
            entry.lifetime_balance += amount;
            entry.unsettled_balance += amount;
            (previous, *entry)
        };
        self.publisher.publish(AppEvent::EarningsChanged(EarningsChanged {
            identity: identity.clone(),
            previous,
            current,
        }));
    }

    /// Record an on-chain settlement, lowering the unsettled balance.
    pub fn settle(&self, identity: &Identity, amount: u64) {
        let (previous, current) = {
            let mut entries = self.entries.lock().expect("earnings poisoned");
            let entry = entries.entry(identity.clone()).or_default();
            let previous = *entry;
            entry.unsettled_balance = entry.unsettled_balance.saturating_sub(amount);
            (previous, *entry)
        };
        self.publisher.publish(AppEvent::EarningsChanged(EarningsChanged {
            identity: identity.clone(),
            previous,
            current,
        }));
    }

    pub fn earnings(&self, identity: &Identity) -> Earnings {
        self.entries
            .lock()
            .expect("earnings poisoned")
            .get(identity)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilnet_bus::RecordingBus;

    #[test]
    fn register_raises_both_balances() {
        let bus = Arc::new(RecordingBus::new());
        let tracker = EarningsTracker::new(bus.clone());
        let provider = Identity::from_address("provider");

        tracker.register(&provider, 100);
        tracker.register(&provider, 50);

        let earnings = tracker.earnings(&provider);
        assert_eq!(earnings.lifetime_balance, 150);
        assert_eq!(earnings.unsettled_balance, 150);
        assert_eq!(bus.history().len(), 2);
    }

    #[test]
    fn settle_lowers_only_unsettled() {
        let bus = Arc::new(RecordingBus::new());
        let tracker = EarningsTracker::new(bus);
        let provider = Identity::from_address("provider");

        tracker.register(&provider, 100);
        tracker.settle(&provider, 60);

        let earnings = tracker.earnings(&provider);
        assert_eq!(earnings.lifetime_balance, 100);
        assert_eq!(earnings.unsettled_balance, 40);

        // Over-settlement clamps at zero rather than underflowing.
        tracker.settle(&provider, 1000);
        assert_eq!(tracker.earnings(&provider).unsettled_balance, 0);
        assert_eq!(tracker.earnings(&provider).lifetime_balance, 100);
    }

    #[test]
    fn zero_registration_publishes_nothing() {
        let bus = Arc::new(RecordingBus::new());
        let tracker = EarningsTracker::new(bus.clone());

        tracker.register(&Identity::from_address("provider"), 0);
        assert!(bus.history().is_empty());
    }

    #[test]
    fn unknown_identity_has_zero_earnings() {
        let bus = Arc::new(RecordingBus::new());
        let tracker = EarningsTracker::new(bus);
        assert_eq!(
            tracker.earnings(&Identity::from_address("nobody")),
            Earnings::default()
        );
    }
}
