//! A single live session.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use veilnet_core::event::{SessionContext, SessionId};
use veilnet_core::identity::{Address, Identity};
use veilnet_core::proposal::{Location, ServiceProposal};

/// One-shot completion signal shared between the session's manager and its
/// payment engine. May be signalled at most once; waiting after the signal
/// returns immediately.
#[derive(Debug, Clone)]
pub struct DoneSignal {
    tx: watch::Sender<bool>,
}

impl DoneSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal. Returns `true` only for the call that actually
    /// signalled; later calls are no-ops.
    pub fn signal(&self) -> bool {
        let mut fired = false;
        self.tx.send_if_modified(|done| {
            if !*done {
                *done = true;
                fired = true;
                true
            } else {
                false
            }
        });
        fired
    }

    pub fn is_done(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for DoneSignal {
    fn default() -> Self {
        Self::new()
    }
}

type CleanupHook = Box<dyn FnOnce() + Send>;

/// A consumer's session against one of this provider's services.
///
/// The identifying fields are immutable for the session's lifetime; only
/// the opaque service config and cleanup hook are set after admission, and
/// no mutation is accepted once the done signal has fired.
pub struct Session {
    id: SessionId,
    consumer_id: Identity,
    consumer_location: Location,
    accountant_id: Address,
    provider_id: Identity,
    proposal: ServiceProposal,
    service_id: String,
    created_at: DateTime<Utc>,
    done: DoneSignal,
    config: Mutex<Option<serde_json::Value>>,
    cleanup: Mutex<Option<CleanupHook>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("consumer_id", &self.consumer_id)
            .field("consumer_location", &self.consumer_location)
            .field("accountant_id", &self.accountant_id)
            .field("provider_id", &self.provider_id)
            .field("proposal", &self.proposal)
            .field("service_id", &self.service_id)
            .field("created_at", &self.created_at)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        id: SessionId,
        consumer_id: Identity,
        accountant_id: Address,
        provider_id: Identity,
        proposal: ServiceProposal,
        service_id: String,
    ) -> Self {
        Self {
            id,
            consumer_id,
            consumer_location: Location::default(),
            accountant_id,
            provider_id,
            proposal,
            service_id,
            created_at: Utc::now(),
            done: DoneSignal::new(),
            config: Mutex::new(None),
            cleanup: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn consumer_id(&self) -> &Identity {
        &self.consumer_id
    }

    pub fn consumer_location(&self) -> &Location {
        &self.consumer_location
    }

    pub fn accountant_id(&self) -> &Address {
        &self.accountant_id
    }

    pub fn provider_id(&self) -> &Identity {
        &self.provider_id
    }

    pub fn proposal(&self) -> &ServiceProposal {
        &self.proposal
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn service_type(&self) -> &str {
        &self.proposal.service_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn done(&self) -> &DoneSignal {
        &self.done
    }

    /// Persist the opaque service-specific session config. Rejected after
    /// the done signal has fired.
    pub fn set_config(&self, config: serde_json::Value) {
        if self.done.is_done() {
            return;
        }
        *self.config.lock().expect("session config poisoned") = Some(config);
    }

    pub fn config(&self) -> Option<serde_json::Value> {
        self.config.lock().expect("session config poisoned").clone()
    }

    /// Install the hook run on teardown. Rejected after done.
    pub fn set_cleanup(&self, hook: CleanupHook) {
        if self.done.is_done() {
            return;
        }
        *self.cleanup.lock().expect("session cleanup poisoned") = Some(hook);
    }

    /// Take the cleanup hook for execution. Runs at most once.
    pub fn take_cleanup(&self) -> Option<CleanupHook> {
        self.cleanup.lock().expect("session cleanup poisoned").take()
    }

    /// The event-bus payload describing this session.
    pub fn context(&self) -> SessionContext {
        SessionContext {
            id: self.id.clone(),
            started_at: self.created_at,
            consumer_id: self.consumer_id.clone(),
            consumer_location: self.consumer_location.clone(),
            accountant_id: self.accountant_id,
            proposal: self.proposal.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        Session::new(
            SessionId::new("s-1"),
            Identity::from_address("deadbeef"),
            Address::parse("0x1").unwrap(),
            Identity::from_address("cafe"),
            ServiceProposal::default(),
            "service-1".to_string(),
        )
    }

    #[test]
    fn done_fires_once() {
        let session = test_session();
        assert!(!session.done().is_done());
        assert!(session.done().signal());
        assert!(!session.done().signal());
        assert!(session.done().is_done());
    }

    #[tokio::test]
    async fn wait_returns_after_signal() {
        let session = test_session();
        session.done().signal();
        session.done().wait().await;
    }

    #[test]
    fn config_rejected_after_done() {
        let session = test_session();
        session.set_config(serde_json::json!({"port": 1194}));
        assert!(session.config().is_some());

        session.done().signal();
        session.set_config(serde_json::json!({"port": 4444}));
        assert_eq!(session.config().unwrap()["port"], 1194);
    }

    #[test]
    fn cleanup_taken_once() {
        let session = test_session();
        session.set_cleanup(Box::new(|| {}));
        assert!(session.take_cleanup().is_some());
        assert!(session.take_cleanup().is_none());
    }
}
