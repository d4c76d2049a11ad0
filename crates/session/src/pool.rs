//! The live session pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use veilnet_core::event::{AppEvent, ServiceContext, SessionEvent, SessionId, SessionStatus};
use veilnet_bus::Publisher;

use crate::session::Session;

/// Concurrent map of live sessions keyed by opaque ID.
///
/// Adding publishes a Created event, removing publishes Removed. IDs are
/// 128-bit random values, so a removed ID never reappears within the
/// process lifetime.
pub struct SessionPool {
    publisher: Arc<dyn Publisher>,
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl SessionPool {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a session and announce it.
    pub fn add(&self, session: Arc<Session>) {
        self.sessions
            .lock()
            .expect("session pool poisoned")
            .insert(session.id().clone(), session.clone());
        self.publisher.publish(lifecycle_event(SessionStatus::Created, &session));
    }

    /// Remove a session by ID, announcing the removal. Returns the removed
    /// session, or `None` if the ID was not present.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.lock().expect("session pool poisoned").remove(id);
        if let Some(session) = &removed {
            self.publisher.publish(lifecycle_event(SessionStatus::Removed, session));
        }
        removed
    }

    pub fn find(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().expect("session pool poisoned").get(id).cloned()
    }

    /// All sessions matching a predicate.
    pub fn find_by<F>(&self, predicate: F) -> Vec<Arc<Session>>
    where
        F: Fn(&Session) -> bool,
    {
        self.sessions
            .lock()
            .expect("session pool poisoned")
            .values()
            .filter(|s| predicate(s))
            .cloned()
            .collect()
    }

    /// Snapshot copy of every live session.
    pub fn get_all(&self) -> Vec<Arc<Session>> {
        self.sessions
            .lock()
            .expect("session pool poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session pool poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the Session-topic payload for a pool transition.
fn lifecycle_event(status: SessionStatus, session: &Session) -> AppEvent {
    AppEvent::Session(SessionEvent {
        status,
        service: ServiceContext {
            id: session.service_id().to_string(),
        },
        session: session.context(),
    })
}
