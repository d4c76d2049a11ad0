//! Application events.
//!
//! Everything observable in the node flows through a topic-keyed event
//! bus. This module defines the closed set of topics and their payloads;
//! the broker itself lives in `veilnet-bus`.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::identity::{Address, Identity, RegistrationStatus};
use crate::nat::NatEvent;
use crate::payment::{Earnings, Invoice};
use crate::proposal::{Location, ServiceProposal};
use crate::state::{ConnectionStatistics, State};

/// Opaque session identifier, unique within the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random ID. 128 bits of randomness makes reuse of a
    /// removed ID within one process practically impossible.
    pub fn random() -> Self {
        let mut raw = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut raw);
        Self(hex::encode(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bus topics. Delivery to a single subscriber is FIFO per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Session lifecycle: created / acknowledged / removed.
    Session,
    /// Tokens earned by a session since its start.
    SessionTokensEarned,
    /// Bytes moved through a session's data plane.
    SessionDataTransferred,
    /// Timing checkpoints for observability.
    Trace,
    /// A service changed lifecycle state.
    ServiceStatus,
    /// NAT traversal / port-mapping outcome.
    NatEvent,
    /// Consumer-side connection state.
    ConnectionState,
    /// Consumer-side connection transfer statistics.
    ConnectionStatistics,
    /// Consumer-side invoice settled.
    InvoicePaid,
    /// An identity's on-chain balance changed.
    BalanceChanged,
    /// An identity's earnings changed.
    EarningsChanged,
    /// An identity's registration status changed.
    IdentityRegistration,
    /// New node state snapshot available.
    StateChanged,
}

/// Lifecycle status carried on the Session topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Acknowledged,
    Removed,
}

/// Reference to the service a session event belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceContext {
    pub id: String,
}

/// Full session payload published on the Session topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub consumer_id: Identity,
    pub consumer_location: Location,
    pub accountant_id: Address,
    pub proposal: ServiceProposal,
}

/// Session lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub status: SessionStatus,
    pub service: ServiceContext,
    pub session: SessionContext,
}

/// Cumulative earnings of a single session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensEarned {
    pub session_id: SessionId,
    pub total: u64,
}

/// Bytes moved through a session, as reported by the data plane.
///
/// `up` and `down` are counted from the consumer's perspective; the state
/// keeper flips them into the provider's view at its boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransferred {
    pub session_id: SessionId,
    pub up: u64,
    pub down: u64,
}

/// A named timing checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub id: String,
    pub key: String,
    #[serde(skip)]
    pub duration: Duration,
}

/// A service changed lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatusChanged {
    pub id: String,
    pub status: crate::service::ServiceState,
}

/// Consumer-side connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    NotConnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::NotConnected
    }
}

/// Consumer-side connection status snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub session_id: Option<SessionId>,
}

/// Connection state transition event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStateChanged {
    pub state: ConnectionState,
    pub session: ConnectionStatus,
}

/// A consumer-side invoice was settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub invoice: Invoice,
}

/// An identity's on-chain balance changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceChanged {
    pub identity: Identity,
    pub previous: u64,
    pub current: u64,
}

/// An identity's earnings changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsChanged {
    pub identity: Identity,
    pub previous: Earnings,
    pub current: Earnings,
}

/// An identity's registration status changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRegistration {
    pub identity: Identity,
    pub status: RegistrationStatus,
}

/// The closed set of event payloads carried by the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Session(SessionEvent),
    TokensEarned(TokensEarned),
    DataTransferred(DataTransferred),
    Trace(TraceEvent),
    ServiceStatus(ServiceStatusChanged),
    Nat(NatEvent),
    ConnectionState(ConnectionStateChanged),
    ConnectionStatistics(ConnectionStatistics),
    InvoicePaid(InvoicePaid),
    BalanceChanged(BalanceChanged),
    EarningsChanged(EarningsChanged),
    IdentityRegistration(IdentityRegistration),
    StateChanged(State),
}

impl AppEvent {
    /// The topic this event is delivered on.
    pub fn topic(&self) -> Topic {
        match self {
            AppEvent::Session(_) => Topic::Session,
            AppEvent::TokensEarned(_) => Topic::SessionTokensEarned,
            AppEvent::DataTransferred(_) => Topic::SessionDataTransferred,
            AppEvent::Trace(_) => Topic::Trace,
            AppEvent::ServiceStatus(_) => Topic::ServiceStatus,
            AppEvent::Nat(_) => Topic::NatEvent,
            AppEvent::ConnectionState(_) => Topic::ConnectionState,
            AppEvent::ConnectionStatistics(_) => Topic::ConnectionStatistics,
            AppEvent::InvoicePaid(_) => Topic::InvoicePaid,
            AppEvent::BalanceChanged(_) => Topic::BalanceChanged,
            AppEvent::EarningsChanged(_) => Topic::EarningsChanged,
            AppEvent::IdentityRegistration(_) => Topic::IdentityRegistration,
            AppEvent::StateChanged(_) => Topic::StateChanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_session_ids_are_unique() {
        let a = SessionId::random();
        let b = SessionId::random();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn event_topic_mapping() {
        let ev = AppEvent::TokensEarned(TokensEarned {
            session_id: SessionId::new("1"),
            total: 500,
        });
        assert_eq!(ev.topic(), Topic::SessionTokensEarned);

        let ev = AppEvent::Nat(NatEvent::success(crate::nat::STAGE_MAPPING));
        assert_eq!(ev.topic(), Topic::NatEvent);
    }
}
