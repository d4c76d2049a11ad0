//! The observable node state snapshot.
//!
//! A [`State`] value is immutable once published: the keeper builds a new
//! one for every mutation and swaps it in atomically, so readers never see
//! a partial update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{ConnectionStatus, SessionId};
use crate::identity::{Address, Identity, RegistrationStatus};
use crate::nat::NatStatus;
use crate::payment::Invoice;
use crate::proposal::ServiceProposal;
use crate::service::ServiceState;

/// Who initiated the session relative to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionDirection {
    Provided,
    Consumed,
}

/// Lifecycle of a session history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    New,
    Completed,
}

/// One session as seen by the state keeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session_id: SessionId,
    pub direction: SessionDirection,
    pub consumer_id: Identity,
    pub accountant_id: Address,
    pub provider_country: String,
    pub consumer_country: String,
    pub started: DateTime<Utc>,
    pub status: HistoryStatus,
    pub tokens: u64,
    pub data_sent: u64,
    pub data_received: u64,
}

/// Counts of connection attempts against a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCounts {
    pub attempted: u64,
    pub successful: u64,
}

/// One running service as seen by the state keeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: String,
    pub provider_id: Identity,
    pub service_type: String,
    pub options: serde_json::Value,
    pub status: ServiceState,
    pub proposal: ServiceProposal,
    pub connection_statistics: ConnectionCounts,
}

/// Transfer statistics of the consumer-side connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatistics {
    pub at: Option<DateTime<Utc>>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Consumer-side connection sub-state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub session: ConnectionStatus,
    pub statistics: ConnectionStatistics,
    pub invoice: Invoice,
}

/// One local identity as seen by the state keeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityState {
    pub address: Identity,
    pub registration_status: RegistrationStatus,
    pub channel_address: Address,
    pub balance: u64,
    pub earnings: u64,
    pub earnings_total: u64,
}

/// The full node state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub nat_status: NatStatus,
    pub services: Vec<ServiceInfo>,
    pub sessions: Vec<SessionHistory>,
    pub connection: ConnectionInfo,
    pub identities: Vec<IdentityState>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            nat_status: NatStatus::not_finished(),
            services: Vec::new(),
            sessions: Vec::new(),
            connection: ConnectionInfo::default(),
            identities: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ConnectionState;
    use crate::nat::STATUS_NOT_FINISHED;

    #[test]
    fn initial_state_shape() {
        let state = State::default();
        assert_eq!(state.nat_status.status, STATUS_NOT_FINISHED);
        assert!(state.nat_status.error.is_empty());
        assert!(state.services.is_empty());
        assert!(state.sessions.is_empty());
        assert!(state.identities.is_empty());
        assert_eq!(state.connection.session.state, ConnectionState::NotConnected);
        assert!(state.connection.statistics.at.is_none());
    }
}
