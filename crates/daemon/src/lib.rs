//! VeilNet Daemon
//!
//! Assembles a provider node from the session core: one event bus, the
//! service registry, a session manager with a live invoice engine per
//! service, the NAT tracker and the state keeper. The P2P channel, data
//! plane and on-chain collaborators are injected through their contracts.

mod node;

pub use node::{NodeConfig, ProviderNode};

use thiserror::Error;

use veilnet_session::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, NodeError>;
