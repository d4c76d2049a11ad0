//! VeilNet Session
//!
//! Provider-side session lifecycle: admission of consumer session requests
//! arriving over the P2P channel, the live session pool, per-service
//! instances with access policies, and the session manager that supervises
//! one payment engine per session.
//!
//! ## Components
//!
//! - **SessionPool**: concurrent map of live sessions keyed by opaque ID
//! - **Instance**: one running service with its proposal and access policy
//! - **SessionManager**: admission, payment-engine supervision, teardown
//! - **SessionDispatcher**: wires the P2P session topics to the manager

pub mod config_provider;
pub mod dispatcher;
pub mod instance;
pub mod manager;
pub mod p2p;
pub mod payment;
pub mod policy;
pub mod pool;
pub mod registry;
pub mod session;

pub use config_provider::{ConfigParams, ConfigProvider, TraversalParams};
pub use dispatcher::SessionDispatcher;
pub use instance::{Discovery, Instance, NoDiscovery};
pub use manager::SessionManager;
pub use payment::{PaymentEngine, PaymentEngineFactory, PaymentError};
pub use policy::{AccessPolicy, PolicyRepository};
pub use pool::SessionPool;
pub use registry::ServiceRegistry;
pub use session::{DoneSignal, Session};

use thiserror::Error;

/// Errors surfaced by session operations.
///
/// Admission errors are stable identities: callers at the P2P boundary
/// match them by equality.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No running service matches the requested proposal.
    #[error("invalid proposal requested")]
    InvalidProposal,

    /// The consumer address could not be parsed.
    #[error("invalid consumer id")]
    InvalidConsumerId,

    /// The service's access policy rejected the consumer.
    #[error("consumer is not allowed")]
    ConsumerNotAllowed,

    /// Acknowledge/destroy referenced an unknown session.
    #[error("session does not exist")]
    SessionNotExists,

    /// A consumer tried to act on another consumer's session.
    #[error("wrong session owner")]
    WrongSessionOwner,

    /// The first invoice was not acknowledged within the admission window.
    #[error("first invoice was not paid in time")]
    FirstInvoiceTimeout,

    /// The payment engine failed while waiting for the first invoice.
    #[error("first invoice was not paid: {0}")]
    FirstInvoice(PaymentError),

    /// The payment engine could not be constructed.
    #[error("could not initialize payments: {0}")]
    PaymentEngine(PaymentError),

    /// The service failed to produce a session configuration.
    #[error("could not provide service configuration: {0}")]
    ServiceConfig(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
