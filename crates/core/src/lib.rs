//! VeilNet Core
//!
//! Shared types for the provider node: identities and on-chain addresses,
//! service proposals, payment records, NAT status, application events and
//! the observable node state snapshot.
//!
//! This crate carries no runtime of its own; the event bus, session
//! manager, payment engine and state keeper all build on these types.

pub mod config;
pub mod event;
pub mod identity;
pub mod nat;
pub mod payment;
pub mod proposal;
pub mod service;
pub mod state;

pub use config::{PaymentConfig, SessionConfig};
pub use event::{AppEvent, SessionContext, SessionId, SessionStatus, Topic};
pub use identity::{Address, Identity, RegistrationStatus};
pub use nat::{NatEvent, NatStatus};
pub use payment::{Earnings, ExchangeMessage, Invoice};
pub use proposal::{Location, PaymentMethod, ServiceDefinition, ServiceProposal};
pub use service::ServiceState;
pub use state::State;
