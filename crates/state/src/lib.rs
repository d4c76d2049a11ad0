//! VeilNet State
//!
//! A single-threaded, event-sourced view of the node: services, sessions,
//! NAT status, connection and identity balances, folded from bus events
//! into an immutable snapshot that observers poll or stream.
//!
//! Expensive sub-views (the service list, NAT status) are refreshed
//! through trailing-edge debouncers so event bursts cost one refresh.

pub mod debounce;
pub mod keeper;
pub mod stats;
pub mod tracker;

pub use debounce::Debouncer;
pub use keeper::{Keeper, KeeperDeps};
pub use stats::Stats;
pub use tracker::NatTracker;
