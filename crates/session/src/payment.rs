//! The manager's view of a session's payment engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use veilnet_core::event::SessionId;
use veilnet_core::identity::{Address, Identity};

/// Payment-engine failures observable by the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The first invoice was not acknowledged within the wait window.
    #[error("first invoice wait timed out")]
    Timeout,

    /// Cumulative unacknowledged value exceeded the configured cutoff.
    #[error("unpaid invoice value exceeded")]
    Unpaid,

    /// The P2P channel failed beyond the retry window.
    #[error("payment channel failure: {0}")]
    Channel(String),

    /// Any other engine failure, rendered verbatim.
    #[error("{0}")]
    Payment(String),
}

/// One session's invoicing loop.
#[async_trait]
pub trait PaymentEngine: Send + Sync {
    /// Run the invoicing loop. Returns `Ok` after a clean [`stop`], or the
    /// failure that terminated the loop.
    ///
    /// [`stop`]: PaymentEngine::stop
    async fn start(&self) -> Result<(), PaymentError>;

    /// Request a clean exit; observed within one tick.
    fn stop(&self);

    /// Block until the first invoice has been acknowledged, the engine has
    /// failed, or the timeout expires. This is the admission gate: it is
    /// the only payment failure that prevents a session from starting.
    async fn wait_first_invoice(&self, timeout: Duration) -> Result<(), PaymentError>;
}

/// Builds a payment engine for a new session. Injected so tests can
/// substitute a mock and so engine variants can be selected by the
/// consumer's payment version.
pub trait PaymentEngineFactory: Send + Sync {
    fn create(
        &self,
        consumer: &Identity,
        provider: &Identity,
        accountant: &Address,
        session_id: &SessionId,
        payment_version: &str,
    ) -> Result<Arc<dyn PaymentEngine>, PaymentError>;
}
