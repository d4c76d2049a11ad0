//! Runtime options recognized by the session core.

use std::time::Duration;

/// Behaviour of the provider-side payment engine.
#[derive(Debug, Clone, Copy)]
pub struct PaymentConfig {
    /// Interval between issued invoices.
    pub invoice_frequency: Duration,
    /// Cumulative unacknowledged value at which the engine gives up and
    /// the session is destroyed.
    pub max_unpaid_invoice_value: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            invoice_frequency: Duration::from_secs(1),
            max_unpaid_invoice_value: 300_000_000,
        }
    }
}

/// Behaviour of session admission.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// How long admission waits for the first acknowledged invoice before
    /// rejecting the session.
    pub first_invoice_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            first_invoice_timeout: Duration::from_secs(10),
        }
    }
}
