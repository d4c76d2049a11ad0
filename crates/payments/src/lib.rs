//! VeilNet Payments
//!
//! The provider side of pay-as-you-go sessions: a per-session invoicing
//! loop that bills for transferred data and elapsed time over the P2P
//! channel, plus per-identity earnings accounting.
//!
//! The session manager sees engines only through the `PaymentEngine`
//! contract defined in `veilnet-session`; this crate supplies the real
//! implementation and its factory.

pub mod earnings;
pub mod engine;

pub use earnings::EarningsTracker;
pub use engine::{DataTransferSource, InvoiceEngine, InvoiceEngineFactory, NoTraffic};
