//! Payment records exchanged between provider and consumer.

use serde::{Deserialize, Serialize};

use crate::identity::Address;

/// A provider → consumer payment demand.
///
/// `agreement_total` is the running cumulative amount owed within the
/// session and never decreases; each issued invoice bumps it by the amount
/// owed since the previous tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub agreement_id: u64,
    pub agreement_total: u64,
    pub transactor_fee: u64,
    pub hashlock: String,
    pub recipient: Address,
}

/// The consumer's signed acknowledgement of an invoice.
///
/// Construction and verification of the signature are out of scope; the
/// engine only checks that the acknowledged totals match what it issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeMessage {
    pub agreement_id: u64,
    pub agreement_total: u64,
    pub signature: String,
}

/// Per-identity earnings: monotonic lifetime total plus the portion not
/// yet settled on-chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earnings {
    pub lifetime_balance: u64,
    pub unsettled_balance: u64,
}
