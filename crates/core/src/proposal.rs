//! Service proposals.
//!
//! A proposal is a published offer to provide a service under specific
//! payment terms. Session admission matches the consumer's requested
//! proposal ID against the running service's proposal by equality.

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// Geographic location of a service endpoint or consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub city: String,
}

impl Location {
    pub fn country(country: &str) -> Self {
        Self {
            country: country.to_string(),
            city: String::new(),
        }
    }
}

/// Service-specific definition attached to a proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub location: Location,
}

/// Payment terms for a proposal, in the smallest token unit.
///
/// A session's owed amount combines both components: bytes moved through
/// the data plane priced per GiB, plus session wall time priced per minute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub price_per_gib: u64,
    pub price_per_minute: u64,
}

pub const GIB: u64 = 1024 * 1024 * 1024;

impl PaymentMethod {
    /// Amount owed for the given consumption.
    pub fn amount_owed(&self, bytes_transferred: u64, elapsed: std::time::Duration) -> u64 {
        let data = (self.price_per_gib as u128 * bytes_transferred as u128 / GIB as u128) as u64;
        let time = (self.price_per_minute as u128 * elapsed.as_secs() as u128 / 60) as u64;
        data + time
    }
}

/// A published offer to provide a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceProposal {
    pub id: i64,
    pub service_type: String,
    pub service_definition: ServiceDefinition,
    pub provider_id: Identity,
    pub payment_method: PaymentMethod,
}
