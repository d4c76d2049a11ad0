//! Consumer access policies.

use std::sync::{Arc, Mutex};

use veilnet_core::identity::Identity;

/// A single access rule. Each service type supplies its own variants.
pub trait AccessPolicy: Send + Sync {
    /// Whether the consumer may open sessions against the service.
    fn is_allowed(&self, identity: &Identity) -> bool;
}

/// The set of policies attached to a service instance.
///
/// An empty repository admits everyone; otherwise the consumer must be
/// allowed by at least one policy.
#[derive(Default)]
pub struct PolicyRepository {
    policies: Mutex<Vec<Arc<dyn AccessPolicy>>>,
}

impl PolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, policy: Arc<dyn AccessPolicy>) {
        self.policies.lock().expect("policy repository poisoned").push(policy);
    }

    pub fn is_allowed(&self, identity: &Identity) -> bool {
        let policies = self.policies.lock().expect("policy repository poisoned");
        policies.is_empty() || policies.iter().any(|p| p.is_allowed(identity))
    }
}

/// Policy admitting an explicit list of consumers.
pub struct IdentityAllowlist {
    allowed: Vec<Identity>,
}

impl IdentityAllowlist {
    pub fn new(allowed: Vec<Identity>) -> Self {
        Self { allowed }
    }
}

impl AccessPolicy for IdentityAllowlist {
    fn is_allowed(&self, identity: &Identity) -> bool {
        self.allowed.contains(identity)
    }
}
