//! A running service instance.

use std::sync::{Arc, Mutex};

use tracing::info;

use veilnet_core::identity::Identity;
use veilnet_core::proposal::ServiceProposal;
use veilnet_core::service::ServiceState;

use crate::config_provider::ConfigProvider;
use crate::policy::PolicyRepository;

/// Discovery handle for publishing the service's proposal to the market.
pub trait Discovery: Send + Sync {
    fn publish_proposal(&self, proposal: &ServiceProposal);
    fn unpublish(&self);
}

/// Discovery stub for services not announced anywhere.
pub struct NoDiscovery;

impl Discovery for NoDiscovery {
    fn publish_proposal(&self, _proposal: &ServiceProposal) {}
    fn unpublish(&self) {}
}

/// One running service of a given type.
///
/// Immutable after construction except for the lifecycle state, which only
/// moves forward: `NotRunning → Starting → Running → Stopping → NotRunning`.
pub struct Instance {
    id: String,
    service_type: String,
    provider_id: Identity,
    options: serde_json::Value,
    proposal: ServiceProposal,
    state: Mutex<ServiceState>,
    policies: Arc<PolicyRepository>,
    discovery: Arc<dyn Discovery>,
    config_provider: Arc<dyn ConfigProvider>,
}

impl Instance {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        service_type: impl Into<String>,
        provider_id: Identity,
        options: serde_json::Value,
        proposal: ServiceProposal,
        initial_state: ServiceState,
        policies: Arc<PolicyRepository>,
        discovery: Arc<dyn Discovery>,
        config_provider: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            id: id.into(),
            service_type: service_type.into(),
            provider_id,
            options,
            proposal,
            state: Mutex::new(initial_state),
            policies,
            discovery,
            config_provider,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn provider_id(&self) -> &Identity {
        &self.provider_id
    }

    pub fn options(&self) -> &serde_json::Value {
        &self.options
    }

    pub fn proposal(&self) -> &ServiceProposal {
        &self.proposal
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock().expect("service state poisoned")
    }

    /// Advance the lifecycle state.
    ///
    /// # Panics
    ///
    /// Out-of-order transitions are programming errors and abort.
    pub fn set_state(&self, next: ServiceState) {
        let mut state = self.state.lock().expect("service state poisoned");
        assert!(
            state.can_transition_to(next),
            "illegal service state transition {} -> {}",
            *state,
            next,
        );
        info!(service = %self.id, from = %*state, to = %next, "service state change");
        *state = next;
    }

    pub fn policies(&self) -> &PolicyRepository {
        &self.policies
    }

    pub fn discovery(&self) -> &dyn Discovery {
        self.discovery.as_ref()
    }

    pub fn config_provider(&self) -> &dyn ConfigProvider {
        self.config_provider.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_provider::StaticConfigProvider;

    fn instance(initial: ServiceState) -> Instance {
        Instance::new(
            "svc-1",
            "wireguard",
            Identity::from_address("provider"),
            serde_json::json!({}),
            ServiceProposal::default(),
            initial,
            Arc::new(PolicyRepository::new()),
            Arc::new(NoDiscovery),
            Arc::new(StaticConfigProvider::new(serde_json::json!({}))),
        )
    }

    #[test]
    fn full_lifecycle() {
        let svc = instance(ServiceState::NotRunning);
        svc.set_state(ServiceState::Starting);
        svc.set_state(ServiceState::Running);
        svc.set_state(ServiceState::Stopping);
        svc.set_state(ServiceState::NotRunning);
        assert_eq!(svc.state(), ServiceState::NotRunning);
    }

    #[test]
    #[should_panic(expected = "illegal service state transition")]
    fn out_of_order_transition_aborts() {
        let svc = instance(ServiceState::NotRunning);
        svc.set_state(ServiceState::Running);
    }
}
