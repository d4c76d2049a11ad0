//! Provider node assembly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use veilnet_bus::{EventBus, Publisher};
use veilnet_core::config::{PaymentConfig, SessionConfig};
use veilnet_core::identity::Identity;
use veilnet_core::payment::Earnings;
use veilnet_core::service::ServiceState;
use veilnet_core::state::State;
use veilnet_payments::{DataTransferSource, EarningsTracker, InvoiceEngineFactory};
use veilnet_session::p2p::Channel;
use veilnet_session::{Instance, ServiceRegistry, SessionDispatcher, SessionManager, SessionPool};
use veilnet_state::keeper::{
    EarningsProvider, IdentityProvider, Keeper, KeeperDeps, ServiceLister,
};
use veilnet_state::stats::Stats;
use veilnet_state::NatTracker;

use crate::{NodeError, Result};

/// Options for assembling a provider node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub provider_id: Identity,
    pub payment: PaymentConfig,
    pub session: SessionConfig,
    pub debounce_interval: Duration,
}

impl NodeConfig {
    pub fn new(provider_id: Identity) -> Self {
        Self {
            provider_id,
            payment: PaymentConfig::default(),
            session: SessionConfig::default(),
            debounce_interval: Duration::from_millis(200),
        }
    }
}

struct ManagedService {
    manager: Arc<SessionManager>,
    dispatcher: Arc<SessionDispatcher>,
}

/// A running provider node.
///
/// Owns the bus and every subsystem built on it. Services are added in
/// `NotRunning`, started through [`ProviderNode::start_service`] and torn
/// down (sessions included) through [`ProviderNode::stop_service`].
pub struct ProviderNode {
    config: NodeConfig,
    bus: Arc<EventBus>,
    channel: Arc<dyn Channel>,
    data_source: Arc<dyn DataTransferSource>,
    registry: Arc<ServiceRegistry>,
    earnings: Arc<EarningsTracker>,
    nat_tracker: Arc<NatTracker>,
    keeper: Keeper,
    services: Mutex<HashMap<String, ManagedService>>,
}

impl ProviderNode {
    pub fn new(
        config: NodeConfig,
        channel: Arc<dyn Channel>,
        data_source: Arc<dyn DataTransferSource>,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let publisher: Arc<dyn Publisher> = bus.clone();

        let registry = Arc::new(ServiceRegistry::new(publisher.clone()));
        let earnings = Arc::new(EarningsTracker::new(publisher.clone()));

        let nat_tracker = Arc::new(NatTracker::new());
        nat_tracker.subscribe(&bus);

        let mut deps = KeeperDeps::new(publisher);
        deps.nat_provider = nat_tracker.clone();
        deps.service_lister = Arc::new(RegistryLister(registry.clone()));
        deps.identity_provider = Arc::new(NodeIdentity(config.provider_id.clone()));
        deps.earnings_provider = Arc::new(TrackedEarnings(earnings.clone()));
        let keeper = Keeper::new(deps, config.debounce_interval);
        keeper.subscribe(&bus);

        Self {
            config,
            bus,
            channel,
            data_source,
            registry,
            earnings,
            nat_tracker,
            keeper,
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Register a service instance and build its session machinery. The
    /// service starts in whatever state the instance was constructed in;
    /// call [`ProviderNode::start_service`] to bring it to `Running`.
    pub fn add_service(&self, instance: Arc<Instance>) -> Arc<SessionManager> {
        let publisher: Arc<dyn Publisher> = self.bus.clone();
        let pool = Arc::new(SessionPool::new(publisher.clone()));
        let factory = Arc::new(InvoiceEngineFactory::new(
            instance.proposal().payment_method,
            self.config.payment,
            self.channel.clone(),
            self.data_source.clone(),
            publisher.clone(),
            self.earnings.clone(),
        ));
        let manager = Arc::new(SessionManager::new(
            instance.clone(),
            pool,
            factory,
            publisher,
            self.config.session,
        ));
        let dispatcher = SessionDispatcher::new(manager.clone());
        dispatcher.attach(self.channel.as_ref());

        self.registry.add(instance.clone());
        self.services.lock().expect("services poisoned").insert(
            instance.id().to_string(),
            ManagedService {
                manager: manager.clone(),
                dispatcher,
            },
        );
        info!(service = instance.id(), "service added");
        manager
    }

    /// Bring a registered service to `Running` and announce its proposal.
    pub fn start_service(&self, id: &str) -> Result<()> {
        let instance = self
            .registry
            .get(id)
            .ok_or_else(|| NodeError::UnknownService(id.to_string()))?;
        self.registry.transition(id, ServiceState::Starting);
        self.registry.transition(id, ServiceState::Running);
        instance.discovery().publish_proposal(instance.proposal());
        info!(service = id, "service running");
        Ok(())
    }

    /// Stop a service: destroy its live sessions, withdraw the proposal,
    /// and drop it from the registry.
    pub fn stop_service(&self, id: &str) -> Result<()> {
        let instance = self
            .registry
            .get(id)
            .ok_or_else(|| NodeError::UnknownService(id.to_string()))?;

        if let Some(managed) = self.services.lock().expect("services poisoned").get(id) {
            managed.manager.destroy_all();
        }
        instance.discovery().unpublish();
        self.registry.transition(id, ServiceState::Stopping);
        self.registry.transition(id, ServiceState::NotRunning);
        self.registry.remove(id);
        self.services.lock().expect("services poisoned").remove(id);
        info!(service = id, "service stopped");
        Ok(())
    }

    pub fn manager(&self, service_id: &str) -> Option<Arc<SessionManager>> {
        self.services
            .lock()
            .expect("services poisoned")
            .get(service_id)
            .map(|s| s.manager.clone())
    }

    pub fn dispatcher(&self, service_id: &str) -> Option<Arc<SessionDispatcher>> {
        self.services
            .lock()
            .expect("services poisoned")
            .get(service_id)
            .map(|s| s.dispatcher.clone())
    }

    /// The node's event bus, for collaborators publishing NAT, connection
    /// or balance events.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn nat_tracker(&self) -> &Arc<NatTracker> {
        &self.nat_tracker
    }

    pub fn earnings(&self) -> &Arc<EarningsTracker> {
        &self.earnings
    }

    /// Current observable node state.
    pub fn state(&self) -> State {
        self.keeper.state()
    }

    /// Aggregate statistics over the live sessions.
    pub fn session_stats(&self) -> Stats {
        self.keeper.session_stats()
    }
}

struct RegistryLister(Arc<ServiceRegistry>);

impl ServiceLister for RegistryLister {
    fn list(&self) -> Vec<Arc<Instance>> {
        self.0.list()
    }
}

struct NodeIdentity(Identity);

impl IdentityProvider for NodeIdentity {
    fn identities(&self) -> Vec<Identity> {
        vec![self.0.clone()]
    }
}

struct TrackedEarnings(Arc<EarningsTracker>);

impl EarningsProvider for TrackedEarnings {
    fn earnings(&self, identity: &Identity) -> Earnings {
        self.0.earnings(identity)
    }
}
