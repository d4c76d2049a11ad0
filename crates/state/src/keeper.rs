//! The state keeper.
//!
//! Single-writer model: every subscribed bus callback funnels into one
//! queue drained by a worker task that owns the state. Readers get an
//! atomically swapped snapshot and never observe partial updates. The
//! expensive sub-views (service list, NAT status) refresh through
//! trailing-edge debouncers; everything else applies immediately.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use veilnet_bus::{EventBus, Publisher};
use veilnet_core::event::{AppEvent, SessionStatus, Topic};
use veilnet_core::identity::{Address, Identity, RegistrationStatus};
use veilnet_core::nat::NatStatus;
use veilnet_core::payment::Earnings;
use veilnet_core::state::{
    HistoryStatus, IdentityState, ServiceInfo, SessionDirection, SessionHistory, State,
};
use veilnet_session::instance::Instance;

use crate::debounce::Debouncer;
use crate::stats::Stats;

/// Source of the node's aggregated NAT status.
pub trait NatStatusProvider: Send + Sync {
    fn status(&self) -> NatStatus;
}

/// Source of the currently running service instances.
pub trait ServiceLister: Send + Sync {
    fn list(&self) -> Vec<Arc<Instance>>;
}

/// Source of the node's local identities.
pub trait IdentityProvider: Send + Sync {
    fn identities(&self) -> Vec<Identity>;
}

/// On-chain registration status lookup.
pub trait IdentityRegistry: Send + Sync {
    fn status(&self, identity: &Identity) -> RegistrationStatus;
}

/// On-chain balance lookup.
pub trait BalanceProvider: Send + Sync {
    fn balance(&self, identity: &Identity) -> u64;
}

/// Settlement-state lookup.
pub trait EarningsProvider: Send + Sync {
    fn earnings(&self, identity: &Identity) -> Earnings;
}

/// Payment-channel address derivation.
pub trait ChannelAddressCalculator: Send + Sync {
    fn channel_address(&self, identity: &Identity) -> Address;
}

/// Everything the keeper consumes. [`KeeperDeps::new`] wires inert stubs
/// for all collaborators; replace the ones the deployment actually has.
pub struct KeeperDeps {
    pub publisher: Arc<dyn Publisher>,
    pub nat_provider: Arc<dyn NatStatusProvider>,
    pub service_lister: Arc<dyn ServiceLister>,
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub identity_registry: Arc<dyn IdentityRegistry>,
    pub balance_provider: Arc<dyn BalanceProvider>,
    pub earnings_provider: Arc<dyn EarningsProvider>,
    pub channel_calculator: Arc<dyn ChannelAddressCalculator>,
}

impl KeeperDeps {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            nat_provider: Arc::new(stub::NotFinishedNat),
            service_lister: Arc::new(stub::NoServices),
            identity_provider: Arc::new(stub::NoIdentities),
            identity_registry: Arc::new(stub::Unregistered),
            balance_provider: Arc::new(stub::ZeroBalance),
            earnings_provider: Arc::new(stub::NoEarnings),
            channel_calculator: Arc::new(stub::NoChannel),
        }
    }
}

/// Inert collaborator stubs.
pub mod stub {
    use super::*;

    pub struct NotFinishedNat;
    impl NatStatusProvider for NotFinishedNat {
        fn status(&self) -> NatStatus {
            NatStatus::not_finished()
        }
    }

    pub struct NoServices;
    impl ServiceLister for NoServices {
        fn list(&self) -> Vec<Arc<Instance>> {
            Vec::new()
        }
    }

    pub struct NoIdentities;
    impl IdentityProvider for NoIdentities {
        fn identities(&self) -> Vec<Identity> {
            Vec::new()
        }
    }

    pub struct Unregistered;
    impl IdentityRegistry for Unregistered {
        fn status(&self, _identity: &Identity) -> RegistrationStatus {
            RegistrationStatus::Unregistered
        }
    }

    pub struct ZeroBalance;
    impl BalanceProvider for ZeroBalance {
        fn balance(&self, _identity: &Identity) -> u64 {
            0
        }
    }

    pub struct NoEarnings;
    impl EarningsProvider for NoEarnings {
        fn earnings(&self, _identity: &Identity) -> Earnings {
            Earnings::default()
        }
    }

    pub struct NoChannel;
    impl ChannelAddressCalculator for NoChannel {
        fn channel_address(&self, _identity: &Identity) -> Address {
            Address::default()
        }
    }
}

enum KeeperMsg {
    Apply(AppEvent),
    RefreshNat,
    RefreshServices,
}

/// Owns the node state and folds bus events into it.
pub struct Keeper {
    snapshot: Arc<RwLock<Arc<State>>>,
    queue: mpsc::UnboundedSender<KeeperMsg>,
    nat_refresh: Debouncer<()>,
    services_refresh: Debouncer<()>,
}

impl Keeper {
    /// Build the keeper and start its worker task. Must run inside a
    /// tokio runtime.
    pub fn new(deps: KeeperDeps, debounce_interval: Duration) -> Self {
        let mut initial = State::default();
        initial.identities = fetch_identities(&deps);

        let snapshot = Arc::new(RwLock::new(Arc::new(initial.clone())));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker_snapshot = snapshot.clone();
        tokio::spawn(async move {
            let mut state = initial;
            while let Some(msg) = rx.recv().await {
                if apply(&mut state, &deps, msg) {
                    *worker_snapshot.write().expect("state snapshot poisoned") =
                        Arc::new(state.clone());
                    deps.publisher.publish(AppEvent::StateChanged(state.clone()));
                }
            }
        });

        let nat_tx = tx.clone();
        let nat_refresh = Debouncer::new(debounce_interval, move |_| {
            let _ = nat_tx.send(KeeperMsg::RefreshNat);
        });
        let services_tx = tx.clone();
        let services_refresh = Debouncer::new(debounce_interval, move |_| {
            let _ = services_tx.send(KeeperMsg::RefreshServices);
        });

        Self {
            snapshot,
            queue: tx,
            nat_refresh,
            services_refresh,
        }
    }

    /// Register for every topic the keeper folds in.
    pub fn subscribe(&self, bus: &EventBus) {
        let immediate = [
            Topic::Session,
            Topic::SessionTokensEarned,
            Topic::SessionDataTransferred,
            Topic::ConnectionState,
            Topic::ConnectionStatistics,
            Topic::InvoicePaid,
            Topic::BalanceChanged,
            Topic::EarningsChanged,
            Topic::IdentityRegistration,
        ];
        for topic in immediate {
            let queue = self.queue.clone();
            bus.subscribe(topic, move |ev| {
                let _ = queue.send(KeeperMsg::Apply(ev.clone()));
            });
        }

        let nat = self.nat_refresh.clone();
        bus.subscribe(Topic::NatEvent, move |_| nat.trigger(()));

        let services = self.services_refresh.clone();
        bus.subscribe(Topic::ServiceStatus, move |_| services.trigger(()));
    }

    /// Deep copy of the current snapshot.
    pub fn state(&self) -> State {
        self.snapshot
            .read()
            .expect("state snapshot poisoned")
            .as_ref()
            .clone()
    }

    /// Aggregate statistics over the live session view.
    pub fn session_stats(&self) -> Stats {
        crate::stats::aggregate(&self.state().sessions)
    }
}

fn fetch_identities(deps: &KeeperDeps) -> Vec<IdentityState> {
    deps.identity_provider
        .identities()
        .into_iter()
        .map(|identity| IdentityState {
            registration_status: deps.identity_registry.status(&identity),
            channel_address: deps.channel_calculator.channel_address(&identity),
            balance: deps.balance_provider.balance(&identity),
            earnings: deps.earnings_provider.earnings(&identity).unsettled_balance,
            earnings_total: deps.earnings_provider.earnings(&identity).lifetime_balance,
            address: identity,
        })
        .collect()
}

fn apply(state: &mut State, deps: &KeeperDeps, msg: KeeperMsg) -> bool {
    match msg {
        KeeperMsg::RefreshNat => {
            state.nat_status = deps.nat_provider.status();
            true
        }
        KeeperMsg::RefreshServices => {
            state.services = build_services(state, deps);
            true
        }
        KeeperMsg::Apply(event) => apply_event(state, event),
    }
}

/// Rebuild the service list, preserving connection counters across
/// refreshes.
fn build_services(state: &State, deps: &KeeperDeps) -> Vec<ServiceInfo> {
    deps.service_lister
        .list()
        .into_iter()
        .map(|instance| ServiceInfo {
            id: instance.id().to_string(),
            provider_id: instance.provider_id().clone(),
            service_type: instance.service_type().to_string(),
            options: instance.options().clone(),
            status: instance.state(),
            proposal: instance.proposal().clone(),
            connection_statistics: state
                .services
                .iter()
                .find(|s| s.id == instance.id())
                .map(|s| s.connection_statistics)
                .unwrap_or_default(),
        })
        .collect()
}

fn apply_event(state: &mut State, event: AppEvent) -> bool {
    match event {
        AppEvent::Session(e) => match e.status {
            SessionStatus::Created => {
                state.sessions.push(SessionHistory {
                    session_id: e.session.id.clone(),
                    direction: SessionDirection::Provided,
                    consumer_id: e.session.consumer_id.clone(),
                    accountant_id: e.session.accountant_id,
                    provider_country: e.session.proposal.service_definition.location.country.clone(),
                    consumer_country: e.session.consumer_location.country.clone(),
                    started: e.session.started_at,
                    status: HistoryStatus::New,
                    tokens: 0,
                    data_sent: 0,
                    data_received: 0,
                });
                increment_connect_count(state, &e.service.id, false);
                true
            }
            SessionStatus::Removed => {
                // Completed records belong to external history storage;
                // the keeper only serves the live view.
                let before = state.sessions.len();
                state.sessions.retain(|s| s.session_id != e.session.id);
                before != state.sessions.len()
            }
            SessionStatus::Acknowledged => {
                increment_connect_count(state, &e.service.id, true);
                true
            }
        },
        AppEvent::TokensEarned(e) => {
            if let Some(session) = session_mut(state, &e.session_id) {
                session.tokens = e.total;
                true
            } else {
                false
            }
        }
        AppEvent::DataTransferred(e) => {
            // The event counts from the consumer's perspective: its `up`
            // is what this provider received, its `down` what we sent.
            // The inversion lives here and nowhere else.
            if let Some(session) = session_mut(state, &e.session_id) {
                session.data_sent = e.down;
                session.data_received = e.up;
                true
            } else {
                false
            }
        }
        AppEvent::ConnectionState(e) => {
            state.connection.session = e.session;
            true
        }
        AppEvent::ConnectionStatistics(stats) => {
            state.connection.statistics = stats;
            true
        }
        AppEvent::InvoicePaid(e) => {
            state.connection.invoice = e.invoice;
            true
        }
        AppEvent::BalanceChanged(e) => {
            if let Some(identity) = identity_mut(state, &e.identity) {
                identity.balance = e.current;
                true
            } else {
                false
            }
        }
        AppEvent::EarningsChanged(e) => {
            if let Some(identity) = identity_mut(state, &e.identity) {
                identity.earnings = e.current.unsettled_balance;
                identity.earnings_total = e.current.lifetime_balance;
                true
            } else {
                false
            }
        }
        AppEvent::IdentityRegistration(e) => {
            if let Some(identity) = identity_mut(state, &e.identity) {
                identity.registration_status = e.status;
                true
            } else {
                false
            }
        }
        other => {
            debug!(topic = ?other.topic(), "event not folded into state");
            false
        }
    }
}

fn session_mut<'a>(
    state: &'a mut State,
    id: &veilnet_core::event::SessionId,
) -> Option<&'a mut SessionHistory> {
    state.sessions.iter_mut().find(|s| &s.session_id == id)
}

fn identity_mut<'a>(state: &'a mut State, identity: &Identity) -> Option<&'a mut IdentityState> {
    state.identities.iter_mut().find(|i| &i.address == identity)
}

/// A successful connect bumps the success counter, a fresh attempt the
/// attempt counter.
fn increment_connect_count(state: &mut State, service_id: &str, success: bool) {
    if let Some(service) = state.services.iter_mut().find(|s| s.id == service_id) {
        if success {
            service.connection_statistics.successful += 1;
        } else {
            service.connection_statistics.attempted += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;
    use veilnet_core::event::{
        BalanceChanged, ConnectionState, ConnectionStateChanged, ConnectionStatus, DataTransferred,
        EarningsChanged, IdentityRegistration, InvoicePaid, ServiceStatusChanged, SessionContext,
        SessionEvent, SessionId, TokensEarned,
    };
    use veilnet_core::nat::NatEvent;
    use veilnet_core::payment::Invoice;
    use veilnet_core::proposal::{Location, ServiceDefinition, ServiceProposal};
    use veilnet_core::service::ServiceState;
    use veilnet_core::state::ConnectionStatistics;
    use veilnet_session::config_provider::StaticConfigProvider;
    use veilnet_session::instance::NoDiscovery;
    use veilnet_session::policy::PolicyRepository;

    async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    struct CountingNat {
        status: NatStatus,
        interactions: AtomicUsize,
    }

    impl NatStatusProvider for CountingNat {
        fn status(&self) -> NatStatus {
            self.interactions.fetch_add(1, Ordering::SeqCst);
            self.status.clone()
        }
    }

    struct CountingLister {
        services: Mutex<Vec<Arc<Instance>>>,
        interactions: AtomicUsize,
    }

    impl ServiceLister for CountingLister {
        fn list(&self) -> Vec<Arc<Instance>> {
            self.interactions.fetch_add(1, Ordering::SeqCst);
            self.services.lock().unwrap().clone()
        }
    }

    struct OneIdentity(Identity);

    impl IdentityProvider for OneIdentity {
        fn identities(&self) -> Vec<Identity> {
            vec![self.0.clone()]
        }
    }

    fn test_instance(id: &str) -> Arc<Instance> {
        Arc::new(Instance::new(
            id,
            "wireguard",
            Identity::from_address("provider"),
            serde_json::json!({"port": 51820}),
            ServiceProposal {
                id: 7,
                service_type: "wireguard".to_string(),
                provider_id: Identity::from_address("provider"),
                ..Default::default()
            },
            ServiceState::Running,
            Arc::new(PolicyRepository::new()),
            Arc::new(NoDiscovery),
            Arc::new(StaticConfigProvider::new(serde_json::json!({}))),
        ))
    }

    fn session_context(id: &str) -> SessionContext {
        SessionContext {
            id: SessionId::new(id),
            started_at: Utc::now(),
            consumer_id: Identity::from_address("0x1"),
            consumer_location: Location::country("GB"),
            accountant_id: Address::parse("0xa").unwrap(),
            proposal: ServiceProposal {
                service_definition: ServiceDefinition {
                    location: Location::country("MU"),
                },
                ..Default::default()
            },
        }
    }

    fn session_event(status: SessionStatus, service_id: &str, session_id: &str) -> AppEvent {
        AppEvent::Session(SessionEvent {
            status,
            service: veilnet_core::event::ServiceContext {
                id: service_id.to_string(),
            },
            session: session_context(session_id),
        })
    }

    fn keeper_on(bus: &Arc<EventBus>) -> Keeper {
        let deps = KeeperDeps::new(bus.clone());
        let keeper = Keeper::new(deps, Duration::from_millis(1));
        keeper.subscribe(bus);
        keeper
    }

    #[tokio::test]
    async fn nat_events_are_debounced_into_one_refresh() {
        let bus = Arc::new(EventBus::new());
        let nat = Arc::new(CountingNat {
            status: NatStatus {
                status: "failure".to_string(),
                error: "explosive bolts failed".to_string(),
            },
            interactions: AtomicUsize::new(0),
        });

        let mut deps = KeeperDeps::new(bus.clone());
        deps.nat_provider = nat.clone();
        let keeper = Keeper::new(deps, Duration::from_millis(3));
        keeper.subscribe(&bus);

        for _ in 0..5 {
            bus.publish(AppEvent::Nat(NatEvent::failure(
                "booster separation",
                "explosive bolts failed",
            )));
        }

        assert!(eventually(|| nat.interactions.load(Ordering::SeqCst) == 1).await);
        assert_eq!(keeper.state().nat_status.status, "failure");
        assert_eq!(keeper.state().nat_status.error, "explosive bolts failed");
    }

    #[tokio::test]
    async fn session_created_and_removed_fold_into_history() {
        let bus = Arc::new(EventBus::new());
        let keeper = keeper_on(&bus);

        bus.publish(session_event(SessionStatus::Created, "svc", "1"));
        assert!(eventually(|| keeper.state().sessions.len() == 1).await);

        let state = keeper.state();
        let record = &state.sessions[0];
        assert_eq!(record.session_id, SessionId::new("1"));
        assert_eq!(record.direction, SessionDirection::Provided);
        assert_eq!(record.consumer_id, Identity::from_address("0x1"));
        assert_eq!(record.accountant_id, Address::parse("0xa").unwrap());
        assert_eq!(record.provider_country, "MU");
        assert_eq!(record.consumer_country, "GB");
        assert_eq!(record.status, HistoryStatus::New);

        bus.publish(session_event(SessionStatus::Removed, "svc", "1"));
        assert!(eventually(|| keeper.state().sessions.is_empty()).await);
    }

    #[tokio::test]
    async fn acknowledge_increments_service_success_count() {
        let bus = Arc::new(EventBus::new());
        let lister = Arc::new(CountingLister {
            services: Mutex::new(vec![test_instance("svc")]),
            interactions: AtomicUsize::new(0),
        });
        let mut deps = KeeperDeps::new(bus.clone());
        deps.service_lister = lister;
        let keeper = Keeper::new(deps, Duration::from_millis(1));
        keeper.subscribe(&bus);

        bus.publish(AppEvent::ServiceStatus(ServiceStatusChanged {
            id: "svc".to_string(),
            status: ServiceState::Running,
        }));
        assert!(eventually(|| keeper.state().services.len() == 1).await);

        bus.publish(session_event(SessionStatus::Created, "svc", "1"));
        bus.publish(session_event(SessionStatus::Acknowledged, "svc", "1"));

        assert!(
            eventually(|| {
                keeper
                    .state()
                    .services
                    .first()
                    .map(|s| s.connection_statistics.successful == 1
                        && s.connection_statistics.attempted == 1)
                    .unwrap_or(false)
            })
            .await
        );
    }

    #[tokio::test]
    async fn tokens_earned_update_session() {
        let bus = Arc::new(EventBus::new());
        let keeper = keeper_on(&bus);

        bus.publish(session_event(SessionStatus::Created, "svc", "1"));
        assert!(eventually(|| keeper.state().sessions.len() == 1).await);

        bus.publish(AppEvent::TokensEarned(TokensEarned {
            session_id: SessionId::new("1"),
            total: 500,
        }));
        assert!(eventually(|| keeper.state().sessions[0].tokens == 500).await);
    }

    #[tokio::test]
    async fn data_transferred_is_inverted_at_the_boundary() {
        let bus = Arc::new(EventBus::new());
        let keeper = keeper_on(&bus);

        bus.publish(session_event(SessionStatus::Created, "svc", "1"));
        assert!(eventually(|| keeper.state().sessions.len() == 1).await);

        bus.publish(AppEvent::DataTransferred(DataTransferred {
            session_id: SessionId::new("1"),
            up: 1,
            down: 2,
        }));

        assert!(
            eventually(|| {
                let sessions = keeper.state().sessions;
                sessions[0].data_sent == 2 && sessions[0].data_received == 1
            })
            .await
        );
    }

    #[tokio::test]
    async fn service_status_bursts_refresh_the_list_once() {
        let bus = Arc::new(EventBus::new());
        let lister = Arc::new(CountingLister {
            services: Mutex::new(vec![test_instance("svc")]),
            interactions: AtomicUsize::new(0),
        });
        let mut deps = KeeperDeps::new(bus.clone());
        deps.service_lister = lister.clone();
        let keeper = Keeper::new(deps, Duration::from_millis(3));
        keeper.subscribe(&bus);

        for _ in 0..5 {
            bus.publish(AppEvent::ServiceStatus(ServiceStatusChanged {
                id: "svc".to_string(),
                status: ServiceState::Running,
            }));
        }

        assert!(eventually(|| lister.interactions.load(Ordering::SeqCst) == 1).await);

        let services = keeper.state().services;
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].id, "svc");
        assert_eq!(services[0].service_type, "wireguard");
        assert_eq!(services[0].provider_id, Identity::from_address("provider"));
        assert_eq!(services[0].status, ServiceState::Running);
        assert_eq!(services[0].options["port"], 51820);
        assert_eq!(services[0].proposal.id, 7);
    }

    #[tokio::test]
    async fn connection_events_update_connection_view() {
        let bus = Arc::new(EventBus::new());
        let keeper = keeper_on(&bus);
        assert_eq!(
            keeper.state().connection.session.state,
            ConnectionState::NotConnected
        );

        bus.publish(AppEvent::ConnectionState(ConnectionStateChanged {
            state: ConnectionState::Connected,
            session: ConnectionStatus {
                state: ConnectionState::Connected,
                session_id: Some(SessionId::new("1")),
            },
        }));
        assert!(
            eventually(|| keeper.state().connection.session.state == ConnectionState::Connected)
                .await
        );

        let stats = ConnectionStatistics {
            at: Some(Utc::now()),
            bytes_received: 10 * 1024 * 1024,
            bytes_sent: 500 * 1024,
        };
        bus.publish(AppEvent::ConnectionStatistics(stats.clone()));
        assert!(eventually(|| keeper.state().connection.statistics == stats).await);

        let invoice = Invoice {
            agreement_id: 1,
            agreement_total: 1001,
            transactor_fee: 10,
            ..Default::default()
        };
        bus.publish(AppEvent::InvoicePaid(InvoicePaid {
            invoice: invoice.clone(),
        }));
        assert!(eventually(|| keeper.state().connection.invoice == invoice).await);
    }

    #[tokio::test]
    async fn balance_earnings_and_registration_update_identity() {
        let bus = Arc::new(EventBus::new());
        let identity = Identity::from_address("0x000000000000000000000000000000000000000a");
        let mut deps = KeeperDeps::new(bus.clone());
        deps.identity_provider = Arc::new(OneIdentity(identity.clone()));
        let keeper = Keeper::new(deps, Duration::from_millis(1));
        keeper.subscribe(&bus);

        assert_eq!(keeper.state().identities[0].balance, 0);
        assert_eq!(
            keeper.state().identities[0].registration_status,
            RegistrationStatus::Unregistered
        );

        bus.publish(AppEvent::BalanceChanged(BalanceChanged {
            identity: identity.clone(),
            previous: 0,
            current: 999,
        }));
        assert!(eventually(|| keeper.state().identities[0].balance == 999).await);

        bus.publish(AppEvent::EarningsChanged(EarningsChanged {
            identity: identity.clone(),
            previous: Earnings::default(),
            current: Earnings {
                lifetime_balance: 100,
                unsettled_balance: 10,
            },
        }));
        assert!(
            eventually(|| {
                let id = &keeper.state().identities[0];
                id.earnings == 10 && id.earnings_total == 100
            })
            .await
        );

        bus.publish(AppEvent::IdentityRegistration(IdentityRegistration {
            identity: identity.clone(),
            status: RegistrationStatus::RegisteredConsumer,
        }));
        assert!(
            eventually(|| keeper.state().identities[0].registration_status
                == RegistrationStatus::RegisteredConsumer)
            .await
        );
    }

    #[tokio::test]
    async fn snapshots_are_immutable() {
        let bus = Arc::new(EventBus::new());
        let keeper = keeper_on(&bus);

        bus.publish(session_event(SessionStatus::Created, "svc", "1"));
        assert!(eventually(|| keeper.state().sessions.len() == 1).await);

        let before = keeper.state();
        assert_eq!(before, keeper.state());

        bus.publish(AppEvent::TokensEarned(TokensEarned {
            session_id: SessionId::new("1"),
            total: 500,
        }));
        assert!(eventually(|| keeper.state().sessions[0].tokens == 500).await);

        // The earlier snapshot is untouched by later events.
        assert_eq!(before.sessions[0].tokens, 0);
    }

    #[tokio::test]
    async fn every_mutation_publishes_state_changed() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(Topic::StateChanged, move |ev| {
            if let AppEvent::StateChanged(state) = ev {
                sink.lock().unwrap().push(state.sessions.len());
            }
        });

        let keeper = keeper_on(&bus);
        bus.publish(session_event(SessionStatus::Created, "svc", "1"));
        assert!(eventually(|| keeper.state().sessions.len() == 1).await);

        assert!(eventually(|| seen.lock().unwrap().last() == Some(&1)).await);
    }

    #[tokio::test]
    async fn events_for_unknown_sessions_are_ignored() {
        let bus = Arc::new(EventBus::new());
        let keeper = keeper_on(&bus);

        bus.publish(AppEvent::TokensEarned(TokensEarned {
            session_id: SessionId::new("ghost"),
            total: 500,
        }));
        bus.publish(AppEvent::DataTransferred(DataTransferred {
            session_id: SessionId::new("ghost"),
            up: 1,
            down: 2,
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(keeper.state().sessions.is_empty());
    }
}
