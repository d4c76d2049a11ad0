//! Per-service session orchestration.
//!
//! The manager owns admission: it validates the consumer and proposal,
//! allocates the session, supervises the payment engine, asks the service
//! for a session config, and evicts stale sessions of the same consumer.
//! Teardown runs through a single idempotent path whether it is triggered
//! by the consumer, a payment failure, the service stopping or eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use veilnet_bus::trace::Tracer;
use veilnet_bus::Publisher;
use veilnet_core::config::SessionConfig;
use veilnet_core::event::{AppEvent, ServiceContext, SessionEvent, SessionId, SessionStatus};
use veilnet_core::identity::{Address, Identity};
use veilnet_core::service::ServiceState;

use crate::instance::Instance;
use crate::p2p::SessionRequest;
use crate::payment::{PaymentEngine, PaymentEngineFactory, PaymentError};
use crate::pool::SessionPool;
use crate::session::Session;
use crate::{Result, SessionError};

pub const TRACE_SESSION_CREATE: &str = "Provider whole session create";
pub const TRACE_SESSION_START: &str = "Provider session start";
pub const TRACE_PAYMENTS: &str = "Provider payments";
pub const TRACE_CONFIG: &str = "Provider config";

/// Orchestrates sessions for one running service.
pub struct SessionManager {
    service: Arc<Instance>,
    sessions: Arc<SessionPool>,
    engine_factory: Arc<dyn PaymentEngineFactory>,
    publisher: Arc<dyn Publisher>,
    config: SessionConfig,
    engines: Mutex<HashMap<SessionId, Arc<dyn PaymentEngine>>>,
}

impl SessionManager {
    pub fn new(
        service: Arc<Instance>,
        sessions: Arc<SessionPool>,
        engine_factory: Arc<dyn PaymentEngineFactory>,
        publisher: Arc<dyn Publisher>,
        config: SessionConfig,
    ) -> Self {
        Self {
            service,
            sessions,
            engine_factory,
            publisher,
            config,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Admit a new session.
    ///
    /// On success the session is in the pool with a running payment engine
    /// and a persisted service config. On any failure everything allocated
    /// so far is rolled back before returning.
    pub async fn start(self: &Arc<Self>, request: &SessionRequest) -> Result<Arc<Session>> {
        let mut tracer = Tracer::new(TRACE_SESSION_CREATE);
        tracer.stage(TRACE_SESSION_START);

        let consumer_id = match self.validate_consumer(request) {
            Ok(id) => id,
            Err(e) => {
                tracer.finish(self.publisher.as_ref(), "");
                return Err(e);
            }
        };
        if let Err(e) = self.validate_proposal(request, &consumer_id) {
            tracer.finish(self.publisher.as_ref(), "");
            return Err(e);
        }

        let accountant_id = request
            .consumer
            .as_ref()
            .map(|c| Address::parse(&c.hermes_id).unwrap_or_default())
            .unwrap_or_default();
        let payment_version = request
            .consumer
            .as_ref()
            .map(|c| c.payment_version.clone())
            .unwrap_or_default();

        let session = Arc::new(Session::new(
            SessionId::random(),
            consumer_id.clone(),
            accountant_id,
            self.service.provider_id().clone(),
            self.service.proposal().clone(),
            self.service.id().to_string(),
        ));
        self.sessions.add(session.clone());
        info!(session = %session.id(), consumer = %consumer_id, "session created");

        tracer.stage(TRACE_PAYMENTS);
        if let Err(e) = self.start_payments(&session, &payment_version).await {
            tracer.finish(self.publisher.as_ref(), session.id().as_str());
            self.teardown(&session);
            return Err(e);
        }

        tracer.stage(TRACE_CONFIG);
        if let Err(e) = self.provide_config(request, &session) {
            tracer.finish(self.publisher.as_ref(), session.id().as_str());
            self.teardown(&session);
            return Err(e);
        }

        self.evict_stale_sessions(&session);
        tracer.finish(self.publisher.as_ref(), session.id().as_str());
        Ok(session)
    }

    /// Record that the consumer observed the service. Does not affect the
    /// session's running state.
    pub fn acknowledge(&self, consumer_id: &Identity, session_id: &SessionId) -> Result<()> {
        let session = self.authorized(consumer_id, session_id)?;
        self.publisher.publish(AppEvent::Session(SessionEvent {
            status: SessionStatus::Acknowledged,
            service: ServiceContext {
                id: session.service_id().to_string(),
            },
            session: session.context(),
        }));
        Ok(())
    }

    /// Tear a session down on the consumer's request.
    pub fn destroy(&self, consumer_id: &Identity, session_id: &SessionId) -> Result<()> {
        let session = self.authorized(consumer_id, session_id)?;
        info!(session = %session.id(), "session destroyed by consumer");
        self.teardown(&session);
        Ok(())
    }

    /// Tear down every live session; used when the service stops.
    pub fn destroy_all(&self) {
        for session in self.sessions.get_all() {
            self.teardown(&session);
        }
    }

    fn validate_consumer(&self, request: &SessionRequest) -> Result<Identity> {
        let consumer = request
            .consumer
            .as_ref()
            .ok_or(SessionError::InvalidConsumerId)?;
        Identity::parse(&consumer.id).map_err(|_| SessionError::InvalidConsumerId)
    }

    fn validate_proposal(&self, request: &SessionRequest, consumer_id: &Identity) -> Result<()> {
        if self.service.state() != ServiceState::Running
            || self.service.proposal().id != request.proposal_id
        {
            return Err(SessionError::InvalidProposal);
        }
        if !self.service.policies().is_allowed(consumer_id) {
            return Err(SessionError::ConsumerNotAllowed);
        }
        Ok(())
    }

    /// Build and launch the payment engine, then gate admission on the
    /// first acknowledged invoice.
    async fn start_payments(
        self: &Arc<Self>,
        session: &Arc<Session>,
        payment_version: &str,
    ) -> Result<()> {
        let engine = self
            .engine_factory
            .create(
                session.consumer_id(),
                session.provider_id(),
                session.accountant_id(),
                session.id(),
                payment_version,
            )
            .map_err(SessionError::PaymentEngine)?;
        self.engines
            .lock()
            .expect("engine registry poisoned")
            .insert(session.id().clone(), engine.clone());

        // Post-admission engine failures destroy the session internally;
        // they are never surfaced to the original requester.
        let manager = Arc::clone(self);
        let supervised = session.clone();
        let running = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = running.start().await {
                warn!(session = %supervised.id(), "payment engine failed: {e}");
                manager.teardown(&supervised);
            }
        });

        match engine
            .wait_first_invoice(self.config.first_invoice_timeout)
            .await
        {
            Ok(()) => Ok(()),
            Err(PaymentError::Timeout) => Err(SessionError::FirstInvoiceTimeout),
            Err(e) => Err(SessionError::FirstInvoice(e)),
        }
    }

    fn provide_config(&self, request: &SessionRequest, session: &Arc<Session>) -> Result<()> {
        let params = self
            .service
            .config_provider()
            .provide(&request.config)
            .map_err(SessionError::ServiceConfig)?;
        session.set_config(params.session_config);
        if let Some(hook) = params.destroy_callback {
            session.set_cleanup(hook);
        }
        Ok(())
    }

    /// Keep at most one live session per consumer on this service.
    fn evict_stale_sessions(&self, fresh: &Arc<Session>) {
        let stale = self.sessions.find_by(|s| {
            s.consumer_id() == fresh.consumer_id() && s.id() != fresh.id()
        });
        for session in stale {
            debug!(session = %session.id(), "evicting stale session");
            self.teardown(&session);
        }
    }

    fn authorized(&self, consumer_id: &Identity, session_id: &SessionId) -> Result<Arc<Session>> {
        let session = self
            .sessions
            .find(session_id)
            .ok_or(SessionError::SessionNotExists)?;
        if session.consumer_id() != consumer_id {
            return Err(SessionError::WrongSessionOwner);
        }
        Ok(session)
    }

    /// The single teardown path: stop payments, run the cleanup hook,
    /// remove from the pool. Idempotent via the session's done signal.
    fn teardown(&self, session: &Arc<Session>) {
        if !session.done().signal() {
            return;
        }
        if let Some(engine) = self
            .engines
            .lock()
            .expect("engine registry poisoned")
            .remove(session.id())
        {
            engine.stop();
        }
        if let Some(cleanup) = session.take_cleanup() {
            cleanup();
        }
        self.sessions.remove(session.id());
    }
}
