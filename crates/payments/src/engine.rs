//! The per-session invoicing loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::watch;
use tracing::{debug, warn};

use veilnet_bus::Publisher;
use veilnet_core::config::PaymentConfig;
use veilnet_core::event::{AppEvent, SessionId, TokensEarned};
use veilnet_core::identity::{Address, Identity};
use veilnet_core::payment::{ExchangeMessage, Invoice};
use veilnet_core::proposal::PaymentMethod;
use veilnet_session::p2p::{Channel, Message, TOPIC_PAYMENT_INVOICE};
use veilnet_session::payment::{PaymentEngine, PaymentEngineFactory, PaymentError};

use crate::earnings::EarningsTracker;

/// Supplies the bytes-moved counter maintained by the service data plane.
pub trait DataTransferSource: Send + Sync {
    /// Total bytes moved through the session so far.
    fn bytes_transferred(&self, session_id: &SessionId) -> u64;
}

/// Data source for services without a byte counter; only the time
/// component of the payment method bills anything.
pub struct NoTraffic;

impl DataTransferSource for NoTraffic {
    fn bytes_transferred(&self, _session_id: &SessionId) -> u64 {
        0
    }
}

#[derive(Debug, Clone)]
enum FirstInvoice {
    Pending,
    Paid,
    Failed(PaymentError),
}

/// One session's invoicing loop.
///
/// Fires on a ticker of the configured invoice frequency. Each tick bills
/// everything owed since the session started, bumping the cumulative
/// agreement total, and waits for the consumer's signed acknowledgement.
/// Unacknowledged value beyond the configured cutoff kills the engine,
/// which in turn makes the session manager destroy the session.
pub struct InvoiceEngine {
    session_id: SessionId,
    consumer_id: Identity,
    provider_id: Identity,
    accountant_id: Address,
    recipient: Address,
    payment_method: PaymentMethod,
    config: PaymentConfig,
    channel: Arc<dyn Channel>,
    data_source: Arc<dyn DataTransferSource>,
    publisher: Arc<dyn Publisher>,
    earnings: Arc<EarningsTracker>,
    stop: watch::Sender<bool>,
    first_invoice: watch::Sender<FirstInvoice>,
    agreement_id: u64,
    agreement_total: AtomicU64,
    settled_total: AtomicU64,
}

impl InvoiceEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        consumer_id: Identity,
        provider_id: Identity,
        accountant_id: Address,
        payment_method: PaymentMethod,
        config: PaymentConfig,
        channel: Arc<dyn Channel>,
        data_source: Arc<dyn DataTransferSource>,
        publisher: Arc<dyn Publisher>,
        earnings: Arc<EarningsTracker>,
    ) -> Self {
        let recipient = Address::parse(provider_id.address()).unwrap_or_default();
        let (stop, _) = watch::channel(false);
        let (first_invoice, _) = watch::channel(FirstInvoice::Pending);
        Self {
            session_id,
            consumer_id,
            provider_id,
            accountant_id,
            recipient,
            payment_method,
            config,
            channel,
            data_source,
            publisher,
            earnings,
            stop,
            first_invoice,
            agreement_id: rand::thread_rng().next_u64(),
            agreement_total: AtomicU64::new(0),
            settled_total: AtomicU64::new(0),
        }
    }

    /// Cumulative amount issued so far. Observer-only; the engine task is
    /// the single writer.
    pub fn agreement_total(&self) -> u64 {
        self.agreement_total.load(Ordering::SeqCst)
    }

    /// Issue the invoice due at this tick and settle it with the consumer.
    async fn tick(&self, started: Instant) -> Result<(), PaymentError> {
        let transferred = self.data_source.bytes_transferred(&self.session_id);
        let owed = self.payment_method.amount_owed(transferred, started.elapsed());

        // The agreement total never decreases, whatever the counters say.
        let total = self.agreement_total.load(Ordering::SeqCst).max(owed);
        self.agreement_total.store(total, Ordering::SeqCst);

        let invoice = Invoice {
            agreement_id: self.agreement_id,
            agreement_total: total,
            transactor_fee: 0,
            hashlock: random_hashlock(),
            recipient: self.recipient,
        };

        match self.exchange(&invoice).await {
            Ok(_exchange) => {
                let previous = self.settled_total.swap(total, Ordering::SeqCst);
                let earned = total.saturating_sub(previous);
                if earned > 0 {
                    self.earnings.register(&self.provider_id, earned);
                }
                self.publisher.publish(AppEvent::TokensEarned(TokensEarned {
                    session_id: self.session_id.clone(),
                    total,
                }));
                self.first_invoice.send_if_modified(|state| match state {
                    FirstInvoice::Pending => {
                        *state = FirstInvoice::Paid;
                        true
                    }
                    _ => false,
                });
                Ok(())
            }
            Err(e) => {
                let unpaid = total.saturating_sub(self.settled_total.load(Ordering::SeqCst));
                if unpaid > self.config.max_unpaid_invoice_value {
                    warn!(
                        session = %self.session_id,
                        unpaid,
                        "unpaid invoice value exceeded, giving up: {e}",
                    );
                    return Err(PaymentError::Unpaid);
                }
                warn!(session = %self.session_id, unpaid, "invoice not acknowledged: {e}");
                Ok(())
            }
        }
    }

    /// Send the invoice and await the consumer's exchange message,
    /// retrying transient channel failures with exponential backoff
    /// bounded by one tick period.
    async fn exchange(&self, invoice: &Invoice) -> Result<ExchangeMessage, PaymentError> {
        let message =
            Message::encode(invoice).map_err(|e| PaymentError::Channel(e.to_string()))?;

        let budget = self.config.invoice_frequency;
        let started = Instant::now();
        let mut delay = budget / 16;

        loop {
            match self.channel.send(TOPIC_PAYMENT_INVOICE, &message).await {
                Ok(reply) => {
                    let exchange: ExchangeMessage = reply
                        .decode()
                        .map_err(|e| PaymentError::Channel(e.to_string()))?;
                    if exchange.agreement_id != invoice.agreement_id
                        || exchange.agreement_total < invoice.agreement_total
                    {
                        return Err(PaymentError::Payment(
                            "acknowledged total below issued invoice".to_string(),
                        ));
                    }
                    return Ok(exchange);
                }
                Err(e) => {
                    if started.elapsed() + delay >= budget {
                        return Err(PaymentError::Channel(e.to_string()));
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(budget / 2);
                }
            }
        }
    }

    fn fail_first_invoice(&self, error: PaymentError) {
        self.first_invoice.send_if_modified(|state| match state {
            FirstInvoice::Pending => {
                *state = FirstInvoice::Failed(error);
                true
            }
            _ => false,
        });
    }
}

#[async_trait]
impl PaymentEngine for InvoiceEngine {
    async fn start(&self) -> Result<(), PaymentError> {
        debug!(
            session = %self.session_id,
            consumer = %self.consumer_id,
            accountant = %self.accountant_id,
            "invoice engine starting",
        );
        let started = Instant::now();
        let mut stop_rx = self.stop.subscribe();
        // Stop may have been requested before the loop ever ran.
        if *stop_rx.borrow_and_update() {
            return Ok(());
        }
        let mut ticker = tokio::time::interval(self.config.invoice_frequency);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                _ = stop_rx.changed() => break Ok(()),
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(started).await {
                        break Err(e);
                    }
                }
            }
        };

        if let Err(e) = &result {
            self.fail_first_invoice(e.clone());
        }
        // Final earnings announcement for whoever missed the per-tick ones.
        self.publisher.publish(AppEvent::TokensEarned(TokensEarned {
            session_id: self.session_id.clone(),
            total: self.settled_total.load(Ordering::SeqCst),
        }));
        debug!(session = %self.session_id, "invoice engine stopped");
        result
    }

    fn stop(&self) {
        let _ = self.stop.send(true);
    }

    async fn wait_first_invoice(&self, timeout: Duration) -> Result<(), PaymentError> {
        let mut rx = self.first_invoice.subscribe();
        let wait = async {
            loop {
                let state = rx.borrow_and_update().clone();
                match state {
                    FirstInvoice::Paid => return Ok(()),
                    FirstInvoice::Failed(e) => return Err(e),
                    FirstInvoice::Pending => {}
                }
                if rx.changed().await.is_err() {
                    return Err(PaymentError::Channel("engine dropped".to_string()));
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| PaymentError::Timeout)?
    }
}

fn random_hashlock() -> String {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    hex::encode(raw)
}

/// Builds an [`InvoiceEngine`] per admitted session.
pub struct InvoiceEngineFactory {
    payment_method: PaymentMethod,
    config: PaymentConfig,
    channel: Arc<dyn Channel>,
    data_source: Arc<dyn DataTransferSource>,
    publisher: Arc<dyn Publisher>,
    earnings: Arc<EarningsTracker>,
}

impl InvoiceEngineFactory {
    pub fn new(
        payment_method: PaymentMethod,
        config: PaymentConfig,
        channel: Arc<dyn Channel>,
        data_source: Arc<dyn DataTransferSource>,
        publisher: Arc<dyn Publisher>,
        earnings: Arc<EarningsTracker>,
    ) -> Self {
        Self {
            payment_method,
            config,
            channel,
            data_source,
            publisher,
            earnings,
        }
    }
}

impl PaymentEngineFactory for InvoiceEngineFactory {
    fn create(
        &self,
        consumer: &Identity,
        provider: &Identity,
        accountant: &Address,
        session_id: &SessionId,
        payment_version: &str,
    ) -> Result<Arc<dyn PaymentEngine>, PaymentError> {
        debug!(session = %session_id, version = payment_version, "building invoice engine");
        Ok(Arc::new(InvoiceEngine::new(
            session_id.clone(),
            consumer.clone(),
            provider.clone(),
            *accountant,
            self.payment_method,
            self.config,
            self.channel.clone(),
            self.data_source.clone(),
            self.publisher.clone(),
            self.earnings.clone(),
        )))
    }
}
