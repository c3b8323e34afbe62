//! Ledger service facade
//!
//! Wires the credit ledger, the invoice aggregator and the recurrence engine
//! to one set of ports and exposes the operations a POS or back office calls.
//! The `ledger-worker` binary uses the same facade to drive the scheduler.
//!
//! # Example
//!
//! ```rust
//! use interface_service::{LedgerPorts, LedgerService, ServiceConfig};
//! use core_kernel::SystemClock;
//! use std::sync::Arc;
//!
//! let ports = LedgerPorts::in_memory(Arc::new(SystemClock));
//! let service = LedgerService::new(ports, &ServiceConfig::default()).unwrap();
//! assert_eq!(service.ledger().currency().code(), "BDT");
//! ```

pub mod config;
pub mod error;
pub mod notify;

pub use config::ServiceConfig;
pub use error::{ErrorResponse, ServiceError};
pub use notify::TracingNotificationSender;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use core_kernel::{
    Clock, CreditEntryId, CustomerId, HealthCheckResult, HealthCheckable, InvoiceId, Money,
    ObligationId, OccurrenceId, ShopId,
};
use domain_credit::memory::{InMemoryCreditStore, InMemoryCustomerDirectory};
use domain_credit::{
    CreditEntry, CreditLedger, CreditStore, CustomerDirectory, CustomerNotifier, Invoice,
    InvoiceAggregator, InvoiceDelivery, NotificationSender, OpenCredit,
};
use domain_recurrence::memory::InMemoryObligationStore;
use domain_recurrence::{
    MaterializedOccurrence, ObligationDraft, ObligationStore, RecurrenceEngine, RecurrenceObserver,
    RecurringObligation, SchedulerConfig, SchedulerDriver, TickReport, TracingObserver,
};
use infra_db::{
    create_pool, run_migrations, PostgresCreditStore, PostgresCustomerDirectory,
    PostgresObligationStore,
};

/// Every port the services depend on
pub struct LedgerPorts {
    pub credit_store: Arc<dyn CreditStore>,
    pub obligation_store: Arc<dyn ObligationStore>,
    pub directory: Arc<dyn CustomerDirectory>,
    pub sender: Arc<dyn NotificationSender>,
    pub clock: Arc<dyn Clock>,
    pub observer: Arc<dyn RecurrenceObserver>,
    /// Adapters probed by [`LedgerService::health`]
    pub health: Vec<Arc<dyn HealthCheckable>>,
}

impl LedgerPorts {
    /// In-memory stores, log-only notifications and the tracing observer
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let credit_store = Arc::new(InMemoryCreditStore::new());
        let obligation_store = Arc::new(InMemoryObligationStore::new());
        Self {
            credit_store: credit_store.clone(),
            obligation_store: obligation_store.clone(),
            directory: Arc::new(InMemoryCustomerDirectory::new()),
            sender: Arc::new(TracingNotificationSender),
            clock,
            observer: Arc::new(TracingObserver),
            health: vec![credit_store as Arc<dyn HealthCheckable>, obligation_store],
        }
    }

    /// PostgreSQL stores on a fresh pool, with migrations applied
    pub async fn postgres(config: &ServiceConfig, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        let pool = create_pool(config.database_config()).await?;
        run_migrations(&pool).await?;

        let credit_store = Arc::new(PostgresCreditStore::new(pool.clone()));
        let obligation_store = Arc::new(PostgresObligationStore::new(pool.clone()));
        Ok(Self {
            credit_store: credit_store.clone(),
            obligation_store: obligation_store.clone(),
            directory: Arc::new(PostgresCustomerDirectory::new(pool)),
            sender: Arc::new(TracingNotificationSender),
            clock,
            observer: Arc::new(TracingObserver),
            health: vec![credit_store as Arc<dyn HealthCheckable>, obligation_store],
        })
    }
}

/// The credit ledger, invoicing and recurring obligations behind one handle
#[derive(Clone)]
pub struct LedgerService {
    ledger: CreditLedger,
    aggregator: InvoiceAggregator,
    engine: Arc<RecurrenceEngine>,
    scheduler: SchedulerConfig,
    health: Vec<Arc<dyn HealthCheckable>>,
}

impl LedgerService {
    pub fn new(ports: LedgerPorts, config: &ServiceConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let currency = config.currency()?;
        let timezone = config.timezone()?;

        let notifier = CustomerNotifier::new(ports.directory, ports.sender, config.notification_timeout());
        let ledger = CreditLedger::new(
            ports.credit_store.clone(),
            notifier.clone(),
            ports.clock.clone(),
            currency,
        );
        let aggregator = InvoiceAggregator::new(
            ports.credit_store,
            notifier,
            ports.clock.clone(),
            currency,
            timezone,
        );
        let engine = RecurrenceEngine::new(
            ports.obligation_store,
            ports.clock,
            ports.observer,
            config.engine_settings()?,
        );

        Ok(Self {
            ledger,
            aggregator,
            engine: Arc::new(engine),
            scheduler: config.scheduler_config(),
            health: ports.health,
        })
    }

    /// Connects to PostgreSQL using the configured database settings
    pub async fn connect(config: &ServiceConfig, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        let ports = LedgerPorts::postgres(config, clock).await?;
        info!(currency = %config.currency, timezone = %config.timezone, "Ledger service connected");
        Self::new(ports, config)
    }

    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    pub fn aggregator(&self) -> &InvoiceAggregator {
        &self.aggregator
    }

    pub fn engine(&self) -> Arc<RecurrenceEngine> {
        self.engine.clone()
    }

    /// A driver on the configured period, stopped by `shutdown`
    pub fn scheduler(&self, shutdown: CancellationToken) -> SchedulerDriver {
        SchedulerDriver::new(self.engine.clone(), self.scheduler, shutdown)
    }

    pub async fn open_credit(&self, request: OpenCredit) -> Result<CreditEntry, ServiceError> {
        Ok(self.ledger.open(request).await?)
    }

    pub async fn settle_credit(&self, entry_id: CreditEntryId) -> Result<CreditEntry, ServiceError> {
        Ok(self.ledger.settle(entry_id).await?)
    }

    pub async fn outstanding_balance(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Money, ServiceError> {
        Ok(self.ledger.outstanding_balance(customer_id, shop_id).await?)
    }

    pub async fn generate_invoice(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
        month: u32,
        year: i32,
    ) -> Result<Invoice, ServiceError> {
        Ok(self
            .aggregator
            .generate_monthly_invoice(customer_id, shop_id, month, year)
            .await?)
    }

    pub async fn send_invoice(&self, invoice_id: InvoiceId) -> Result<InvoiceDelivery, ServiceError> {
        Ok(self.aggregator.send_invoice(invoice_id).await?)
    }

    pub async fn get_invoice(&self, invoice_id: InvoiceId) -> Result<Invoice, ServiceError> {
        Ok(self.aggregator.get_invoice(invoice_id).await?)
    }

    /// One isolated tick, outside the periodic loop
    ///
    /// A panic inside the tick is caught and returned as `ServiceError::Tick`.
    #[instrument(skip_all)]
    pub async fn tick_scheduler(&self) -> Result<TickReport, ServiceError> {
        let driver = self.scheduler(CancellationToken::new());
        Ok(driver.tick_now().await?)
    }

    pub async fn upsert_obligation(&self, draft: ObligationDraft) -> Result<RecurringObligation, ServiceError> {
        Ok(self.engine.upsert_obligation(draft).await?)
    }

    pub async fn toggle_obligation(&self, id: ObligationId) -> Result<RecurringObligation, ServiceError> {
        Ok(self.engine.toggle_obligation(id).await?)
    }

    pub async fn mark_occurrence_paid(&self, id: OccurrenceId) -> Result<MaterializedOccurrence, ServiceError> {
        Ok(self.engine.mark_occurrence_paid(id).await?)
    }

    pub async fn health(&self) -> Vec<HealthCheckResult> {
        let mut results = Vec::with_capacity(self.health.len());
        for adapter in &self.health {
            results.push(adapter.health_check().await);
        }
        results
    }
}

impl std::fmt::Debug for LedgerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerService")
            .field("ledger", &self.ledger)
            .field("aggregator", &self.aggregator)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
