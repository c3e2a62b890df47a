//! Shared fixtures for the service tests. Every scenario runs against a
//! real storage backend with a manually driven clock.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use shared::PriorityClass;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

use crate::backend::domain::admission_service::AdmissionService;
use crate::backend::domain::clock::{Clock, FixedClock};
use crate::backend::domain::commands::admission::RegisterCustomerCommand;
use crate::backend::domain::ledger::{LedgerKey, QueueLedger};
use crate::backend::domain::models::customer::Customer;
use crate::backend::domain::models::outlet::{
    OperatingHours, Outlet, OutletConfiguration, PriorityMultipliers,
};
use crate::backend::domain::outlet_service::OutletService;
use crate::backend::domain::queue_query_service::QueueQueryService;
use crate::backend::domain::settings::QueueSettings;
use crate::backend::domain::transition_service::TransitionService;
use crate::backend::domain::models::queue_day::QueueDay;
use crate::backend::storage::{Connection, LedgerCommit, LedgerStorage, OutletStorage, StorageConflict};

pub const TEST_OUTLET: &str = "colombo-01";

/// Monday 2024-03-04 09:00 UTC
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

pub fn test_outlet(capacity: u32) -> Outlet {
    Outlet {
        id: TEST_OUTLET.to_string(),
        name: "Colombo Central".to_string(),
        location: "Colombo".to_string(),
        address: "12 Galle Road".to_string(),
        capacity,
        service_types: vec!["bill-payments".to_string(), "technical-support".to_string()],
        operating_hours: OperatingHours {
            open: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            close: NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        },
        is_active: true,
        configuration: OutletConfiguration {
            average_service_minutes: 10,
            minimum_wait_minutes: 5,
            priority_multipliers: PriorityMultipliers::default(),
        },
    }
}

pub fn register_command(name: &str, contact: &str) -> RegisterCustomerCommand {
    RegisterCustomerCommand {
        name: name.to_string(),
        contact: contact.to_string(),
        email: None,
        service_type: "bill-payments".to_string(),
        outlet_id: TEST_OUTLET.to_string(),
        priority: PriorityClass::Normal,
    }
}

/// All services wired over one connection, sharing a ledger and clock
pub struct ServiceHarness<C: Connection> {
    pub clock: Arc<FixedClock>,
    pub ledger: QueueLedger<C>,
    pub outlet_service: OutletService<C>,
    pub admission: AdmissionService<C>,
    pub transitions: TransitionService<C>,
    pub queries: QueueQueryService<C>,
    connection: C,
}

impl<C: Connection> ServiceHarness<C> {
    pub async fn new(connection: &C, settings: QueueSettings) -> Result<Self> {
        Self::with_capacity(connection, settings, 40).await
    }

    pub async fn with_capacity(connection: &C, settings: QueueSettings, capacity: u32) -> Result<Self> {
        connection
            .create_outlet_repository()
            .store_outlet(&test_outlet(capacity))
            .await?;

        let clock = Arc::new(FixedClock::new(monday_morning()));
        let ledger = QueueLedger::new(connection, clock.clone(), settings.clone());
        let outlet_service = OutletService::new(connection, &settings);

        Ok(Self {
            admission: AdmissionService::new(ledger.clone(), outlet_service.clone()),
            transitions: TransitionService::new(ledger.clone(), outlet_service.clone()),
            queries: QueueQueryService::new(ledger.clone(), outlet_service.clone()),
            clock,
            ledger,
            outlet_service,
            connection: connection.clone(),
        })
    }

    /// Business day of the harness clock
    pub fn clock_day(&self) -> NaiveDate {
        self.ledger.settings().business_day(self.clock.now())
    }

    pub async fn deactivate_outlet(&self) -> Result<()> {
        let mut outlet = test_outlet(40);
        outlet.is_active = false;
        self.connection.create_outlet_repository().store_outlet(&outlet).await
    }
}

/// Connection whose ledger commits can be made to fail with a storage
/// conflict, or held until a number of writers arrive together
#[derive(Clone)]
pub struct InterceptedConnection<C: Connection> {
    inner: C,
    conflicts_remaining: Arc<AtomicU32>,
    commit_attempts: Arc<AtomicU32>,
    gate: Option<Arc<Barrier>>,
}

impl<C: Connection> InterceptedConnection<C> {
    /// Fail the next `conflicts` commits, then pass through
    pub fn conflicting(inner: &C, conflicts: u32) -> Self {
        Self {
            inner: inner.clone(),
            conflicts_remaining: Arc::new(AtomicU32::new(conflicts)),
            commit_attempts: Arc::new(AtomicU32::new(0)),
            gate: None,
        }
    }

    /// Hold every commit until `writers` commits are waiting
    pub fn gated(inner: &C, writers: usize) -> Self {
        Self {
            gate: Some(Arc::new(Barrier::new(writers))),
            ..Self::conflicting(inner, 0)
        }
    }

    pub fn commit_attempts(&self) -> u32 {
        self.commit_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Connection> Connection for InterceptedConnection<C> {
    type OutletRepository = C::OutletRepository;
    type LedgerRepository = InterceptedLedger<C::LedgerRepository>;

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    fn create_outlet_repository(&self) -> Self::OutletRepository {
        self.inner.create_outlet_repository()
    }

    fn create_ledger_repository(&self) -> Self::LedgerRepository {
        InterceptedLedger {
            inner: self.inner.create_ledger_repository(),
            conflicts_remaining: self.conflicts_remaining.clone(),
            commit_attempts: self.commit_attempts.clone(),
            gate: self.gate.clone(),
        }
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

#[derive(Clone)]
pub struct InterceptedLedger<L> {
    inner: L,
    conflicts_remaining: Arc<AtomicU32>,
    commit_attempts: Arc<AtomicU32>,
    gate: Option<Arc<Barrier>>,
}

#[async_trait]
impl<L: LedgerStorage + Clone + 'static> LedgerStorage for InterceptedLedger<L> {
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>> {
        self.inner.get_customer(customer_id).await
    }

    async fn find_by_token(&self, key: &LedgerKey, token: &str) -> Result<Option<Customer>> {
        self.inner.find_by_token(key, token).await
    }

    async fn find_active_by_contact(&self, key: &LedgerKey, contact: &str) -> Result<Option<Customer>> {
        self.inner.find_active_by_contact(key, contact).await
    }

    async fn list_customers(&self, key: &LedgerKey) -> Result<Vec<Customer>> {
        self.inner.list_customers(key).await
    }

    async fn list_waiting(&self, key: &LedgerKey, limit: Option<u32>) -> Result<Vec<Customer>> {
        self.inner.list_waiting(key, limit).await
    }

    async fn count_registrations(&self, key: &LedgerKey) -> Result<u32> {
        self.inner.count_registrations(key).await
    }

    async fn count_waiting(&self, key: &LedgerKey) -> Result<u32> {
        self.inner.count_waiting(key).await
    }

    async fn get_queue_day(&self, key: &LedgerKey) -> Result<Option<QueueDay>> {
        self.inner.get_queue_day(key).await
    }

    async fn commit(&self, commit: &LedgerCommit) -> Result<()> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        let injected = self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageConflict("injected by test".to_string()).into());
        }
        self.inner.commit(commit).await
    }
}
