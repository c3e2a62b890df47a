//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer.

use anyhow::Result;
use async_trait::async_trait;
use shared::CustomerStatus;

use crate::backend::domain::ledger::LedgerKey;
use crate::backend::domain::models::customer::Customer;
use crate::backend::domain::models::outlet::{Outlet, ServiceType};
use crate::backend::domain::models::queue_day::QueueDay;

/// Trait defining the interface for the outlet directory
///
/// The queue services only read through this trait; the write methods exist
/// for loading the directory file at startup.
#[async_trait]
pub trait OutletStorage: Send + Sync {
    /// Insert an outlet or replace the existing one with the same ID
    async fn store_outlet(&self, outlet: &Outlet) -> Result<()>;

    /// Retrieve a specific outlet by ID
    async fn get_outlet(&self, outlet_id: &str) -> Result<Option<Outlet>>;

    /// List all outlets ordered by ID
    async fn list_outlets(&self) -> Result<Vec<Outlet>>;

    /// Insert a service type or replace the existing one with the same ID
    async fn store_service_type(&self, service_type: &ServiceType) -> Result<()>;

    /// List the service-type catalog ordered by ID
    async fn list_service_types(&self) -> Result<Vec<ServiceType>>;
}

/// New state for an existing entry, applied only if the stored entry is
/// still in the state it was read in
#[derive(Debug, Clone)]
pub struct EntryUpdate {
    pub customer: Customer,
    pub expected_status: CustomerStatus,
    pub expected_position: Option<u32>,
    pub expected_has_feedback: bool,
}

impl EntryUpdate {
    pub fn new(previous: &Customer, customer: Customer) -> Self {
        Self {
            expected_status: previous.status,
            expected_position: previous.queue_position,
            expected_has_feedback: previous.feedback.is_some(),
            customer,
        }
    }

    /// Whether `stored` still matches the state this update was based on
    pub fn matches(&self, stored: &Customer) -> bool {
        stored.status == self.expected_status
            && stored.queue_position == self.expected_position
            && stored.feedback.is_some() == self.expected_has_feedback
    }
}

/// A batch of ledger writes that must land together
#[derive(Debug, Clone)]
pub struct LedgerCommit {
    /// A newly admitted entry
    pub inserted: Option<Customer>,
    /// Existing entries whose state changed
    pub updated: Vec<EntryUpdate>,
    /// The aggregate after applying the changes above
    pub queue_day: QueueDay,
}

/// Raised by a backend when a write collides with a uniqueness rule (token
/// or waiting position already taken) or an updated entry changed since it
/// was read. Callers may retry.
#[derive(Debug, thiserror::Error)]
#[error("Storage conflict: {0}")]
pub struct StorageConflict(pub String);

/// Trait defining the interface for queue ledger storage operations
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Retrieve a customer entry by ID
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>>;

    /// Find an entry by its token within one outlet and day
    async fn find_by_token(&self, key: &LedgerKey, token: &str) -> Result<Option<Customer>>;

    /// Find a waiting or being-served entry for a contact number
    async fn find_active_by_contact(&self, key: &LedgerKey, contact: &str) -> Result<Option<Customer>>;

    /// List every entry for the day in registration order
    async fn list_customers(&self, key: &LedgerKey) -> Result<Vec<Customer>>;

    /// List waiting entries ordered by queue position
    async fn list_waiting(&self, key: &LedgerKey, limit: Option<u32>) -> Result<Vec<Customer>>;

    /// Count registrations of any status for the day
    async fn count_registrations(&self, key: &LedgerKey) -> Result<u32>;

    /// Count entries currently waiting
    async fn count_waiting(&self, key: &LedgerKey) -> Result<u32>;

    /// Get the daily aggregate, if one has been created
    async fn get_queue_day(&self, key: &LedgerKey) -> Result<Option<QueueDay>>;

    /// Apply a batch of entry writes and the aggregate atomically.
    /// Fails with a `StorageConflict` in the error chain on uniqueness
    /// violations or when an updated entry no longer matches its expected state.
    async fn commit(&self, commit: &LedgerCommit) -> Result<()>;
}

/// Trait defining the interface for storage connections
///
/// This trait abstracts away the specific connection type (database, CSV, etc.)
/// and provides factory methods for creating repositories. This allows the domain
/// layer to work with any storage backend without knowing the implementation details.
#[async_trait]
pub trait Connection: Send + Sync + Clone + 'static {
    /// The type of OutletStorage this connection creates
    type OutletRepository: OutletStorage + Clone + 'static;

    /// The type of LedgerStorage this connection creates
    type LedgerRepository: LedgerStorage + Clone + 'static;

    /// Short name used in logs and the health endpoint
    fn backend_name(&self) -> &'static str;

    /// Create a new outlet repository for this connection
    fn create_outlet_repository(&self) -> Self::OutletRepository;

    /// Create a new ledger repository for this connection
    fn create_ledger_repository(&self) -> Self::LedgerRepository;

    /// Release pooled resources on shutdown
    async fn close(&self);
}
