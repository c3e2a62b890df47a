//! # Queue Ledger
//!
//! The ledger is the authoritative set of customer entries for one outlet on
//! one business day. This module holds:
//!
//! - **LedgerKey**: the (outlet, day) identity every ledger operation is scoped to
//! - **DayLedger**: an in-memory view of a day's entries with the position
//!   invariant (waiting entries numbered 1..N in registration order)
//! - **LedgerLocks**: one async mutex per key so read-decide-write sequences
//!   for the same ledger never interleave inside this process
//! - **QueueLedger**: storage access for the services, with every call bounded
//!   by the configured operation timeout

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use shared::CustomerStatus;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

use crate::backend::domain::clock::Clock;
use crate::backend::domain::errors::{QueueError, QueueResult};
use crate::backend::domain::models::customer::Customer;
use crate::backend::domain::models::outlet::Outlet;
use crate::backend::domain::models::queue_day::{self, QueueDay};
use crate::backend::domain::settings::QueueSettings;
use crate::backend::domain::wait_time::estimate_wait_secs;
use crate::backend::storage::{Connection, LedgerCommit, LedgerStorage, StorageConflict};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub outlet_id: String,
    pub service_day: NaiveDate,
}

impl LedgerKey {
    pub fn new(outlet_id: &str, service_day: NaiveDate) -> Self {
        Self {
            outlet_id: outlet_id.to_string(),
            service_day,
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.outlet_id, self.service_day)
    }
}

/// A day's entries, kept in registration order
#[derive(Debug, Clone)]
pub struct DayLedger {
    key: LedgerKey,
    entries: Vec<Customer>,
}

impl DayLedger {
    pub fn new(key: LedgerKey, mut entries: Vec<Customer>) -> Self {
        entries.sort_by_key(|e| e.token_sequence);
        Self { key, entries }
    }

    pub fn key(&self) -> &LedgerKey {
        &self.key
    }

    pub fn entries(&self) -> &[Customer] {
        &self.entries
    }

    pub fn get(&self, customer_id: &str) -> Option<&Customer> {
        self.entries.iter().find(|e| e.id == customer_id)
    }

    pub fn get_mut(&mut self, customer_id: &str) -> Option<&mut Customer> {
        self.entries.iter_mut().find(|e| e.id == customer_id)
    }

    pub fn waiting_count(&self) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.status == CustomerStatus::Waiting)
            .count() as u32
    }

    pub fn currently_serving(&self) -> Option<String> {
        queue_day::currently_serving(&self.entries)
    }

    /// Renumber waiting entries densely in registration order, clear positions
    /// on everything else and refresh estimates. Returns the ids of entries
    /// that changed.
    pub fn reassign_positions(&mut self, outlet: &Outlet) -> Vec<String> {
        let mut changed = Vec::new();
        let mut next_position = 1u32;

        for entry in self.entries.iter_mut() {
            if entry.status == CustomerStatus::Waiting {
                let estimate = estimate_wait_secs(next_position, outlet, entry.priority);
                if entry.queue_position != Some(next_position) || entry.estimated_wait_secs != estimate {
                    entry.queue_position = Some(next_position);
                    entry.estimated_wait_secs = estimate;
                    changed.push(entry.id.clone());
                }
                next_position += 1;
            } else if entry.queue_position.is_some() {
                entry.queue_position = None;
                changed.push(entry.id.clone());
            }
        }

        changed
    }

    /// Check that waiting positions are exactly 1..N in registration order
    /// and that no other entry holds a position.
    pub fn verify_positions(&self) -> Result<(), String> {
        let mut expected = 1u32;
        for entry in &self.entries {
            match (entry.status, entry.queue_position) {
                (CustomerStatus::Waiting, Some(position)) if position == expected => expected += 1,
                (CustomerStatus::Waiting, other) => {
                    return Err(format!(
                        "{} expected position {} but holds {:?}",
                        entry.token, expected, other
                    ));
                }
                (status, Some(position)) => {
                    return Err(format!(
                        "{} is {} but still holds position {}",
                        entry.token, status, position
                    ));
                }
                (_, None) => {}
            }
        }
        Ok(())
    }
}

/// Per-ledger async mutexes
#[derive(Clone, Default)]
pub struct LedgerLocks {
    inner: Arc<Mutex<HashMap<LedgerKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl LedgerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &LedgerKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Ledgers from earlier days nobody is holding can go
            locks.retain(|k, lock| {
                k.service_day >= key.service_day.pred_opt().unwrap_or(key.service_day)
                    || Arc::strong_count(lock) > 1
            });
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Run a storage future, converting failures and timeouts into repository errors
pub async fn bounded<T, F>(operation: &str, timeout: Duration, fut: F) -> QueueResult<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!("Storage call '{}' failed: {:#}", operation, e);
            Err(QueueError::repository(e))
        }
        Err(_) => {
            warn!("Storage call '{}' timed out", operation);
            Err(QueueError::Repository(format!(
                "{} timed out after {}ms",
                operation,
                timeout.as_millis()
            )))
        }
    }
}

pub enum CommitOutcome {
    Committed,
    Conflict(String),
}

/// Storage access shared by the admission, transition and query services
#[derive(Clone)]
pub struct QueueLedger<C: Connection> {
    repository: C::LedgerRepository,
    locks: LedgerLocks,
    clock: Arc<dyn Clock>,
    settings: QueueSettings,
}

impl<C: Connection> QueueLedger<C> {
    pub fn new(connection: &C, clock: Arc<dyn Clock>, settings: QueueSettings) -> Self {
        Self {
            repository: connection.create_ledger_repository(),
            locks: LedgerLocks::new(),
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn repository(&self) -> &C::LedgerRepository {
        &self.repository
    }

    /// Key for an outlet's ledger on the business day containing `at`
    pub fn key_at(&self, outlet_id: &str, at: DateTime<Utc>) -> LedgerKey {
        LedgerKey::new(outlet_id, self.settings.business_day(at))
    }

    pub fn today_key(&self, outlet_id: &str) -> LedgerKey {
        self.key_at(outlet_id, self.now())
    }

    /// Serialize writers of one ledger; waiting longer than the operation
    /// timeout surfaces as a repository error.
    pub async fn lock(&self, key: &LedgerKey) -> QueueResult<OwnedMutexGuard<()>> {
        tokio::time::timeout(self.settings.operation_timeout, self.locks.acquire(key))
            .await
            .map_err(|_| {
                warn!("Timed out waiting for ledger lock {}", key);
                QueueError::Repository(format!("Timed out waiting for ledger {}", key))
            })
    }

    /// Run a storage call under the operation timeout
    pub async fn storage<T, F>(&self, operation: &str, fut: F) -> QueueResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        bounded(operation, self.settings.operation_timeout, fut).await
    }

    pub async fn load_day(&self, key: &LedgerKey) -> QueueResult<DayLedger> {
        let entries = self
            .storage("list customers", self.repository.list_customers(key))
            .await?;
        debug!("Loaded {} entries for ledger {}", entries.len(), key);
        Ok(DayLedger::new(key.clone(), entries))
    }

    /// The stored aggregate, or one rebuilt from the ledger when none exists yet
    pub async fn queue_day_or_recompute(&self, ledger: &DayLedger) -> QueueResult<QueueDay> {
        let key = ledger.key();
        match self
            .storage("get queue day", self.repository.get_queue_day(key))
            .await?
        {
            Some(day) => Ok(day),
            None => Ok(QueueDay::recompute(
                &key.outlet_id,
                key.service_day,
                ledger.entries(),
                self.settings.utc_offset,
                self.now(),
            )),
        }
    }

    /// Write a batch, separating uniqueness conflicts from other failures
    pub async fn commit(&self, commit: &LedgerCommit) -> QueueResult<CommitOutcome> {
        match tokio::time::timeout(self.settings.operation_timeout, self.repository.commit(commit)).await {
            Ok(Ok(())) => Ok(CommitOutcome::Committed),
            Ok(Err(e)) => match e.downcast_ref::<StorageConflict>() {
                Some(conflict) => Ok(CommitOutcome::Conflict(conflict.0.clone())),
                None => {
                    warn!("Ledger commit failed: {:#}", e);
                    Err(QueueError::repository(e))
                }
            },
            Err(_) => Err(QueueError::Repository(format!(
                "Ledger commit timed out after {}ms",
                self.settings.operation_timeout.as_millis()
            ))),
        }
    }
}
