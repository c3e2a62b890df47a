//! # CSV Ledger Repository
//!
//! Each (outlet, business day) ledger is a directory holding the day's
//! entries in `customers.csv` and the aggregate in `queue.yaml`.
//!
//! ## CSV Format
//!
//! ```csv
//! id,outlet_id,service_day,token,token_sequence,name,contact,email,service_type,priority,status,queue_position,...
//! customer::colombo-01::20240304::T001,colombo-01,2024-03-04,T001,1,Alice,0771000001,,bill-payments,normal,waiting,1,...
//! ```
//!
//! Commits rewrite both files through temp files. The uniqueness rules the
//! SQLite backend gets from its indexes (token per ledger, one waiting entry
//! per position) are checked here before anything is written.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use csv::{Reader, Writer};
use log::debug;
use serde::{Deserialize, Serialize};
use shared::{CustomerStatus, PriorityClass};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Write};

use super::connection::{write_atomically, CsvConnection};
use crate::backend::domain::ledger::LedgerKey;
use crate::backend::domain::models::customer::{Customer, Feedback};
use crate::backend::domain::models::queue_day::QueueDay;
use crate::backend::storage::traits::{LedgerCommit, LedgerStorage, StorageConflict};

/// CSV record structure for customer entries
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CustomerRecord {
    id: String,
    outlet_id: String,
    service_day: NaiveDate,
    token: String,
    token_sequence: u32,
    name: String,
    contact: String,
    email: Option<String>,
    service_type: String,
    priority: PriorityClass,
    status: CustomerStatus,
    queue_position: Option<u32>,
    estimated_wait_secs: u64,
    actual_wait_secs: Option<u64>,
    registration_time: DateTime<Utc>,
    service_start_time: Option<DateTime<Utc>>,
    service_end_time: Option<DateTime<Utc>>,
    cancelled_time: Option<DateTime<Utc>>,
    assigned_officer_id: Option<String>,
    feedback_rating: Option<u8>,
    feedback_comment: Option<String>,
    feedback_submitted_at: Option<DateTime<Utc>>,
}

impl From<&Customer> for CustomerRecord {
    fn from(customer: &Customer) -> Self {
        let feedback = customer.feedback.as_ref();
        CustomerRecord {
            id: customer.id.clone(),
            outlet_id: customer.outlet_id.clone(),
            service_day: customer.service_day,
            token: customer.token.clone(),
            token_sequence: customer.token_sequence,
            name: customer.name.clone(),
            contact: customer.contact.clone(),
            email: customer.email.clone(),
            service_type: customer.service_type.clone(),
            priority: customer.priority,
            status: customer.status,
            queue_position: customer.queue_position,
            estimated_wait_secs: customer.estimated_wait_secs,
            actual_wait_secs: customer.actual_wait_secs,
            registration_time: customer.registration_time,
            service_start_time: customer.service_start_time,
            service_end_time: customer.service_end_time,
            cancelled_time: customer.cancelled_time,
            assigned_officer_id: customer.assigned_officer_id.clone(),
            feedback_rating: feedback.map(|f| f.rating),
            feedback_comment: feedback.and_then(|f| f.comment.clone()),
            feedback_submitted_at: feedback.map(|f| f.submitted_at),
        }
    }
}

impl TryFrom<CustomerRecord> for Customer {
    type Error = anyhow::Error;

    fn try_from(record: CustomerRecord) -> Result<Self> {
        let feedback = match (record.feedback_rating, record.feedback_submitted_at) {
            (Some(rating), Some(submitted_at)) => Some(Feedback {
                rating,
                comment: record.feedback_comment,
                submitted_at,
            }),
            (None, None) => None,
            _ => bail!("Entry {} has incomplete feedback columns", record.id),
        };

        Ok(Customer {
            id: record.id,
            name: record.name,
            contact: record.contact,
            email: record.email,
            service_type: record.service_type,
            priority: record.priority,
            outlet_id: record.outlet_id,
            service_day: record.service_day,
            token: record.token,
            token_sequence: record.token_sequence,
            status: record.status,
            queue_position: record.queue_position,
            estimated_wait_secs: record.estimated_wait_secs,
            actual_wait_secs: record.actual_wait_secs,
            registration_time: record.registration_time,
            service_start_time: record.service_start_time,
            service_end_time: record.service_end_time,
            cancelled_time: record.cancelled_time,
            assigned_officer_id: record.assigned_officer_id,
            feedback,
        })
    }
}

/// CSV-based ledger repository using one directory per outlet and day
#[derive(Clone)]
pub struct LedgerRepository {
    connection: CsvConnection,
}

impl LedgerRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    /// Read a ledger's entries in registration order. A missing file is an empty ledger.
    fn read_customers(&self, key: &LedgerKey) -> Result<Vec<Customer>> {
        let path = self.connection.customers_file(key);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut csv_reader = Reader::from_reader(BufReader::new(File::open(&path)?));
        let mut customers = Vec::new();
        for result in csv_reader.deserialize::<CustomerRecord>() {
            let record = result.with_context(|| format!("Failed to parse {:?}", path))?;
            customers.push(Customer::try_from(record)?);
        }

        customers.sort_by_key(|c| c.token_sequence);
        Ok(customers)
    }

    fn write_customers(&self, key: &LedgerKey, customers: &[Customer]) -> Result<()> {
        write_atomically(&self.connection.customers_file(key), |writer| {
            let mut csv_writer = Writer::from_writer(writer);
            for customer in customers {
                csv_writer.serialize(CustomerRecord::from(customer))?;
            }
            csv_writer.flush()?;
            Ok(())
        })
    }

    fn write_queue_day(&self, key: &LedgerKey, queue_day: &QueueDay) -> Result<()> {
        let yaml_content = serde_yaml::to_string(queue_day)?;
        write_atomically(&self.connection.queue_file(key), |writer| {
            writer.write_all(yaml_content.as_bytes())?;
            Ok(())
        })
    }

    /// Apply a commit to the entries in memory, enforcing the uniqueness rules
    fn apply(customers: &mut Vec<Customer>, commit: &LedgerCommit) -> Result<()> {
        if let Some(new_entry) = &commit.inserted {
            if customers
                .iter()
                .any(|c| c.id == new_entry.id || c.token == new_entry.token)
            {
                return Err(StorageConflict(format!("token {} already issued", new_entry.token)).into());
            }
            customers.push(new_entry.clone());
        }

        for update in &commit.updated {
            match customers.iter_mut().find(|c| c.id == update.customer.id) {
                Some(existing) if update.matches(existing) => *existing = update.customer.clone(),
                Some(existing) => {
                    return Err(StorageConflict(format!(
                        "{} changed since it was read (now {})",
                        existing.id, existing.status
                    ))
                    .into())
                }
                None => bail!("Customer {} does not exist", update.customer.id),
            }
        }

        let mut positions = HashSet::new();
        for customer in customers.iter().filter(|c| c.status == CustomerStatus::Waiting) {
            if let Some(position) = customer.queue_position {
                if !positions.insert(position) {
                    return Err(StorageConflict(format!("waiting position {} already taken", position)).into());
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStorage for LedgerRepository {
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>> {
        let Some((outlet_id, service_day, _)) = Customer::parse_id(customer_id) else {
            return Ok(None);
        };
        let key = LedgerKey::new(&outlet_id, service_day);
        Ok(self
            .read_customers(&key)?
            .into_iter()
            .find(|c| c.id == customer_id))
    }

    async fn find_by_token(&self, key: &LedgerKey, token: &str) -> Result<Option<Customer>> {
        Ok(self.read_customers(key)?.into_iter().find(|c| c.token == token))
    }

    async fn find_active_by_contact(&self, key: &LedgerKey, contact: &str) -> Result<Option<Customer>> {
        Ok(self
            .read_customers(key)?
            .into_iter()
            .find(|c| c.contact == contact && c.status.is_active()))
    }

    async fn list_customers(&self, key: &LedgerKey) -> Result<Vec<Customer>> {
        self.read_customers(key)
    }

    async fn list_waiting(&self, key: &LedgerKey, limit: Option<u32>) -> Result<Vec<Customer>> {
        let mut waiting: Vec<Customer> = self
            .read_customers(key)?
            .into_iter()
            .filter(|c| c.status == CustomerStatus::Waiting)
            .collect();
        waiting.sort_by_key(|c| c.queue_position);
        if let Some(limit) = limit {
            waiting.truncate(limit as usize);
        }
        Ok(waiting)
    }

    async fn count_registrations(&self, key: &LedgerKey) -> Result<u32> {
        Ok(self.read_customers(key)?.len() as u32)
    }

    async fn count_waiting(&self, key: &LedgerKey) -> Result<u32> {
        Ok(self
            .read_customers(key)?
            .iter()
            .filter(|c| c.status == CustomerStatus::Waiting)
            .count() as u32)
    }

    async fn get_queue_day(&self, key: &LedgerKey) -> Result<Option<QueueDay>> {
        let path = self.connection.queue_file(key);
        if !path.exists() {
            return Ok(None);
        }
        let yaml_content = fs::read_to_string(&path)?;
        let queue_day = serde_yaml::from_str(&yaml_content)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(Some(queue_day))
    }

    async fn commit(&self, commit: &LedgerCommit) -> Result<()> {
        let key = LedgerKey::new(&commit.queue_day.outlet_id, commit.queue_day.service_day);
        let _guard = self.connection.commit_lock().lock().await;
        let mut customers = self.read_customers(&key)?;

        Self::apply(&mut customers, commit)?;

        if commit.inserted.is_some() || !commit.updated.is_empty() {
            self.write_customers(&key, &customers)?;
        }
        self.write_queue_day(&key, &commit.queue_day)?;

        debug!(
            "Committed ledger {}: {} entries on file",
            key,
            customers.len()
        );
        Ok(())
    }
}
