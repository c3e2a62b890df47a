//! # Admission Service
//!
//! Validates registrations and appends them to the outlet's ledger for the
//! current business day.
//!
//! A new entry always goes to the back of the line: its token is the next
//! number in the day's issuance sequence and its position is one past the
//! current waiting count. Priority only scales the estimate.
//!
//! The read-decide-write sequence runs under the ledger lock. If storage
//! still reports a uniqueness conflict (another process wrote the same
//! ledger) the whole admission is re-run, up to the configured retry count.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use shared::{CustomerStatus, PriorityClass};

use crate::backend::domain::commands::admission::RegisterCustomerCommand;
use crate::backend::domain::errors::{QueueError, QueueResult};
use crate::backend::domain::ledger::{CommitOutcome, LedgerKey, QueueLedger};
use crate::backend::domain::models::customer::Customer;
use crate::backend::domain::models::outlet::Outlet;
use crate::backend::domain::models::queue_day::QueueDay;
use crate::backend::domain::outlet_service::OutletService;
use crate::backend::domain::wait_time::estimate_wait_secs;
use crate::backend::storage::{Connection, LedgerCommit, LedgerStorage};

const MAX_NAME_LENGTH: usize = 100;
const MIN_CONTACT_LENGTH: usize = 7;
const MAX_CONTACT_LENGTH: usize = 20;

/// Registration input after trimming and normalization
#[derive(Debug, Clone)]
struct Registration {
    name: String,
    contact: String,
    email: Option<String>,
    service_type: String,
    outlet_id: String,
    priority: PriorityClass,
}

#[derive(Clone)]
pub struct AdmissionService<C: Connection> {
    ledger: QueueLedger<C>,
    outlet_service: OutletService<C>,
}

impl<C: Connection> AdmissionService<C> {
    pub fn new(ledger: QueueLedger<C>, outlet_service: OutletService<C>) -> Self {
        Self {
            ledger,
            outlet_service,
        }
    }

    /// Register a customer at an outlet for today
    pub async fn register(&self, command: RegisterCustomerCommand) -> QueueResult<Customer> {
        let registration = Self::validate(command)?;
        info!(
            "Registering customer for {} at outlet {}",
            registration.service_type, registration.outlet_id
        );

        let outlet = self.outlet_service.get_outlet(&registration.outlet_id).await?;
        if !outlet.is_active {
            return Err(QueueError::validation(format!(
                "Outlet {} is not accepting registrations",
                outlet.id
            )));
        }
        if !outlet.accepts_service(&registration.service_type) {
            return Err(QueueError::validation(format!(
                "Service type {} is not offered at outlet {}",
                registration.service_type, outlet.id
            )));
        }

        let settings = self.ledger.settings();
        let mut conflicts = 0u32;

        loop {
            let now = self.ledger.now();
            if settings.enforce_operating_hours
                && !outlet.operating_hours.is_open_at(settings.local_time(now))
            {
                return Err(QueueError::OutletClosed(outlet.id.clone()));
            }

            let key = self.ledger.key_at(&outlet.id, now);
            let _guard = self.ledger.lock(&key).await?;

            let commit = self.prepare(&registration, &outlet, &key, now).await?;
            match self.ledger.commit(&commit).await? {
                CommitOutcome::Committed => {
                    let customer = commit.inserted.ok_or_else(|| {
                        QueueError::Repository("Admission produced no entry".to_string())
                    })?;
                    info!(
                        "Admitted {} at {} in position {:?} (estimate {}s)",
                        customer.token, key, customer.queue_position, customer.estimated_wait_secs
                    );
                    return Ok(customer);
                }
                CommitOutcome::Conflict(reason) => {
                    conflicts += 1;
                    warn!(
                        "Admission conflict on {} (attempt {}): {}",
                        key, conflicts, reason
                    );
                    if conflicts > settings.conflict_retries {
                        return Err(QueueError::Repository(format!(
                            "Ledger {} kept conflicting after {} attempts: {}",
                            key, conflicts, reason
                        )));
                    }
                }
            }
        }
    }

    /// Build the entry and aggregate update for one admission attempt.
    /// Must run under the ledger lock.
    async fn prepare(
        &self,
        registration: &Registration,
        outlet: &Outlet,
        key: &LedgerKey,
        now: DateTime<Utc>,
    ) -> QueueResult<LedgerCommit> {
        let repository = self.ledger.repository();

        if let Some(existing) = self
            .ledger
            .storage(
                "find active by contact",
                repository.find_active_by_contact(key, &registration.contact),
            )
            .await?
        {
            info!(
                "Duplicate registration at {}: existing token {}",
                key, existing.token
            );
            return Err(QueueError::DuplicateRegistration {
                customer_id: existing.id,
                token: existing.token,
                position: existing.queue_position,
                status: existing.status,
            });
        }

        let waiting = self
            .ledger
            .storage("count waiting", repository.count_waiting(key))
            .await?;
        if waiting >= outlet.capacity {
            warn!("Outlet {} is full ({} waiting)", outlet.id, waiting);
            return Err(QueueError::CapacityExceeded {
                outlet_id: outlet.id.clone(),
                capacity: outlet.capacity,
            });
        }

        let registered = self
            .ledger
            .storage("count registrations", repository.count_registrations(key))
            .await?;

        let mut queue_day = self.current_queue_day(key).await?;

        let token_sequence = registered + 1;
        let token = Customer::format_token(token_sequence);
        let position = waiting + 1;
        debug!("Next token at {} is {} (position {})", key, token, position);

        let customer = Customer {
            id: Customer::generate_id(&key.outlet_id, key.service_day, &token),
            name: registration.name.clone(),
            contact: registration.contact.clone(),
            email: registration.email.clone(),
            service_type: registration.service_type.clone(),
            priority: registration.priority,
            outlet_id: key.outlet_id.clone(),
            service_day: key.service_day,
            token,
            token_sequence,
            status: CustomerStatus::Waiting,
            queue_position: Some(position),
            estimated_wait_secs: estimate_wait_secs(position, outlet, registration.priority),
            actual_wait_secs: None,
            registration_time: now,
            service_start_time: None,
            service_end_time: None,
            cancelled_time: None,
            assigned_officer_id: None,
            feedback: None,
        };

        queue_day.record_registration(now, self.ledger.settings().utc_offset);
        queue_day.last_updated = now;

        Ok(LedgerCommit {
            inserted: Some(customer),
            updated: Vec::new(),
            queue_day,
        })
    }

    /// The stored aggregate, or one built from the ledger on the day's first write
    async fn current_queue_day(&self, key: &LedgerKey) -> QueueResult<QueueDay> {
        let stored = self
            .ledger
            .storage("get queue day", self.ledger.repository().get_queue_day(key))
            .await?;
        match stored {
            Some(queue_day) => Ok(queue_day),
            None => {
                let day = self.ledger.load_day(key).await?;
                self.ledger.queue_day_or_recompute(&day).await
            }
        }
    }

    fn validate(command: RegisterCustomerCommand) -> QueueResult<Registration> {
        let name = command.name.trim().to_string();
        if name.is_empty() {
            return Err(QueueError::validation("Name is required"));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(QueueError::validation(format!(
                "Name cannot exceed {} characters",
                MAX_NAME_LENGTH
            )));
        }

        let contact = command.contact.trim().to_string();
        if contact.is_empty() {
            return Err(QueueError::validation("Phone number is required"));
        }
        let contact_chars_valid = contact
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
        let contact_len = contact.chars().count();
        if !contact_chars_valid || !(MIN_CONTACT_LENGTH..=MAX_CONTACT_LENGTH).contains(&contact_len) {
            return Err(QueueError::validation("Please enter a valid phone number"));
        }

        let email = match command.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(email) => {
                if !email.contains('@') || email.chars().any(char::is_whitespace) {
                    return Err(QueueError::validation("Please enter a valid email address"));
                }
                Some(email.to_lowercase())
            }
        };

        let service_type = command.service_type.trim().to_string();
        if service_type.is_empty() {
            return Err(QueueError::validation("Service type is required"));
        }

        let outlet_id = command.outlet_id.trim().to_string();
        if outlet_id.is_empty() {
            return Err(QueueError::validation("Outlet is required"));
        }

        Ok(Registration {
            name,
            contact,
            email,
            service_type,
            outlet_id,
            priority: command.priority,
        })
    }
}
