//! # Transition Service
//!
//! Moves entries through the service lifecycle:
//!
//! ```text
//! waiting ──► being_served ──► completed
//!    │              │
//!    └──────────────┴────────► cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. Whenever an entry leaves the
//! waiting line the remaining waiting entries are renumbered 1..N in
//! registration order and their estimates refreshed, and the daily
//! aggregate is updated in the same commit.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use shared::CustomerStatus;

use crate::backend::domain::commands::transitions::{SubmitFeedbackCommand, TransitionCommand};
use crate::backend::domain::errors::{QueueError, QueueResult};
use crate::backend::domain::ledger::{CommitOutcome, DayLedger, LedgerKey, QueueLedger};
use crate::backend::domain::models::customer::{Customer, Feedback};
use crate::backend::domain::models::queue_day::QueueDay;
use crate::backend::domain::outlet_service::OutletService;
use crate::backend::storage::{Connection, EntryUpdate, LedgerCommit, LedgerStorage};

const MAX_COMMENT_LENGTH: usize = 500;

/// Whether the state machine allows `from -> to`
pub fn is_allowed(from: CustomerStatus, to: CustomerStatus) -> bool {
    matches!(
        (from, to),
        (CustomerStatus::Waiting, CustomerStatus::BeingServed)
            | (CustomerStatus::Waiting, CustomerStatus::Cancelled)
            | (CustomerStatus::BeingServed, CustomerStatus::Completed)
            | (CustomerStatus::BeingServed, CustomerStatus::Cancelled)
    )
}

#[derive(Clone)]
pub struct TransitionService<C: Connection> {
    ledger: QueueLedger<C>,
    outlet_service: OutletService<C>,
}

impl<C: Connection> TransitionService<C> {
    pub fn new(ledger: QueueLedger<C>, outlet_service: OutletService<C>) -> Self {
        Self {
            ledger,
            outlet_service,
        }
    }

    /// Apply a status change to an entry and return the updated entry
    pub async fn transition(&self, command: TransitionCommand) -> QueueResult<Customer> {
        info!(
            "Transition requested for {} to {}",
            command.customer_id, command.target_status
        );

        let key = self.key_for(&command.customer_id).await?;
        let _guard = self.ledger.lock(&key).await?;

        let mut day = self.ledger.load_day(&key).await?;
        let current = day
            .get(&command.customer_id)
            .ok_or_else(|| QueueError::NotFound(format!("Customer {}", command.customer_id)))?;
        let from = current.status;
        let to = command.target_status;

        if !is_allowed(from, to) {
            warn!("Rejected transition of {} from {} to {}", current.token, from, to);
            return Err(QueueError::InvalidTransition { from, to });
        }

        let officer_id = command
            .officer_id
            .as_deref()
            .map(str::trim)
            .filter(|officer| !officer.is_empty())
            .map(str::to_string);
        if to == CustomerStatus::BeingServed && officer_id.is_none() {
            return Err(QueueError::validation(
                "An officer must be assigned to start service",
            ));
        }

        let outlet = self.outlet_service.get_outlet(&key.outlet_id).await?;
        let stored_day = self
            .ledger
            .storage("get queue day", self.ledger.repository().get_queue_day(&key))
            .await?;
        let now = self.ledger.now();
        let original = day.clone();

        let entry = day
            .get_mut(&command.customer_id)
            .ok_or_else(|| QueueError::NotFound(format!("Customer {}", command.customer_id)))?;
        Self::apply(entry, to, officer_id, now);
        let updated_entry = entry.clone();

        let changed = if from == CustomerStatus::Waiting {
            day.reassign_positions(&outlet)
        } else {
            Vec::new()
        };

        if let Err(violation) = day.verify_positions() {
            error!("Ledger {} failed position check: {}", key, violation);
            return Err(QueueError::Repository(format!(
                "Ledger invariant violated: {}",
                violation
            )));
        }

        let queue_day = match stored_day {
            Some(mut queue_day) => {
                if from == CustomerStatus::Waiting {
                    queue_day.record_left_waiting();
                }
                if to == CustomerStatus::Completed {
                    queue_day.record_completion(updated_entry.actual_wait_secs);
                }
                queue_day.currently_serving = day.currently_serving();
                queue_day.last_updated = now;
                queue_day
            }
            None => QueueDay::recompute(
                &key.outlet_id,
                key.service_day,
                day.entries(),
                self.ledger.settings().utc_offset,
                now,
            ),
        };

        let updated = Self::collect_updates(&original, &day, &updated_entry, &changed);
        self.write(&key, updated, queue_day).await?;

        info!(
            "{} at {} moved from {} to {} ({} positions refreshed)",
            updated_entry.token,
            key,
            from,
            to,
            changed.iter().filter(|id| **id != updated_entry.id).count()
        );
        Ok(updated_entry)
    }

    /// Attach feedback to a completed entry. Feedback can be left once.
    pub async fn submit_feedback(&self, command: SubmitFeedbackCommand) -> QueueResult<Customer> {
        if !(1..=5).contains(&command.rating) {
            return Err(QueueError::validation("Rating must be between 1 and 5"));
        }
        let comment = command
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
            .map(str::to_string);
        if let Some(comment) = &comment {
            if comment.chars().count() > MAX_COMMENT_LENGTH {
                return Err(QueueError::validation(format!(
                    "Comment cannot exceed {} characters",
                    MAX_COMMENT_LENGTH
                )));
            }
        }

        let key = self.key_for(&command.customer_id).await?;
        let _guard = self.ledger.lock(&key).await?;

        let mut day = self.ledger.load_day(&key).await?;
        let queue_day = self.ledger.queue_day_or_recompute(&day).await?;
        let now = self.ledger.now();

        let entry = day
            .get_mut(&command.customer_id)
            .ok_or_else(|| QueueError::NotFound(format!("Customer {}", command.customer_id)))?;
        if entry.status != CustomerStatus::Completed {
            return Err(QueueError::validation(
                "Feedback can only be submitted for completed services",
            ));
        }
        if entry.feedback.is_some() {
            return Err(QueueError::validation("Feedback has already been submitted"));
        }

        let previous = entry.clone();
        entry.feedback = Some(Feedback {
            rating: command.rating,
            comment,
            submitted_at: now,
        });
        let updated_entry = entry.clone();

        let update = EntryUpdate::new(&previous, updated_entry.clone());
        self.write(&key, vec![update], queue_day).await?;
        info!(
            "Recorded {}-star feedback for {} at {}",
            command.rating, updated_entry.token, key
        );
        Ok(updated_entry)
    }

    async fn key_for(&self, customer_id: &str) -> QueueResult<LedgerKey> {
        let customer = self
            .ledger
            .storage("get customer", self.ledger.repository().get_customer(customer_id))
            .await?
            .ok_or_else(|| QueueError::NotFound(format!("Customer {}", customer_id)))?;
        Ok(LedgerKey::new(&customer.outlet_id, customer.service_day))
    }

    fn apply(entry: &mut Customer, to: CustomerStatus, officer_id: Option<String>, now: DateTime<Utc>) {
        match to {
            CustomerStatus::BeingServed => {
                let waited = (now - entry.registration_time).num_seconds().max(0) as u64;
                entry.service_start_time = Some(now);
                entry.actual_wait_secs = Some(waited);
                entry.assigned_officer_id = officer_id;
            }
            CustomerStatus::Completed => {
                entry.service_end_time = Some(now);
            }
            CustomerStatus::Cancelled => {
                entry.cancelled_time = Some(now);
            }
            CustomerStatus::Waiting => {}
        }
        entry.status = to;
        entry.queue_position = None;
    }

    /// The transitioned entry first, then every other entry whose position
    /// moved, each guarded by the state it was loaded in
    fn collect_updates(
        original: &DayLedger,
        day: &DayLedger,
        target: &Customer,
        changed: &[String],
    ) -> Vec<EntryUpdate> {
        std::iter::once(&target.id)
            .chain(changed.iter().filter(|id| **id != target.id))
            .filter_map(|id| Some(EntryUpdate::new(original.get(id)?, day.get(id)?.clone())))
            .collect()
    }

    async fn write(&self, key: &LedgerKey, updated: Vec<EntryUpdate>, queue_day: QueueDay) -> QueueResult<()> {
        let commit = LedgerCommit {
            inserted: None,
            updated,
            queue_day,
        };
        match self.ledger.commit(&commit).await? {
            CommitOutcome::Committed => Ok(()),
            CommitOutcome::Conflict(reason) => {
                warn!("Transition on {} hit a storage conflict: {}", key, reason);
                Err(QueueError::Repository(format!(
                    "Ledger {} changed concurrently: {}",
                    key, reason
                )))
            }
        }
    }
}
