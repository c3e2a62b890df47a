use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use shared::{CustomerStatus, PriorityClass};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use crate::backend::domain::ledger::LedgerKey;
use crate::backend::domain::models::customer::{Customer, Feedback};
use crate::backend::domain::models::queue_day::QueueDay;
use crate::backend::storage::sqlite::connection::DbConnection;
use crate::backend::storage::traits::{EntryUpdate, LedgerCommit, LedgerStorage, StorageConflict};

const CUSTOMER_COLUMNS: &str = r#"
    id, outlet_id, service_day, token, token_sequence, name, contact, email,
    service_type, priority, status, queue_position, estimated_wait_secs,
    actual_wait_secs, registration_time, service_start_time, service_end_time,
    cancelled_time, assigned_officer_id, feedback_rating, feedback_comment,
    feedback_submitted_at
"#;

/// Repository for customer entries and daily aggregates
#[derive(Clone)]
pub struct LedgerRepository {
    db: DbConnection,
}

impl LedgerRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn customer_from_row(row: &SqliteRow) -> Result<Customer> {
        let priority: String = row.try_get("priority")?;
        let status: String = row.try_get("status")?;
        let feedback = match row.try_get::<Option<i64>, _>("feedback_rating")? {
            Some(rating) => Some(Feedback {
                rating: u8::try_from(rating)?,
                comment: row.try_get("feedback_comment")?,
                submitted_at: row
                    .try_get::<Option<DateTime<Utc>>, _>("feedback_submitted_at")?
                    .ok_or_else(|| anyhow!("Feedback without submission time"))?,
            }),
            None => None,
        };

        Ok(Customer {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            contact: row.try_get("contact")?,
            email: row.try_get("email")?,
            service_type: row.try_get("service_type")?,
            priority: PriorityClass::parse(&priority)
                .ok_or_else(|| anyhow!("Unknown priority '{}'", priority))?,
            outlet_id: row.try_get("outlet_id")?,
            service_day: row.try_get("service_day")?,
            token: row.try_get("token")?,
            token_sequence: u32::try_from(row.try_get::<i64, _>("token_sequence")?)?,
            status: CustomerStatus::parse(&status)
                .ok_or_else(|| anyhow!("Unknown status '{}'", status))?,
            queue_position: row
                .try_get::<Option<i64>, _>("queue_position")?
                .map(u32::try_from)
                .transpose()?,
            estimated_wait_secs: u64::try_from(row.try_get::<i64, _>("estimated_wait_secs")?)?,
            actual_wait_secs: row
                .try_get::<Option<i64>, _>("actual_wait_secs")?
                .map(u64::try_from)
                .transpose()?,
            registration_time: row.try_get("registration_time")?,
            service_start_time: row.try_get("service_start_time")?,
            service_end_time: row.try_get("service_end_time")?,
            cancelled_time: row.try_get("cancelled_time")?,
            assigned_officer_id: row.try_get("assigned_officer_id")?,
            feedback,
        })
    }

    fn queue_day_from_row(row: &SqliteRow) -> Result<QueueDay> {
        let peak_hours: String = row.try_get("peak_hours")?;
        Ok(QueueDay {
            outlet_id: row.try_get("outlet_id")?,
            service_day: row.try_get("service_day")?,
            currently_serving: row.try_get("currently_serving")?,
            total_registered: u32::try_from(row.try_get::<i64, _>("total_registered")?)?,
            total_waiting: u32::try_from(row.try_get::<i64, _>("total_waiting")?)?,
            total_served: u32::try_from(row.try_get::<i64, _>("total_served")?)?,
            wait_time_total_secs: u64::try_from(row.try_get::<i64, _>("wait_time_total_secs")?)?,
            wait_time_samples: u32::try_from(row.try_get::<i64, _>("wait_time_samples")?)?,
            peak_hours: serde_json::from_str(&peak_hours).context("Bad peak_hours column")?,
            last_updated: row.try_get("last_updated")?,
        })
    }

    async fn fetch_customers(&self, sql: &str, key: &LedgerKey, extra: Option<&str>) -> Result<Vec<Customer>> {
        let mut query = sqlx::query(sql).bind(&key.outlet_id).bind(key.service_day);
        if let Some(extra) = extra {
            query = query.bind(extra);
        }
        let rows = query.fetch_all(self.db.pool()).await?;
        rows.iter().map(Self::customer_from_row).collect()
    }

    async fn insert_customer(tx: &mut Transaction<'_, Sqlite>, customer: &Customer) -> Result<()> {
        let sql = format!(
            "INSERT INTO customers ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            CUSTOMER_COLUMNS
        );
        sqlx::query(&sql)
            .bind(&customer.id)
            .bind(&customer.outlet_id)
            .bind(customer.service_day)
            .bind(&customer.token)
            .bind(i64::from(customer.token_sequence))
            .bind(&customer.name)
            .bind(&customer.contact)
            .bind(&customer.email)
            .bind(&customer.service_type)
            .bind(customer.priority.as_str())
            .bind(customer.status.as_str())
            .bind(customer.queue_position.map(i64::from))
            .bind(to_i64(customer.estimated_wait_secs)?)
            .bind(customer.actual_wait_secs.map(to_i64).transpose()?)
            .bind(customer.registration_time)
            .bind(customer.service_start_time)
            .bind(customer.service_end_time)
            .bind(customer.cancelled_time)
            .bind(&customer.assigned_officer_id)
            .bind(customer.feedback.as_ref().map(|f| i64::from(f.rating)))
            .bind(customer.feedback.as_ref().and_then(|f| f.comment.clone()))
            .bind(customer.feedback.as_ref().map(|f| f.submitted_at))
            .execute(&mut **tx)
            .await
            .map_err(|e| write_error(e, &format!("insert {}", customer.token)))?;
        Ok(())
    }

    /// Guarded by the entry's expected status, position and feedback state
    async fn update_customer(tx: &mut Transaction<'_, Sqlite>, update: &EntryUpdate) -> Result<()> {
        let customer = &update.customer;
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?, contact = ?, email = ?, service_type = ?, priority = ?,
                status = ?, queue_position = ?, estimated_wait_secs = ?, actual_wait_secs = ?,
                service_start_time = ?, service_end_time = ?, cancelled_time = ?,
                assigned_officer_id = ?, feedback_rating = ?, feedback_comment = ?,
                feedback_submitted_at = ?
            WHERE id = ? AND status = ? AND queue_position IS ?
                AND (feedback_rating IS NOT NULL) = ?
            "#,
        )
        .bind(&customer.name)
        .bind(&customer.contact)
        .bind(&customer.email)
        .bind(&customer.service_type)
        .bind(customer.priority.as_str())
        .bind(customer.status.as_str())
        .bind(customer.queue_position.map(i64::from))
        .bind(to_i64(customer.estimated_wait_secs)?)
        .bind(customer.actual_wait_secs.map(to_i64).transpose()?)
        .bind(customer.service_start_time)
        .bind(customer.service_end_time)
        .bind(customer.cancelled_time)
        .bind(&customer.assigned_officer_id)
        .bind(customer.feedback.as_ref().map(|f| i64::from(f.rating)))
        .bind(customer.feedback.as_ref().and_then(|f| f.comment.clone()))
        .bind(customer.feedback.as_ref().map(|f| f.submitted_at))
        .bind(&customer.id)
        .bind(update.expected_status.as_str())
        .bind(update.expected_position.map(i64::from))
        .bind(update.expected_has_feedback)
        .execute(&mut **tx)
        .await
        .map_err(|e| write_error(e, &format!("update {}", customer.token)))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ?")
            .bind(&customer.id)
            .fetch_optional(&mut **tx)
            .await?;
        match exists {
            Some(_) => Err(StorageConflict(format!(
                "{} changed since it was read (expected {})",
                customer.token, update.expected_status
            ))
            .into()),
            None => bail!("Customer {} does not exist", customer.id),
        }
    }

    async fn upsert_queue_day(tx: &mut Transaction<'_, Sqlite>, queue_day: &QueueDay) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO queue_days (
                outlet_id, service_day, currently_serving, total_registered, total_waiting,
                total_served, wait_time_total_secs, wait_time_samples, peak_hours, last_updated
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(outlet_id, service_day) DO UPDATE SET
                currently_serving = excluded.currently_serving,
                total_registered = excluded.total_registered,
                total_waiting = excluded.total_waiting,
                total_served = excluded.total_served,
                wait_time_total_secs = excluded.wait_time_total_secs,
                wait_time_samples = excluded.wait_time_samples,
                peak_hours = excluded.peak_hours,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&queue_day.outlet_id)
        .bind(queue_day.service_day)
        .bind(&queue_day.currently_serving)
        .bind(i64::from(queue_day.total_registered))
        .bind(i64::from(queue_day.total_waiting))
        .bind(i64::from(queue_day.total_served))
        .bind(to_i64(queue_day.wait_time_total_secs)?)
        .bind(i64::from(queue_day.wait_time_samples))
        .bind(serde_json::to_string(&queue_day.peak_hours)?)
        .bind(queue_day.last_updated)
        .execute(&mut **tx)
        .await
        .context("Failed to store queue aggregate")?;
        Ok(())
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).context("Value out of range for SQLite integer")
}

/// Unique-index violations become a `StorageConflict` the domain can retry on
fn write_error(error: sqlx::Error, operation: &str) -> anyhow::Error {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            anyhow::Error::new(StorageConflict(format!("{}: {}", operation, db_error.message())))
        }
        _ => anyhow::Error::new(error).context(format!("Failed to {}", operation)),
    }
}

/// Entries losing their position are written before entries taking one,
/// lowest position first, so the waiting-position index never sees two
/// holders of the same slot.
fn update_order(updated: &[EntryUpdate]) -> Vec<&EntryUpdate> {
    let mut ordered: Vec<&EntryUpdate> = updated.iter().collect();
    ordered.sort_by_key(|u| match (u.customer.status, u.customer.queue_position) {
        (CustomerStatus::Waiting, Some(position)) => (1, position),
        _ => (0, 0),
    });
    ordered
}

#[async_trait]
impl LedgerStorage for LedgerRepository {
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE id = ?", CUSTOMER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(customer_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::customer_from_row).transpose()
    }

    async fn find_by_token(&self, key: &LedgerKey, token: &str) -> Result<Option<Customer>> {
        let sql = format!(
            "SELECT {} FROM customers WHERE outlet_id = ? AND service_day = ? AND token = ?",
            CUSTOMER_COLUMNS
        );
        Ok(self.fetch_customers(&sql, key, Some(token)).await?.into_iter().next())
    }

    async fn find_active_by_contact(&self, key: &LedgerKey, contact: &str) -> Result<Option<Customer>> {
        let sql = format!(
            r#"
            SELECT {} FROM customers
            WHERE outlet_id = ? AND service_day = ? AND contact = ?
              AND status IN ('waiting', 'being_served')
            ORDER BY token_sequence ASC
            LIMIT 1
            "#,
            CUSTOMER_COLUMNS
        );
        Ok(self.fetch_customers(&sql, key, Some(contact)).await?.into_iter().next())
    }

    async fn list_customers(&self, key: &LedgerKey) -> Result<Vec<Customer>> {
        let sql = format!(
            "SELECT {} FROM customers WHERE outlet_id = ? AND service_day = ? ORDER BY token_sequence ASC",
            CUSTOMER_COLUMNS
        );
        self.fetch_customers(&sql, key, None).await
    }

    async fn list_waiting(&self, key: &LedgerKey, limit: Option<u32>) -> Result<Vec<Customer>> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(i64::from).unwrap_or(-1);
        let sql = format!(
            r#"
            SELECT {} FROM customers
            WHERE outlet_id = ? AND service_day = ? AND status = 'waiting'
            ORDER BY queue_position ASC
            LIMIT ?
            "#,
            CUSTOMER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&key.outlet_id)
            .bind(key.service_day)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(Self::customer_from_row).collect()
    }

    async fn count_registrations(&self, key: &LedgerKey) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM customers WHERE outlet_id = ? AND service_day = ?",
        )
        .bind(&key.outlet_id)
        .bind(key.service_day)
        .fetch_one(self.db.pool())
        .await?;
        Ok(u32::try_from(count)?)
    }

    async fn count_waiting(&self, key: &LedgerKey) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM customers WHERE outlet_id = ? AND service_day = ? AND status = 'waiting'",
        )
        .bind(&key.outlet_id)
        .bind(key.service_day)
        .fetch_one(self.db.pool())
        .await?;
        Ok(u32::try_from(count)?)
    }

    async fn get_queue_day(&self, key: &LedgerKey) -> Result<Option<QueueDay>> {
        let row = sqlx::query("SELECT * FROM queue_days WHERE outlet_id = ? AND service_day = ?")
            .bind(&key.outlet_id)
            .bind(key.service_day)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::queue_day_from_row).transpose()
    }

    async fn commit(&self, commit: &LedgerCommit) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        if let Some(customer) = &commit.inserted {
            Self::insert_customer(&mut tx, customer).await?;
        }
        for update in update_order(&commit.updated) {
            Self::update_customer(&mut tx, update).await?;
        }
        Self::upsert_queue_day(&mut tx, &commit.queue_day).await?;

        tx.commit().await.context("Failed to commit ledger transaction")?;
        debug!(
            "Committed ledger {}@{}: {} inserted, {} updated",
            commit.queue_day.outlet_id,
            commit.queue_day.service_day,
            usize::from(commit.inserted.is_some()),
            commit.updated.len()
        );
        Ok(())
    }
}
