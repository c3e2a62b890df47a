use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::backend::domain::commands::queries::{
    EntryByTokenQuery, QueueSnapshotQuery, QueueSnapshotResult, ReconcileResult,
};
use crate::backend::domain::errors::{QueueError, QueueResult};
use crate::backend::domain::ledger::{CommitOutcome, LedgerKey, QueueLedger};
use crate::backend::domain::models::customer::Customer;
use crate::backend::domain::models::queue_day::QueueDay;
use crate::backend::domain::outlet_service::OutletService;
use crate::backend::storage::{Connection, LedgerCommit, LedgerStorage};

/// How many upcoming tokens a snapshot lists
pub const NEXT_TOKENS_LIMIT: u32 = 12;

/// Read side of the queue: snapshots, entry lookups and aggregate repair
#[derive(Clone)]
pub struct QueueQueryService<C: Connection> {
    ledger: QueueLedger<C>,
    outlet_service: OutletService<C>,
}

impl<C: Connection> QueueQueryService<C> {
    pub fn new(ledger: QueueLedger<C>, outlet_service: OutletService<C>) -> Self {
        Self {
            ledger,
            outlet_service,
        }
    }

    /// Current aggregate plus the next tokens in line. The aggregate is
    /// created from the ledger the first time a day is looked at.
    pub async fn get_queue_snapshot(&self, query: QueueSnapshotQuery) -> QueueResult<QueueSnapshotResult> {
        let outlet = self.outlet_service.get_outlet(&query.outlet_id).await?;
        let key = self.key(&outlet.id, query.service_day);
        let repository = self.ledger.repository();

        let queue_day = match self
            .ledger
            .storage("get queue day", repository.get_queue_day(&key))
            .await?
        {
            Some(queue_day) => queue_day,
            None => self.create_queue_day(&key).await?,
        };

        let next_tokens = self
            .ledger
            .storage("list waiting", repository.list_waiting(&key, Some(NEXT_TOKENS_LIMIT)))
            .await?
            .into_iter()
            .map(|customer| customer.token)
            .collect::<Vec<_>>();

        debug!(
            "Snapshot for {}: {} waiting, next {:?}",
            key, queue_day.total_waiting, next_tokens
        );
        Ok(QueueSnapshotResult {
            queue_day,
            next_tokens,
        })
    }

    pub async fn get_entry(&self, customer_id: &str) -> QueueResult<Customer> {
        self.ledger
            .storage("get customer", self.ledger.repository().get_customer(customer_id))
            .await?
            .ok_or_else(|| QueueError::NotFound(format!("Customer {}", customer_id)))
    }

    pub async fn get_entry_by_token(&self, query: EntryByTokenQuery) -> QueueResult<Customer> {
        let token = query.token.trim().to_uppercase();
        if Customer::parse_token(&token).is_none() {
            return Err(QueueError::validation(format!("Invalid token: {}", query.token)));
        }

        let outlet = self.outlet_service.get_outlet(&query.outlet_id).await?;
        let key = self.key(&outlet.id, query.service_day);

        self.ledger
            .storage("find by token", self.ledger.repository().find_by_token(&key, &token))
            .await?
            .ok_or_else(|| QueueError::NotFound(format!("Token {} at {}", token, key)))
    }

    /// Rebuild the aggregate from the ledger and store it
    pub async fn reconcile(&self, outlet_id: &str, service_day: Option<NaiveDate>) -> QueueResult<ReconcileResult> {
        let outlet = self.outlet_service.get_outlet(outlet_id).await?;
        let key = self.key(&outlet.id, service_day);
        let _guard = self.ledger.lock(&key).await?;

        let day = self.ledger.load_day(&key).await?;
        let stored = self
            .ledger
            .storage("get queue day", self.ledger.repository().get_queue_day(&key))
            .await?;
        let rebuilt = QueueDay::recompute(
            &key.outlet_id,
            key.service_day,
            day.entries(),
            self.ledger.settings().utc_offset,
            self.ledger.now(),
        );

        let was_consistent = stored
            .as_ref()
            .map(|stored| stored.matches_counters(&rebuilt))
            .unwrap_or(false);
        if was_consistent {
            info!("Aggregate for {} already matches its ledger", key);
        } else {
            warn!("Aggregate for {} was out of date; rebuilt from ledger", key);
        }

        self.store_queue_day(&key, rebuilt.clone()).await?;
        Ok(ReconcileResult {
            queue_day: rebuilt,
            was_consistent,
        })
    }

    fn key(&self, outlet_id: &str, service_day: Option<NaiveDate>) -> LedgerKey {
        match service_day {
            Some(day) => LedgerKey::new(outlet_id, day),
            None => self.ledger.today_key(outlet_id),
        }
    }

    async fn create_queue_day(&self, key: &LedgerKey) -> QueueResult<QueueDay> {
        let _guard = self.ledger.lock(key).await?;

        // Another request may have created it while we waited for the lock
        let day = self.ledger.load_day(key).await?;
        let queue_day = self.ledger.queue_day_or_recompute(&day).await?;
        self.store_queue_day(key, queue_day.clone()).await?;

        info!("Created queue aggregate for {}", key);
        Ok(queue_day)
    }

    async fn store_queue_day(&self, key: &LedgerKey, queue_day: QueueDay) -> QueueResult<()> {
        let commit = LedgerCommit {
            inserted: None,
            updated: Vec::new(),
            queue_day,
        };
        match self.ledger.commit(&commit).await? {
            CommitOutcome::Committed => Ok(()),
            CommitOutcome::Conflict(reason) => Err(QueueError::Repository(format!(
                "Could not store aggregate for {}: {}",
                key, reason
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::commands::transitions::TransitionCommand;
    use crate::backend::domain::settings::QueueSettings;
    use crate::backend::domain::test_support::{register_command, ServiceHarness, TEST_OUTLET};
    use crate::backend::storage::csv::test_utils::TestEnvironment;
    use crate::backend::storage::sqlite::test_support::TestDatabase;
    use chrono::Duration;
    use shared::CustomerStatus;

    fn snapshot_query(day: Option<NaiveDate>) -> QueueSnapshotQuery {
        QueueSnapshotQuery {
            outlet_id: TEST_OUTLET.to_string(),
            service_day: day,
        }
    }

    async fn scenario_snapshot<C: Connection>(connection: &C) {
        let harness = ServiceHarness::new(connection, QueueSettings::default()).await.unwrap();

        let empty = harness.queries.get_queue_snapshot(snapshot_query(None)).await.unwrap();
        assert_eq!(empty.queue_day.total_waiting, 0);
        assert!(empty.next_tokens.is_empty());
        assert_eq!(empty.queue_day.average_wait_secs(), None);

        let mut customers = Vec::new();
        for i in 0..14 {
            customers.push(
                harness
                    .admission
                    .register(register_command(&format!("Customer {}", i), &format!("07710000{:02}", i)))
                    .await
                    .unwrap(),
            );
        }
        harness
            .transitions
            .transition(TransitionCommand {
                customer_id: customers[0].id.clone(),
                target_status: CustomerStatus::BeingServed,
                officer_id: Some("officer-1".to_string()),
            })
            .await
            .unwrap();

        let first = harness.queries.get_queue_snapshot(snapshot_query(None)).await.unwrap();
        let second = harness.queries.get_queue_snapshot(snapshot_query(None)).await.unwrap();

        assert_eq!(first.queue_day, second.queue_day);
        assert_eq!(first.next_tokens, second.next_tokens);
        assert_eq!(first.queue_day.total_waiting, 13);
        assert_eq!(first.queue_day.total_registered, 14);
        assert_eq!(first.queue_day.currently_serving.as_deref(), Some("T001"));
        assert_eq!(first.next_tokens.len(), NEXT_TOKENS_LIMIT as usize);
        assert_eq!(first.next_tokens[0], "T002");
        assert_eq!(first.next_tokens[11], "T013");
    }

    #[tokio::test]
    async fn test_snapshot_sqlite() {
        let db = TestDatabase::new().await.unwrap();
        scenario_snapshot(&db.connection).await;
    }

    #[tokio::test]
    async fn test_snapshot_csv() {
        let env = TestEnvironment::new().await.unwrap();
        scenario_snapshot(&env.connection).await;
    }

    #[tokio::test]
    async fn test_snapshot_for_past_day() {
        let db = TestDatabase::new().await.unwrap();
        let harness = ServiceHarness::new(&db.connection, QueueSettings::default()).await.unwrap();
        let yesterday_day = harness.clock_day();
        harness.admission.register(register_command("Alice", "0771000001")).await.unwrap();

        harness.clock.advance(Duration::days(1));
        let today = harness.queries.get_queue_snapshot(snapshot_query(None)).await.unwrap();
        let yesterday = harness
            .queries
            .get_queue_snapshot(snapshot_query(Some(yesterday_day)))
            .await
            .unwrap();

        assert_eq!(today.queue_day.total_registered, 0);
        assert_eq!(yesterday.queue_day.total_registered, 1);
        assert_eq!(yesterday.next_tokens, vec!["T001".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshot_unknown_outlet() {
        let db = TestDatabase::new().await.unwrap();
        let harness = ServiceHarness::new(&db.connection, QueueSettings::default()).await.unwrap();

        let result = harness
            .queries
            .get_queue_snapshot(QueueSnapshotQuery {
                outlet_id: "nowhere".to_string(),
                service_day: None,
            })
            .await;
        assert!(matches!(result, Err(QueueError::OutletNotFound(_))));
    }

    async fn scenario_entry_by_token<C: Connection>(connection: &C) {
        let harness = ServiceHarness::new(connection, QueueSettings::default()).await.unwrap();
        let a = harness.admission.register(register_command("Alice", "0771000001")).await.unwrap();

        let found = harness
            .queries
            .get_entry_by_token(EntryByTokenQuery {
                outlet_id: TEST_OUTLET.to_string(),
                token: "t001".to_string(),
                service_day: None,
            })
            .await
            .unwrap();
        assert_eq!(found.id, a.id);
        assert_eq!(found.name, "Alice");

        let missing = harness
            .queries
            .get_entry_by_token(EntryByTokenQuery {
                outlet_id: TEST_OUTLET.to_string(),
                token: "T002".to_string(),
                service_day: None,
            })
            .await;
        assert!(matches!(missing, Err(QueueError::NotFound(_))));

        let malformed = harness
            .queries
            .get_entry_by_token(EntryByTokenQuery {
                outlet_id: TEST_OUTLET.to_string(),
                token: "abc".to_string(),
                service_day: None,
            })
            .await;
        assert!(matches!(malformed, Err(QueueError::Validation(_))));

        let other_day = harness
            .queries
            .get_entry_by_token(EntryByTokenQuery {
                outlet_id: TEST_OUTLET.to_string(),
                token: "T001".to_string(),
                service_day: harness.clock_day().succ_opt(),
            })
            .await;
        assert!(matches!(other_day, Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_entry_by_token_sqlite() {
        let db = TestDatabase::new().await.unwrap();
        scenario_entry_by_token(&db.connection).await;
    }

    #[tokio::test]
    async fn test_entry_by_token_csv() {
        let env = TestEnvironment::new().await.unwrap();
        scenario_entry_by_token(&env.connection).await;
    }

    #[tokio::test]
    async fn test_get_entry_not_found() {
        let db = TestDatabase::new().await.unwrap();
        let harness = ServiceHarness::new(&db.connection, QueueSettings::default()).await.unwrap();

        assert!(matches!(
            harness.queries.get_entry("customer::outlet-a::20240304::T001").await,
            Err(QueueError::NotFound(_))
        ));
        assert!(matches!(
            harness.queries.get_entry("garbage").await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_entry_id_cannot_leave_data_directory() {
        use crate::backend::storage::csv::CsvConnection;

        let env = TestEnvironment::new().await.unwrap();
        let data = CsvConnection::new(env.base_directory().join("data")).unwrap();
        let elsewhere = CsvConnection::new(env.base_directory().join("elsewhere")).unwrap();

        // A ledger outside the data directory that a crafted id would reach
        // through data/ledger/../../elsewhere/ledger/colombo-01
        let planted = ServiceHarness::new(&elsewhere, QueueSettings::default()).await.unwrap();
        let original = planted.admission.register(register_command("Alice", "0771000001")).await.unwrap();
        let crafted_id = "customer::../../elsewhere/ledger/colombo-01::20240304::T002";
        let mut crafted = original.clone();
        crafted.id = crafted_id.to_string();
        crafted.token = "T002".to_string();
        crafted.token_sequence = 2;
        crafted.contact = "0771000002".to_string();
        crafted.queue_position = Some(2);
        let key = LedgerKey::new(TEST_OUTLET, original.service_day);
        planted
            .ledger
            .repository()
            .commit(&LedgerCommit {
                inserted: Some(crafted),
                updated: Vec::new(),
                queue_day: QueueDay::new(TEST_OUTLET, key.service_day, original.registration_time),
            })
            .await
            .unwrap();
        assert!(elsewhere.customers_file(&key).exists());

        let harness = ServiceHarness::new(&data, QueueSettings::default()).await.unwrap();
        assert!(matches!(
            harness.queries.get_entry(crafted_id).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drifted_aggregate() {
        let db = TestDatabase::new().await.unwrap();
        let harness = ServiceHarness::new(&db.connection, QueueSettings::default()).await.unwrap();
        harness.admission.register(register_command("Alice", "0771000001")).await.unwrap();
        harness.admission.register(register_command("Bob", "0771000002")).await.unwrap();

        let first = harness.queries.reconcile(TEST_OUTLET, None).await.unwrap();
        assert!(first.was_consistent);
        assert_eq!(first.queue_day.total_waiting, 2);

        // Simulate drift by storing a wrong aggregate
        let key = LedgerKey::new(TEST_OUTLET, harness.clock_day());
        let mut drifted = first.queue_day.clone();
        drifted.total_waiting = 7;
        harness
            .ledger
            .repository()
            .commit(&LedgerCommit {
                inserted: None,
                updated: Vec::new(),
                queue_day: drifted,
            })
            .await
            .unwrap();

        let repaired = harness.queries.reconcile(TEST_OUTLET, None).await.unwrap();
        assert!(!repaired.was_consistent);
        assert_eq!(repaired.queue_day.total_waiting, 2);

        let stored = harness.ledger.repository().get_queue_day(&key).await.unwrap().unwrap();
        assert_eq!(stored.total_waiting, 2);
    }
}
