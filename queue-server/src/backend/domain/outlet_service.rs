use anyhow::{Context, Result};
use log::{info, warn};
use std::time::Duration;

use crate::backend::domain::errors::{QueueError, QueueResult};
use crate::backend::domain::ledger::bounded;
use crate::backend::domain::models::outlet::{Outlet, ServiceType};
use crate::backend::domain::settings::QueueSettings;
use crate::backend::storage::{Connection, OutletStorage};

/// Read access to the outlet directory and service-type catalog
#[derive(Clone)]
pub struct OutletService<C: Connection> {
    repository: C::OutletRepository,
    operation_timeout: Duration,
}

impl<C: Connection> OutletService<C> {
    pub fn new(connection: &C, settings: &QueueSettings) -> Self {
        Self {
            repository: connection.create_outlet_repository(),
            operation_timeout: settings.operation_timeout,
        }
    }

    /// Resolve an outlet or fail with `OutletNotFound`
    pub async fn get_outlet(&self, outlet_id: &str) -> QueueResult<Outlet> {
        let outlet = bounded("get outlet", self.operation_timeout, self.repository.get_outlet(outlet_id)).await?;

        match outlet {
            Some(outlet) => Ok(outlet),
            None => {
                warn!("Outlet not found: {}", outlet_id);
                Err(QueueError::OutletNotFound(outlet_id.to_string()))
            }
        }
    }

    pub async fn list_outlets(&self) -> QueueResult<Vec<Outlet>> {
        let outlets = bounded("list outlets", self.operation_timeout, self.repository.list_outlets()).await?;
        info!("Found {} outlets", outlets.len());
        Ok(outlets)
    }

    pub async fn list_service_types(&self) -> QueueResult<Vec<ServiceType>> {
        bounded(
            "list service types",
            self.operation_timeout,
            self.repository.list_service_types(),
        )
        .await
    }

    /// Store a loaded directory, replacing entries with matching ids.
    /// Returns the number of outlets stored.
    pub async fn import(&self, outlets: &[Outlet], service_types: &[ServiceType]) -> Result<usize> {
        for service_type in service_types {
            self.repository
                .store_service_type(service_type)
                .await
                .with_context(|| format!("Failed to import service type {}", service_type.id))?;
        }
        for outlet in outlets {
            self.repository
                .store_outlet(outlet)
                .await
                .with_context(|| format!("Failed to import outlet {}", outlet.id))?;
        }

        info!(
            "Imported {} outlets and {} service types",
            outlets.len(),
            service_types.len()
        );
        Ok(outlets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::test_support::test_outlet;
    use crate::backend::storage::csv::test_utils::TestEnvironment;
    use crate::backend::storage::sqlite::test_support::TestDatabase;

    fn bill_payments() -> ServiceType {
        ServiceType {
            id: "bill-payments".to_string(),
            name: "Bill Payments".to_string(),
            description: "Settle outstanding bills".to_string(),
            category: "Billing".to_string(),
            estimated_minutes: 8,
            is_active: true,
        }
    }

    async fn scenario_import_and_get<C: Connection>(connection: &C) {
        let service = OutletService::new(connection, &QueueSettings::default());

        let imported = service
            .import(&[test_outlet(40)], &[bill_payments()])
            .await
            .expect("Failed to import directory");
        assert_eq!(imported, 1);

        let outlet = service.get_outlet("colombo-01").await.expect("Failed to get outlet");
        assert_eq!(outlet, test_outlet(40));

        let service_types = service.list_service_types().await.unwrap();
        assert_eq!(service_types, vec![bill_payments()]);

        // Importing again replaces rather than duplicates
        service.import(&[test_outlet(10)], &[]).await.unwrap();
        let outlets = service.list_outlets().await.unwrap();
        assert_eq!(outlets.len(), 1);
        assert_eq!(outlets[0].capacity, 10);
    }

    #[tokio::test]
    async fn test_import_and_get_sqlite() {
        let db = TestDatabase::new().await.expect("Failed to create test database");
        scenario_import_and_get(&db.connection).await;
    }

    #[tokio::test]
    async fn test_import_and_get_csv() {
        let env = TestEnvironment::new().await.expect("Failed to create test environment");
        scenario_import_and_get(&env.connection).await;
    }

    #[tokio::test]
    async fn test_get_unknown_outlet() {
        let db = TestDatabase::new().await.expect("Failed to create test database");
        let service = OutletService::new(&db.connection, &QueueSettings::default());

        let result = service.get_outlet("nowhere").await;
        assert!(matches!(result, Err(QueueError::OutletNotFound(id)) if id == "nowhere"));
    }
}
