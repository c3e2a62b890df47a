use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::backend::domain::models::outlet::{Outlet, OutletConfiguration, ServiceType};
use crate::backend::storage::sqlite::connection::DbConnection;
use crate::backend::storage::traits::OutletStorage;

/// Repository for the outlet directory and service-type catalog
#[derive(Clone)]
pub struct OutletRepository {
    db: DbConnection,
}

impl OutletRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn outlet_from_row(row: &SqliteRow) -> Result<Outlet> {
        let id: String = row.try_get("id")?;
        let service_types: String = row.try_get("service_types")?;
        let operating_hours: String = row.try_get("operating_hours")?;
        let priority_multipliers: String = row.try_get("priority_multipliers")?;

        Ok(Outlet {
            name: row.try_get("name")?,
            location: row.try_get("location")?,
            address: row.try_get("address")?,
            capacity: u32::try_from(row.try_get::<i64, _>("capacity")?)?,
            service_types: serde_json::from_str(&service_types)
                .with_context(|| format!("Bad service_types for outlet {}", id))?,
            operating_hours: serde_json::from_str(&operating_hours)
                .with_context(|| format!("Bad operating_hours for outlet {}", id))?,
            is_active: row.try_get("is_active")?,
            configuration: OutletConfiguration {
                average_service_minutes: u32::try_from(row.try_get::<i64, _>("average_service_minutes")?)?,
                minimum_wait_minutes: u32::try_from(row.try_get::<i64, _>("minimum_wait_minutes")?)?,
                priority_multipliers: serde_json::from_str(&priority_multipliers)
                    .with_context(|| format!("Bad priority_multipliers for outlet {}", id))?,
            },
            id,
        })
    }

    fn service_type_from_row(row: &SqliteRow) -> Result<ServiceType> {
        Ok(ServiceType {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            estimated_minutes: u32::try_from(row.try_get::<i64, _>("estimated_minutes")?)?,
            is_active: row.try_get("is_active")?,
        })
    }
}

#[async_trait]
impl OutletStorage for OutletRepository {
    async fn store_outlet(&self, outlet: &Outlet) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outlets (
                id, name, location, address, capacity, service_types, operating_hours,
                is_active, average_service_minutes, minimum_wait_minutes, priority_multipliers
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                location = excluded.location,
                address = excluded.address,
                capacity = excluded.capacity,
                service_types = excluded.service_types,
                operating_hours = excluded.operating_hours,
                is_active = excluded.is_active,
                average_service_minutes = excluded.average_service_minutes,
                minimum_wait_minutes = excluded.minimum_wait_minutes,
                priority_multipliers = excluded.priority_multipliers
            "#,
        )
        .bind(&outlet.id)
        .bind(&outlet.name)
        .bind(&outlet.location)
        .bind(&outlet.address)
        .bind(i64::from(outlet.capacity))
        .bind(serde_json::to_string(&outlet.service_types)?)
        .bind(serde_json::to_string(&outlet.operating_hours)?)
        .bind(outlet.is_active)
        .bind(i64::from(outlet.configuration.average_service_minutes))
        .bind(i64::from(outlet.configuration.minimum_wait_minutes))
        .bind(serde_json::to_string(&outlet.configuration.priority_multipliers)?)
        .execute(self.db.pool())
        .await
        .with_context(|| format!("Failed to store outlet {}", outlet.id))?;
        Ok(())
    }

    async fn get_outlet(&self, outlet_id: &str) -> Result<Option<Outlet>> {
        let row = sqlx::query("SELECT * FROM outlets WHERE id = ?")
            .bind(outlet_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::outlet_from_row).transpose()
    }

    async fn list_outlets(&self) -> Result<Vec<Outlet>> {
        let rows = sqlx::query("SELECT * FROM outlets ORDER BY id ASC")
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(Self::outlet_from_row).collect()
    }

    async fn store_service_type(&self, service_type: &ServiceType) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO service_types (id, name, description, category, estimated_minutes, is_active)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                category = excluded.category,
                estimated_minutes = excluded.estimated_minutes,
                is_active = excluded.is_active
            "#,
        )
        .bind(&service_type.id)
        .bind(&service_type.name)
        .bind(&service_type.description)
        .bind(&service_type.category)
        .bind(i64::from(service_type.estimated_minutes))
        .bind(service_type.is_active)
        .execute(self.db.pool())
        .await
        .with_context(|| format!("Failed to store service type {}", service_type.id))?;
        Ok(())
    }

    async fn list_service_types(&self) -> Result<Vec<ServiceType>> {
        let rows = sqlx::query("SELECT * FROM service_types ORDER BY id ASC")
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(Self::service_type_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::test_support::test_outlet;
    use crate::backend::storage::sqlite::test_support::TestDatabase;

    #[tokio::test]
    async fn test_store_and_get_outlet() {
        let db = TestDatabase::new().await.expect("Failed to create test database");
        let repo = OutletRepository::new(db.connection.clone());
        let outlet = test_outlet(25);

        repo.store_outlet(&outlet).await.expect("Failed to store outlet");

        let retrieved = repo.get_outlet(&outlet.id).await.expect("Failed to get outlet");
        assert_eq!(retrieved, Some(outlet));
        assert!(repo.get_outlet("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_outlet_replaces_existing() {
        let db = TestDatabase::new().await.expect("Failed to create test database");
        let repo = OutletRepository::new(db.connection.clone());

        let mut outlet = test_outlet(25);
        repo.store_outlet(&outlet).await.unwrap();
        outlet.capacity = 5;
        outlet.configuration.priority_multipliers.vip = 0.25;
        repo.store_outlet(&outlet).await.unwrap();

        let outlets = repo.list_outlets().await.unwrap();
        assert_eq!(outlets.len(), 1);
        assert_eq!(outlets[0].capacity, 5);
        assert_eq!(outlets[0].configuration.priority_multipliers.vip, 0.25);
    }

    #[tokio::test]
    async fn test_service_types_sorted_by_id() {
        let db = TestDatabase::new().await.expect("Failed to create test database");
        let repo = OutletRepository::new(db.connection.clone());

        for id in ["technical-support", "bill-payments"] {
            repo.store_service_type(&ServiceType {
                id: id.to_string(),
                name: id.replace('-', " "),
                description: String::new(),
                category: "General".to_string(),
                estimated_minutes: 10,
                is_active: true,
            })
            .await
            .unwrap();
        }

        let ids: Vec<String> = repo
            .list_service_types()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["bill-payments", "technical-support"]);
    }
}
