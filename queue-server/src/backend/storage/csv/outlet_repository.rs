//! # CSV Outlet Repository
//!
//! The whole outlet directory lives in one `directory.yaml` file at the root
//! of the data directory. It is small and written only when the directory
//! is imported, so every store rewrites the file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;

use super::connection::{write_atomically, CsvConnection};
use crate::backend::domain::models::outlet::{Outlet, ServiceType};
use crate::backend::storage::traits::OutletStorage;

#[derive(Debug, Default, Serialize, Deserialize)]
struct DirectoryRecord {
    #[serde(default)]
    outlets: Vec<Outlet>,
    #[serde(default)]
    service_types: Vec<ServiceType>,
}

#[derive(Clone)]
pub struct OutletRepository {
    connection: CsvConnection,
}

impl OutletRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn read_directory(&self) -> Result<DirectoryRecord> {
        let path = self.connection.directory_file();
        if !path.exists() {
            return Ok(DirectoryRecord::default());
        }
        let yaml_content = fs::read_to_string(&path)?;
        serde_yaml::from_str(&yaml_content).with_context(|| format!("Failed to parse {:?}", path))
    }

    fn write_directory(&self, directory: &DirectoryRecord) -> Result<()> {
        let yaml_content = serde_yaml::to_string(directory)?;
        write_atomically(&self.connection.directory_file(), |writer| {
            writer.write_all(yaml_content.as_bytes())?;
            Ok(())
        })
    }
}

#[async_trait]
impl OutletStorage for OutletRepository {
    async fn store_outlet(&self, outlet: &Outlet) -> Result<()> {
        let _guard = self.connection.directory_lock().lock().await;
        let mut directory = self.read_directory()?;

        directory.outlets.retain(|existing| existing.id != outlet.id);
        directory.outlets.push(outlet.clone());
        directory.outlets.sort_by(|a, b| a.id.cmp(&b.id));

        self.write_directory(&directory)?;
        debug!("Stored outlet {}", outlet.id);
        Ok(())
    }

    async fn get_outlet(&self, outlet_id: &str) -> Result<Option<Outlet>> {
        let directory = self.read_directory()?;
        Ok(directory.outlets.into_iter().find(|outlet| outlet.id == outlet_id))
    }

    async fn list_outlets(&self) -> Result<Vec<Outlet>> {
        Ok(self.read_directory()?.outlets)
    }

    async fn store_service_type(&self, service_type: &ServiceType) -> Result<()> {
        let _guard = self.connection.directory_lock().lock().await;
        let mut directory = self.read_directory()?;

        directory.service_types.retain(|existing| existing.id != service_type.id);
        directory.service_types.push(service_type.clone());
        directory.service_types.sort_by(|a, b| a.id.cmp(&b.id));

        self.write_directory(&directory)?;
        debug!("Stored service type {}", service_type.id);
        Ok(())
    }

    async fn list_service_types(&self) -> Result<Vec<ServiceType>> {
        Ok(self.read_directory()?.service_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::test_support::test_outlet;
    use crate::backend::storage::csv::test_utils::TestEnvironment;

    #[tokio::test]
    async fn test_store_and_get_outlet() {
        let env = TestEnvironment::new().await.expect("Failed to create test environment");
        let repo = OutletRepository::new(env.connection.clone());

        assert!(repo.list_outlets().await.unwrap().is_empty());

        let outlet = test_outlet(25);
        repo.store_outlet(&outlet).await.expect("Failed to store outlet");

        assert_eq!(repo.get_outlet(&outlet.id).await.unwrap(), Some(outlet));
        assert!(repo.get_outlet("missing").await.unwrap().is_none());
        assert!(env.base_directory().join("directory.yaml").exists());
    }

    #[tokio::test]
    async fn test_outlets_sorted_and_replaced() {
        let env = TestEnvironment::new().await.expect("Failed to create test environment");
        let repo = OutletRepository::new(env.connection.clone());

        let mut kandy = test_outlet(10);
        kandy.id = "kandy-01".to_string();
        let mut colombo = test_outlet(10);
        repo.store_outlet(&kandy).await.unwrap();
        repo.store_outlet(&colombo).await.unwrap();
        colombo.capacity = 3;
        repo.store_outlet(&colombo).await.unwrap();

        let outlets = repo.list_outlets().await.unwrap();
        let ids: Vec<&str> = outlets.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["colombo-01", "kandy-01"]);
        assert_eq!(outlets[0].capacity, 3);
    }

    #[tokio::test]
    async fn test_directory_survives_reconnect() {
        let env = TestEnvironment::new().await.expect("Failed to create test environment");
        OutletRepository::new(env.connection.clone())
            .store_outlet(&test_outlet(25))
            .await
            .unwrap();

        let reopened = CsvConnection::new(env.base_directory()).unwrap();
        let outlet = OutletRepository::new(reopened).get_outlet("colombo-01").await.unwrap();
        assert_eq!(outlet.map(|o| o.capacity), Some(25));
    }
}
