//! Outlet directory file.
//!
//! Outlets and the service-type catalog are maintained outside the service
//! and loaded from a YAML file at startup:
//!
//! ```yaml
//! service_types:
//!   - id: bill-payments
//!     name: Bill Payments
//!     ...
//! outlets:
//!   - id: colombo-01
//!     operating_hours: { open: "08:30", close: "16:30", days: [monday, ...] }
//!     ...
//! ```

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::backend::domain::models::outlet::{Outlet, ServiceType};
use crate::backend::io::rest::mappers::outlet_mapper::OutletMapper;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryFile {
    #[serde(default)]
    pub service_types: Vec<shared::ServiceType>,
    #[serde(default)]
    pub outlets: Vec<shared::Outlet>,
}

impl DirectoryFile {
    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read outlet directory {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid outlet directory {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let file: DirectoryFile = serde_yaml::from_str(contents)?;
        info!(
            "Parsed outlet directory: {} outlets, {} service types",
            file.outlets.len(),
            file.service_types.len()
        );
        Ok(file)
    }

    /// Validate every record and convert to domain models. One bad record
    /// rejects the whole file.
    pub fn into_domain(self) -> Result<(Vec<Outlet>, Vec<ServiceType>)> {
        let service_types = self
            .service_types
            .into_iter()
            .map(OutletMapper::service_type_to_domain)
            .collect::<Result<Vec<_>>>()?;
        let outlets = self
            .outlets
            .into_iter()
            .map(OutletMapper::to_domain)
            .collect::<Result<Vec<_>>>()?;
        Ok((outlets, service_types))
    }
}
