use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::ledger_repository::LedgerRepository;
use super::outlet_repository::OutletRepository;
use crate::backend::domain::ledger::LedgerKey;
use crate::backend::storage::traits::Connection;

/// CsvConnection manages the file layout under one base directory:
///
/// ```text
/// data/
/// ├── directory.yaml              outlets and service types
/// └── ledger/
///     └── {outlet_id}/
///         └── {YYYY-MM-DD}/
///             ├── customers.csv   one row per entry
///             └── queue.yaml      daily aggregate
/// ```
#[derive(Clone)]
pub struct CsvConnection {
    base_directory: Arc<PathBuf>,
    /// Serializes read-modify-write cycles on `directory.yaml`
    directory_lock: Arc<tokio::sync::Mutex<()>>,
    /// Serializes ledger commits, so a commit reads the files it replaces
    commit_lock: Arc<tokio::sync::Mutex<()>>,
}

impl CsvConnection {
    /// Create a new CSV connection with a base directory
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .with_context(|| format!("Failed to create data directory {:?}", base_path))?;
            info!("Created data directory {:?}", base_path);
        }

        Ok(Self {
            base_directory: Arc::new(base_path),
            directory_lock: Arc::new(tokio::sync::Mutex::new(())),
            commit_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn directory_file(&self) -> PathBuf {
        self.base_directory.join("directory.yaml")
    }

    pub fn directory_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.directory_lock
    }

    pub fn commit_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.commit_lock
    }

    pub fn ledger_directory(&self, key: &LedgerKey) -> PathBuf {
        self.base_directory
            .join("ledger")
            .join(&key.outlet_id)
            .join(key.service_day.format("%Y-%m-%d").to_string())
    }

    pub fn customers_file(&self, key: &LedgerKey) -> PathBuf {
        self.ledger_directory(key).join("customers.csv")
    }

    pub fn queue_file(&self, key: &LedgerKey) -> PathBuf {
        self.ledger_directory(key).join("queue.yaml")
    }
}

/// Write to a sibling temp file, then rename over the target
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        write(&mut writer)?;
        writer.flush()?;
    }

    fs::rename(&temp_path, path).with_context(|| format!("Failed to replace {:?}", path))?;
    debug!("Wrote {:?}", path);
    Ok(())
}

#[async_trait]
impl Connection for CsvConnection {
    type OutletRepository = OutletRepository;
    type LedgerRepository = LedgerRepository;

    fn backend_name(&self) -> &'static str {
        "csv"
    }

    fn create_outlet_repository(&self) -> Self::OutletRepository {
        OutletRepository::new(self.clone())
    }

    fn create_ledger_repository(&self) -> Self::LedgerRepository {
        LedgerRepository::new(self.clone())
    }

    async fn close(&self) {
        // Every write is flushed and renamed before it returns
        info!("CSV storage closed");
    }
}
