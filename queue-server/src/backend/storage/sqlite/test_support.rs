use anyhow::Result;
use std::path::Path;
use tempfile::TempDir;

use super::connection::DbConnection;

/// A throwaway database file that is removed when dropped
pub struct TestDatabase {
    _temp_dir: TempDir,
    pub connection: DbConnection,
}

impl TestDatabase {
    pub async fn new() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("queue_db_")?;
        let connection = DbConnection::open(&temp_dir.path().join("queue.db")).await?;
        Ok(Self {
            _temp_dir: temp_dir,
            connection,
        })
    }

    /// Scratch directory next to the database file
    pub fn path(&self) -> &Path {
        self._temp_dir.path()
    }
}
