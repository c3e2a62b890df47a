//! Test utilities for the CSV backend
//!
//! `TestEnvironment` owns a temporary data directory that is removed when it
//! goes out of scope, even if the test panics.
use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::connection::CsvConnection;

pub struct TestEnvironment {
    /// Kept alive so the directory survives until drop
    _temp_dir: TempDir,
    pub connection: CsvConnection,
    pub base_path: PathBuf,
}

impl TestEnvironment {
    pub async fn new() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("queue_csv_")?;
        let base_path = temp_dir.path().to_path_buf();
        let connection = CsvConnection::new(&base_path)?;

        Ok(TestEnvironment {
            _temp_dir: temp_dir,
            connection,
            base_path,
        })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_path
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        if std::env::var("QUEUE_DEBUG_TESTS").is_ok() {
            println!("Cleaning up test environment: {:?}", self.base_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_environment_cleanup() -> Result<()> {
        let base_path;

        {
            let env = TestEnvironment::new().await?;
            base_path = env.base_directory().to_path_buf();
            assert!(base_path.exists());

            std::fs::write(base_path.join("directory.yaml"), "outlets: []")?;
        }

        assert!(!base_path.exists());
        Ok(())
    }
}
