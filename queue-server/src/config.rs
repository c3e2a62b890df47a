//! Server configuration, read from `QUEUE_*` environment variables (and a
//! `.env` file when present).

use anyhow::{anyhow, bail, Context, Result};
use chrono::FixedOffset;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::domain::QueueSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Sqlite,
    Csv,
}

impl std::str::FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StorageKind::Sqlite),
            "csv" => Ok(StorageKind::Csv),
            other => Err(anyhow!("Unknown storage backend '{}', expected sqlite or csv", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageKind,
    /// Root for the CSV backend and the default database location
    pub data_dir: PathBuf,
    pub database_url: String,
    /// YAML outlet directory imported at startup, if it exists
    pub outlets_file: PathBuf,
    pub operation_timeout: Duration,
    pub conflict_retries: u32,
    pub utc_offset: FixedOffset,
    pub enforce_operating_hours: bool,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            log::info!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any variable source; unset and empty
    /// variables fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = match var("QUEUE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("queue-server"),
        };
        let database_url = var("QUEUE_DATABASE_URL")
            .unwrap_or_else(|| format!("sqlite:{}", data_dir.join("queue.db").display()));

        Ok(Self {
            bind_addr: var("QUEUE_BIND_ADDR")
                .unwrap_or_else(|| "127.0.0.1:5000".into())
                .parse()
                .context("QUEUE_BIND_ADDR must be host:port")?,
            storage: match var("QUEUE_STORAGE") {
                Some(value) => value.parse()?,
                None => StorageKind::Sqlite,
            },
            database_url,
            outlets_file: var("QUEUE_OUTLETS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/outlets.yaml")),
            operation_timeout: Duration::from_millis(match var("QUEUE_OPERATION_TIMEOUT_MS") {
                Some(ms) => ms.parse().context("QUEUE_OPERATION_TIMEOUT_MS must be a number")?,
                None => 5000,
            }),
            conflict_retries: match var("QUEUE_CONFLICT_RETRIES") {
                Some(n) => n.parse().context("QUEUE_CONFLICT_RETRIES must be a number")?,
                None => 3,
            },
            utc_offset: match var("QUEUE_UTC_OFFSET") {
                Some(offset) => parse_utc_offset(&offset)?,
                None => FixedOffset::east_opt(0).ok_or_else(|| anyhow!("zero offset"))?,
            },
            enforce_operating_hours: match var("QUEUE_ENFORCE_OPERATING_HOURS") {
                Some(flag) => parse_bool(&flag)?,
                None => false,
            },
            cors_origin: var("QUEUE_CORS_ORIGIN"),
            data_dir,
        })
    }

    pub fn settings(&self) -> QueueSettings {
        QueueSettings {
            operation_timeout: self.operation_timeout,
            conflict_retries: self.conflict_retries,
            utc_offset: self.utc_offset,
            enforce_operating_hours: self.enforce_operating_hours,
        }
    }
}

/// Parses `+HH:MM`, `-HH:MM` or `Z`
fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    if value.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("zero offset"));
    }

    let (sign, rest) = if let Some(rest) = value.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = value.strip_prefix('-') {
        (-1, rest)
    } else {
        bail!("QUEUE_UTC_OFFSET '{}' must look like +05:30", value);
    };
    let (hours, minutes) = rest
        .split_once(':')
        .ok_or_else(|| anyhow!("QUEUE_UTC_OFFSET '{}' must look like +05:30", value))?;
    let hours: i32 = hours.parse().context("Bad offset hours")?;
    let minutes: i32 = minutes.parse().context("Bad offset minutes")?;
    if !(0..60).contains(&minutes) {
        bail!("Offset minutes out of range in '{}'", value);
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("QUEUE_UTC_OFFSET '{}' is out of range", value))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("Expected a boolean, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("QUEUE_DATA_DIR", "/var/lib/queue")]).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:5000");
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert_eq!(config.database_url, "sqlite:/var/lib/queue/queue.db");
        assert_eq!(config.operation_timeout, Duration::from_millis(5000));
        assert_eq!(config.conflict_retries, 3);
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
        assert!(!config.enforce_operating_hours);
        assert_eq!(config.cors_origin, None);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("QUEUE_STORAGE", "CSV"),
            ("QUEUE_UTC_OFFSET", "+05:30"),
            ("QUEUE_OPERATION_TIMEOUT_MS", "250"),
            ("QUEUE_CONFLICT_RETRIES", "0"),
            ("QUEUE_ENFORCE_OPERATING_HOURS", "true"),
            ("QUEUE_CORS_ORIGIN", "http://localhost:8080"),
        ])
        .unwrap();

        assert_eq!(config.storage, StorageKind::Csv);
        assert_eq!(config.utc_offset.local_minus_utc(), 5 * 3600 + 1800);

        let settings = config.settings();
        assert_eq!(settings.operation_timeout, Duration::from_millis(250));
        assert_eq!(settings.conflict_retries, 0);
        assert!(settings.enforce_operating_hours);
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = config(&[("QUEUE_STORAGE", " "), ("QUEUE_CONFLICT_RETRIES", "")]).unwrap();
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert_eq!(config.conflict_retries, 3);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config(&[("QUEUE_STORAGE", "postgres")]).is_err());
        assert!(config(&[("QUEUE_UTC_OFFSET", "05:30")]).is_err());
        assert!(config(&[("QUEUE_UTC_OFFSET", "+05:75")]).is_err());
        assert!(config(&[("QUEUE_OPERATION_TIMEOUT_MS", "soon")]).is_err());
        assert!(config(&[("QUEUE_ENFORCE_OPERATING_HOURS", "maybe")]).is_err());
        assert!(config(&[("QUEUE_BIND_ADDR", "localhost")]).is_err());
    }

    #[test]
    fn test_negative_offset() {
        assert_eq!(parse_utc_offset("-03:00").unwrap().local_minus_utc(), -3 * 3600);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
    }
}
