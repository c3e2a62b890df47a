use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use std::time::Duration;

/// Runtime knobs the queue services need from the application config
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Upper bound for any single storage call or ledger lock wait
    pub operation_timeout: Duration,
    /// How many times admission retries after a storage uniqueness conflict
    pub conflict_retries: u32,
    /// Offset used to decide the business day and peak-hour bucket
    pub utc_offset: FixedOffset,
    pub enforce_operating_hours: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_millis(5000),
            conflict_retries: 3,
            utc_offset: Utc.fix(),
            enforce_operating_hours: false,
        }
    }
}

impl QueueSettings {
    pub fn business_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.utc_offset).date_naive()
    }

    pub fn local_time(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.utc_offset).naive_local()
    }
}
