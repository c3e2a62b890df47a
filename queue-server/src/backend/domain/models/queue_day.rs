//! Daily queue aggregate for one (outlet, business day).
//!
//! Every field is derivable from the day's customer entries; `recompute`
//! is the reference definition and the incremental `record_*` methods must
//! always agree with it.
use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use shared::CustomerStatus;

use super::customer::Customer;

pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDay {
    pub outlet_id: String,
    pub service_day: NaiveDate,
    pub currently_serving: Option<String>,
    pub total_registered: u32,
    pub total_waiting: u32,
    pub total_served: u32,
    /// Sum of actual waits over completed entries
    pub wait_time_total_secs: u64,
    /// Number of completed entries contributing to the sum
    pub wait_time_samples: u32,
    /// Registrations per hour of the business day (24 buckets)
    pub peak_hours: Vec<u32>,
    pub last_updated: DateTime<Utc>,
}

impl QueueDay {
    pub fn new(outlet_id: &str, service_day: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            outlet_id: outlet_id.to_string(),
            service_day,
            currently_serving: None,
            total_registered: 0,
            total_waiting: 0,
            total_served: 0,
            wait_time_total_secs: 0,
            wait_time_samples: 0,
            peak_hours: vec![0; HOURS_PER_DAY],
            last_updated: now,
        }
    }

    /// Rebuild the aggregate from the ledger
    pub fn recompute(
        outlet_id: &str,
        service_day: NaiveDate,
        entries: &[Customer],
        offset: FixedOffset,
        now: DateTime<Utc>,
    ) -> Self {
        let mut day = Self::new(outlet_id, service_day, now);

        for entry in entries {
            day.total_registered += 1;
            day.bump_peak_hour(entry.registration_time, offset);
            match entry.status {
                CustomerStatus::Waiting => day.total_waiting += 1,
                CustomerStatus::Completed => {
                    day.total_served += 1;
                    if let Some(wait) = entry.actual_wait_secs {
                        day.wait_time_total_secs += wait;
                        day.wait_time_samples += 1;
                    }
                }
                CustomerStatus::BeingServed | CustomerStatus::Cancelled => {}
            }
        }

        day.currently_serving = currently_serving(entries);
        day
    }

    pub fn average_wait_secs(&self) -> Option<u64> {
        if self.wait_time_samples == 0 {
            return None;
        }
        let samples = u64::from(self.wait_time_samples);
        Some((self.wait_time_total_secs + samples / 2) / samples)
    }

    pub fn record_registration(&mut self, registration_time: DateTime<Utc>, offset: FixedOffset) {
        self.total_registered += 1;
        self.total_waiting += 1;
        self.bump_peak_hour(registration_time, offset);
    }

    /// An entry left the waiting line (service started or cancelled while waiting)
    pub fn record_left_waiting(&mut self) {
        self.total_waiting = self.total_waiting.saturating_sub(1);
    }

    pub fn record_completion(&mut self, actual_wait_secs: Option<u64>) {
        self.total_served += 1;
        if let Some(wait) = actual_wait_secs {
            self.wait_time_total_secs += wait;
            self.wait_time_samples += 1;
        }
    }

    /// Compare the derived counters, ignoring `last_updated`
    pub fn matches_counters(&self, other: &QueueDay) -> bool {
        self.outlet_id == other.outlet_id
            && self.service_day == other.service_day
            && self.currently_serving == other.currently_serving
            && self.total_registered == other.total_registered
            && self.total_waiting == other.total_waiting
            && self.total_served == other.total_served
            && self.wait_time_total_secs == other.wait_time_total_secs
            && self.wait_time_samples == other.wait_time_samples
            && self.peak_hours == other.peak_hours
    }

    fn bump_peak_hour(&mut self, at: DateTime<Utc>, offset: FixedOffset) {
        if self.peak_hours.len() != HOURS_PER_DAY {
            self.peak_hours.resize(HOURS_PER_DAY, 0);
        }
        let hour = at.with_timezone(&offset).hour() as usize;
        self.peak_hours[hour] += 1;
    }
}

/// Token of the entry most recently called for service, if any is still being served
pub fn currently_serving(entries: &[Customer]) -> Option<String> {
    entries
        .iter()
        .filter(|e| e.status == CustomerStatus::BeingServed)
        .max_by_key(|e| (e.service_start_time, e.token_sequence))
        .map(|e| e.token.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared::PriorityClass;

    fn entry(sequence: u32, status: CustomerStatus, hour: u32) -> Customer {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let token = Customer::format_token(sequence);
        let registered = Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap();
        Customer {
            id: Customer::generate_id("outlet-a", day, &token),
            name: format!("Customer {}", sequence),
            contact: format!("07700000{:02}", sequence),
            email: None,
            service_type: "bill-payments".to_string(),
            priority: PriorityClass::Normal,
            outlet_id: "outlet-a".to_string(),
            service_day: day,
            token,
            token_sequence: sequence,
            status,
            queue_position: None,
            estimated_wait_secs: 600,
            actual_wait_secs: None,
            registration_time: registered,
            service_start_time: None,
            service_end_time: None,
            cancelled_time: None,
            assigned_officer_id: None,
            feedback: None,
        }
    }

    #[test]
    fn test_recompute_counts_each_status() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        let offset = FixedOffset::east_opt(0).unwrap();

        let mut completed = entry(1, CustomerStatus::Completed, 9);
        completed.actual_wait_secs = Some(300);
        completed.service_start_time = Some(now);
        let mut serving = entry(2, CustomerStatus::BeingServed, 9);
        serving.service_start_time = Some(now);
        let cancelled = entry(3, CustomerStatus::Cancelled, 10);
        let waiting = entry(4, CustomerStatus::Waiting, 11);

        let day = QueueDay::recompute(
            "outlet-a",
            completed.service_day,
            &[completed, serving, cancelled, waiting],
            offset,
            now,
        );

        assert_eq!(day.total_registered, 4);
        assert_eq!(day.total_waiting, 1);
        assert_eq!(day.total_served, 1);
        assert_eq!(day.average_wait_secs(), Some(300));
        assert_eq!(day.currently_serving.as_deref(), Some("T002"));
        assert_eq!(day.peak_hours[9], 2);
        assert_eq!(day.peak_hours[10], 1);
        assert_eq!(day.peak_hours[11], 1);
    }

    #[test]
    fn test_peak_hours_use_business_offset() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        // +05:30
        let offset = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let mut day = QueueDay::new("outlet-a", now.date_naive(), now);

        day.record_registration(Utc.with_ymd_and_hms(2024, 3, 4, 4, 0, 0).unwrap(), offset);
        assert_eq!(day.peak_hours[9], 1);
    }

    #[test]
    fn test_average_wait_rounds() {
        let now = Utc::now();
        let mut day = QueueDay::new("outlet-a", now.date_naive(), now);
        assert_eq!(day.average_wait_secs(), None);

        day.record_completion(Some(100));
        day.record_completion(Some(101));
        assert_eq!(day.average_wait_secs(), Some(101));
    }

    #[test]
    fn test_currently_serving_prefers_latest_start() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 4, 9, 5, 0).unwrap();

        let mut first = entry(1, CustomerStatus::BeingServed, 8);
        first.service_start_time = Some(later);
        let mut second = entry(2, CustomerStatus::BeingServed, 8);
        second.service_start_time = Some(earlier);

        assert_eq!(currently_serving(&[first, second]).as_deref(), Some("T001"));
        assert_eq!(currently_serving(&[]), None);
    }
}
