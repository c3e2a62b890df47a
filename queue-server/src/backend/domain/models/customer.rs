//! Domain model for a customer's queue entry.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{CustomerStatus, PriorityClass};

use crate::backend::domain::models::outlet::Outlet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: u8,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub contact: String,
    pub email: Option<String>,
    pub service_type: String,
    pub priority: PriorityClass,
    pub outlet_id: String,
    pub service_day: NaiveDate,
    pub token: String,
    /// 1-based issuance order within (outlet, day); the token is derived from it
    pub token_sequence: u32,
    pub status: CustomerStatus,
    /// Only set while waiting
    pub queue_position: Option<u32>,
    pub estimated_wait_secs: u64,
    pub actual_wait_secs: Option<u64>,
    pub registration_time: DateTime<Utc>,
    pub service_start_time: Option<DateTime<Utc>>,
    pub service_end_time: Option<DateTime<Utc>>,
    pub cancelled_time: Option<DateTime<Utc>>,
    pub assigned_officer_id: Option<String>,
    pub feedback: Option<Feedback>,
}

impl Customer {
    /// Format a token from its sequence number: 7 -> "T007", 1234 -> "T1234"
    pub fn format_token(sequence: u32) -> String {
        format!("T{:03}", sequence)
    }

    /// Parse the sequence back out of a token
    pub fn parse_token(token: &str) -> Option<u32> {
        let digits = token.strip_prefix('T')?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Customer id in format: "customer::<outlet_id>::<yyyymmdd>::<token>"
    pub fn generate_id(outlet_id: &str, service_day: NaiveDate, token: &str) -> String {
        format!(
            "customer::{}::{}::{}",
            outlet_id,
            service_day.format("%Y%m%d"),
            token
        )
    }

    /// Split a customer id into (outlet_id, service_day, token)
    pub fn parse_id(id: &str) -> Option<(String, NaiveDate, String)> {
        let mut parts = id.split("::");
        if parts.next()? != "customer" {
            return None;
        }
        let outlet_id = parts.next()?;
        let day = NaiveDate::parse_from_str(parts.next()?, "%Y%m%d").ok()?;
        let token = parts.next()?;
        if parts.next().is_some() || !Outlet::is_valid_id(outlet_id) || Self::parse_token(token).is_none() {
            return None;
        }
        Some((outlet_id.to_string(), day, token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_token() {
        assert_eq!(Customer::format_token(1), "T001");
        assert_eq!(Customer::format_token(42), "T042");
        assert_eq!(Customer::format_token(1234), "T1234");
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(Customer::parse_token("T007"), Some(7));
        assert_eq!(Customer::parse_token("T1234"), Some(1234));
        assert_eq!(Customer::parse_token("007"), None);
        assert_eq!(Customer::parse_token("T"), None);
        assert_eq!(Customer::parse_token("T-1"), None);
    }

    #[test]
    fn test_id_round_trip() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let id = Customer::generate_id("colombo-01", day, "T012");
        assert_eq!(id, "customer::colombo-01::20240304::T012");

        let (outlet_id, parsed_day, token) = Customer::parse_id(&id).unwrap();
        assert_eq!(outlet_id, "colombo-01");
        assert_eq!(parsed_day, day);
        assert_eq!(token, "T012");
    }

    #[test]
    fn test_parse_id_rejects_malformed() {
        assert!(Customer::parse_id("goal::colombo::20240304::T001").is_none());
        assert!(Customer::parse_id("customer::colombo::2024-03-04::T001").is_none());
        assert!(Customer::parse_id("customer::colombo::20240304::X1").is_none());
        assert!(Customer::parse_id("customer::colombo::20240304::T001::extra").is_none());
        assert!(Customer::parse_id("customer::../../x::20240304::T001").is_none());
        assert!(Customer::parse_id("customer::a/b::20240304::T001").is_none());
        assert!(Customer::parse_id("customer::::20240304::T001").is_none());
    }
}
