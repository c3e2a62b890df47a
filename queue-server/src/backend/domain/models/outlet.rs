//! Domain model for outlets and the service-type catalog.
use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use shared::PriorityClass;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub days: Vec<Weekday>,
}

impl OperatingHours {
    /// Whether the outlet accepts registrations at the given local time.
    /// The close time is exclusive.
    pub fn is_open_at(&self, local: NaiveDateTime) -> bool {
        if !self.days.contains(&local.weekday()) {
            return false;
        }
        let time = local.time();
        time >= self.open && time < self.close
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityMultipliers {
    pub vip: f64,
    pub senior: f64,
    pub disabled: f64,
}

impl Default for PriorityMultipliers {
    fn default() -> Self {
        Self {
            vip: 0.5,
            senior: 0.8,
            disabled: 0.7,
        }
    }
}

impl PriorityMultipliers {
    pub fn for_priority(&self, priority: PriorityClass) -> f64 {
        match priority {
            PriorityClass::Normal => 1.0,
            PriorityClass::Vip => self.vip,
            PriorityClass::Senior => self.senior,
            PriorityClass::Disabled => self.disabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletConfiguration {
    pub average_service_minutes: u32,
    pub minimum_wait_minutes: u32,
    pub priority_multipliers: PriorityMultipliers,
}

impl OutletConfiguration {
    pub fn average_service_secs(&self) -> u64 {
        u64::from(self.average_service_minutes) * 60
    }

    pub fn minimum_wait_secs(&self) -> u64 {
        u64::from(self.minimum_wait_minutes) * 60
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlet {
    pub id: String,
    pub name: String,
    pub location: String,
    pub address: String,
    /// Maximum number of entries allowed to wait at once
    pub capacity: u32,
    /// Accepted service-type ids; empty means any service type is accepted
    pub service_types: Vec<String>,
    pub operating_hours: OperatingHours,
    pub is_active: bool,
    pub configuration: OutletConfiguration,
}

impl Outlet {
    /// Outlet ids end up in customer ids and directory names, so they are
    /// restricted to ASCII alphanumerics, '-' and '_'.
    pub fn is_valid_id(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= 64
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    pub fn accepts_service(&self, service_type: &str) -> bool {
        self.service_types.is_empty() || self.service_types.iter().any(|s| s == service_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub estimated_minutes: u32,
    pub is_active: bool,
}
