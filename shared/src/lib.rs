use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    /// Registered and holding a position in line
    Waiting,
    /// Called by an officer; position has been released
    BeingServed,
    /// Service finished (terminal)
    Completed,
    /// Left the queue before completion (terminal)
    Cancelled,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Waiting => "waiting",
            CustomerStatus::BeingServed => "being_served",
            CustomerStatus::Completed => "completed",
            CustomerStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(CustomerStatus::Waiting),
            "being_served" => Some(CustomerStatus::BeingServed),
            "completed" => Some(CustomerStatus::Completed),
            "cancelled" => Some(CustomerStatus::Cancelled),
            _ => None,
        }
    }

    /// Entries in these states still occupy the outlet (used for duplicate checks)
    pub fn is_active(&self) -> bool {
        matches!(self, CustomerStatus::Waiting | CustomerStatus::BeingServed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CustomerStatus::Completed | CustomerStatus::Cancelled)
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer category used to scale wait-time estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    #[default]
    Normal,
    Vip,
    Senior,
    Disabled,
}

impl PriorityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityClass::Normal => "normal",
            PriorityClass::Vip => "vip",
            PriorityClass::Senior => "senior",
            PriorityClass::Disabled => "disabled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(PriorityClass::Normal),
            "vip" => Some(PriorityClass::Vip),
            "senior" => Some(PriorityClass::Senior),
            "disabled" => Some(PriorityClass::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for `POST /api/customers/register`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    pub phone_number: String,
    #[serde(default)]
    pub email: Option<String>,
    pub service_type: String,
    pub outlet_id: String,
    /// Defaults to `normal` when omitted
    #[serde(default)]
    pub priority: Option<PriorityClass>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterCustomerResponse {
    pub customer: QueueEntry,
    pub success_message: String,
}

/// Customer feedback left after service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: u8,
    pub comment: Option<String>,
    /// RFC 3339 timestamp
    pub submitted_at: String,
}

/// A single customer entry as exposed over the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub service_type: String,
    pub priority: PriorityClass,
    pub outlet_id: String,
    /// Business day (YYYY-MM-DD)
    pub service_day: String,
    pub token_number: String,
    pub status: CustomerStatus,
    pub queue_position: Option<u32>,
    pub estimated_wait_secs: u64,
    pub actual_wait_secs: Option<u64>,
    /// RFC 3339 timestamps
    pub registration_time: String,
    pub service_start_time: Option<String>,
    pub service_end_time: Option<String>,
    pub cancelled_time: Option<String>,
    pub assigned_officer_id: Option<String>,
    pub feedback: Option<Feedback>,
}

/// Request body for `PUT /api/customers/:id/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CustomerStatus,
    #[serde(default)]
    pub officer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatusResponse {
    pub customer: QueueEntry,
    pub success_message: String,
}

/// Request body for `POST /api/customers/:id/feedback`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitFeedbackResponse {
    pub customer: QueueEntry,
    pub success_message: String,
}

/// Registrations counted in a single hour of the business day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakHour {
    pub hour: u8,
    pub count: u32,
}

/// Read model for `GET /api/queues/:outlet_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub outlet_id: String,
    pub service_day: String,
    pub currently_serving: Option<String>,
    pub total_waiting: u32,
    pub total_served: u32,
    pub total_registered: u32,
    /// Mean actual wait of completed entries; absent until the first completion
    pub average_wait_secs: Option<u64>,
    pub next_tokens: Vec<String>,
    pub peak_hours: Vec<PeakHour>,
}

/// Result of `POST /api/queues/:outlet_id/reconcile`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub snapshot: QueueSnapshot,
    /// False when the stored aggregate had drifted from the ledger
    pub was_consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingHours {
    /// "HH:MM"
    pub open: String,
    /// "HH:MM"
    pub close: String,
    /// Lowercase weekday names ("monday" .. "sunday")
    pub days: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityMultipliers {
    pub vip: f64,
    pub senior: f64,
    pub disabled: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlet {
    pub id: String,
    pub name: String,
    pub location: String,
    pub address: String,
    pub capacity: u32,
    pub service_types: Vec<String>,
    pub operating_hours: OperatingHours,
    pub is_active: bool,
    pub average_service_minutes: u32,
    pub minimum_wait_minutes: u32,
    pub priority_multipliers: PriorityMultipliers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletListResponse {
    pub outlets: Vec<Outlet>,
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTypeListResponse {
    pub service_types: Vec<ServiceType>,
    pub total_count: usize,
}

/// Error details returned when a contact already holds a live registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingRegistration {
    pub existing_token: String,
    pub queue_position: Option<u32>,
    pub status: CustomerStatus,
}

/// Uniform error body for every failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExistingRegistration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub storage_backend: String,
    pub timestamp: String,
}
