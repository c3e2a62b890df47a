//! # Domain Layer
//!
//! Business rules for queue admission and service. Services here depend on
//! the storage traits only and never on a concrete backend.
//!
//! - `outlet_service`: outlet directory and service-type catalog
//! - `admission_service`: registration, token and position assignment
//! - `transition_service`: the service state machine and feedback
//! - `queue_query_service`: snapshots, lookups and aggregate reconciliation
//! - `wait_time`: the wait-time estimator
//! - `ledger`: per-day ledger view, locking and bounded storage access

pub mod admission_service;
pub mod clock;
pub mod commands;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod outlet_service;
pub mod queue_query_service;
pub mod settings;
pub mod transition_service;
pub mod wait_time;

#[cfg(test)]
pub mod test_support;

pub use admission_service::AdmissionService;
pub use clock::{Clock, SystemClock};
pub use errors::{QueueError, QueueResult};
pub use outlet_service::OutletService;
pub use queue_query_service::QueueQueryService;
pub use settings::QueueSettings;
pub use transition_service::TransitionService;
