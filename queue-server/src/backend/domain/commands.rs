//! Domain-level command and query types
//! These structs are used by services inside the domain layer and are **not**
//! exposed over the public API. The REST layer is responsible for mapping the
//! public DTOs defined in the `shared` crate to these internal types.

pub mod admission {
    use shared::PriorityClass;

    /// Input for registering a customer at an outlet.
    #[derive(Debug, Clone)]
    pub struct RegisterCustomerCommand {
        pub name: String,
        pub contact: String,
        pub email: Option<String>,
        pub service_type: String,
        pub outlet_id: String,
        pub priority: PriorityClass,
    }
}

pub mod transitions {
    use shared::CustomerStatus;

    /// Input for moving an entry to a new status.
    #[derive(Debug, Clone)]
    pub struct TransitionCommand {
        pub customer_id: String,
        pub target_status: CustomerStatus,
        pub officer_id: Option<String>,
    }

    /// Input for leaving feedback on a completed entry.
    #[derive(Debug, Clone)]
    pub struct SubmitFeedbackCommand {
        pub customer_id: String,
        pub rating: u8,
        pub comment: Option<String>,
    }
}

pub mod queries {
    use chrono::NaiveDate;

    use crate::backend::domain::models::queue_day::QueueDay;

    /// Query for an outlet's queue on a day (today when `service_day` is None).
    #[derive(Debug, Clone)]
    pub struct QueueSnapshotQuery {
        pub outlet_id: String,
        pub service_day: Option<NaiveDate>,
    }

    /// Result of a snapshot query.
    #[derive(Debug, Clone)]
    pub struct QueueSnapshotResult {
        pub queue_day: QueueDay,
        /// Tokens of the first waiting entries, in position order
        pub next_tokens: Vec<String>,
    }

    /// Query for an entry by its token.
    #[derive(Debug, Clone)]
    pub struct EntryByTokenQuery {
        pub outlet_id: String,
        pub token: String,
        pub service_day: Option<NaiveDate>,
    }

    /// Result of rebuilding an aggregate from its ledger.
    #[derive(Debug, Clone)]
    pub struct ReconcileResult {
        pub queue_day: QueueDay,
        /// Whether the stored aggregate already matched the ledger
        pub was_consistent: bool,
    }
}
