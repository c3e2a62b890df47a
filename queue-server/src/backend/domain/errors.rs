//! Error taxonomy for queue operations.
use shared::CustomerStatus;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("{0}")]
    Validation(String),

    #[error("Outlet not found: {0}")]
    OutletNotFound(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Already registered today with token {token}")]
    DuplicateRegistration {
        customer_id: String,
        token: String,
        position: Option<u32>,
        status: CustomerStatus,
    },

    #[error("Cannot move entry from {from} to {to}")]
    InvalidTransition {
        from: CustomerStatus,
        to: CustomerStatus,
    },

    #[error("Outlet {outlet_id} is at capacity ({capacity} waiting)")]
    CapacityExceeded { outlet_id: String, capacity: u32 },

    #[error("Outlet {0} is closed at this time")]
    OutletClosed(String),

    #[error("Repository unavailable: {0}")]
    Repository(String),
}

impl QueueError {
    pub fn validation(message: impl Into<String>) -> Self {
        QueueError::Validation(message.into())
    }

    pub fn repository(err: anyhow::Error) -> Self {
        QueueError::Repository(format!("{:#}", err))
    }

    /// Only persistence failures are worth retrying; everything else is a
    /// caller or business-rule problem.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Repository(_))
    }
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_repository_errors_are_retryable() {
        assert!(QueueError::Repository("down".into()).is_retryable());
        assert!(!QueueError::validation("bad").is_retryable());
        assert!(!QueueError::InvalidTransition {
            from: CustomerStatus::Completed,
            to: CustomerStatus::Waiting,
        }
        .is_retryable());
    }

    #[test]
    fn test_repository_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("Failed to write customers file");
        let queue_err = QueueError::repository(err);
        assert_eq!(
            queue_err.to_string(),
            "Repository unavailable: Failed to write customers file: disk full"
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = QueueError::InvalidTransition {
            from: CustomerStatus::Completed,
            to: CustomerStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "Cannot move entry from completed to cancelled");
    }
}
