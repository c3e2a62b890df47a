//! Translation of domain errors into HTTP responses.
//!
//! Handlers return `Result<_, ApiError>` so `?` carries a `QueueError`
//! straight to the client with the right status code and error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use log::{error, warn};
use shared::{ErrorResponse, ExistingRegistration};

use crate::backend::domain::QueueError;

#[derive(Debug)]
pub struct ApiError(pub QueueError);

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(QueueError::Validation(message.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            QueueError::Validation(_) => StatusCode::BAD_REQUEST,
            QueueError::OutletNotFound(_) | QueueError::NotFound(_) => StatusCode::NOT_FOUND,
            QueueError::DuplicateRegistration { .. } | QueueError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            QueueError::CapacityExceeded { .. } | QueueError::OutletClosed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            QueueError::Repository(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable code for the error body
    pub fn error_code(&self) -> &'static str {
        match &self.0 {
            QueueError::Validation(_) => "validation_error",
            QueueError::OutletNotFound(_) => "outlet_not_found",
            QueueError::NotFound(_) => "not_found",
            QueueError::DuplicateRegistration { .. } => "duplicate_registration",
            QueueError::InvalidTransition { .. } => "invalid_transition",
            QueueError::CapacityExceeded { .. } => "capacity_exceeded",
            QueueError::OutletClosed(_) => "outlet_closed",
            QueueError::Repository(_) => "repository_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let data = match &self.0 {
            QueueError::DuplicateRegistration {
                token,
                position,
                status,
                ..
            } => Some(ExistingRegistration {
                existing_token: token.clone(),
                queue_position: *position,
                status: *status,
            }),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: self.error_code().to_string(),
            message: self.0.to_string(),
            data,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
