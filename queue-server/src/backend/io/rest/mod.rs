//! # REST API Interface Layer
//!
//! HTTP endpoints for the queue service, nested under `/api`.
//! This layer handles:
//! - JSON request/response serialization
//! - Translating domain errors into status codes and error bodies
//! - Request logging
//!
//! Handlers are thin: they map DTOs to domain commands, call one service and
//! map the result back. No business rules live here.

pub mod customer_apis;
pub mod errors;
pub mod health_apis;
pub mod mappers;
pub mod outlet_apis;
pub mod queue_apis;

use axum::Router;

use crate::backend::storage::Connection;
use crate::backend::AppState;

/// All API routes, ready to be nested under `/api`
pub fn api_router<C: Connection>() -> Router<AppState<C>> {
    Router::new()
        .merge(health_apis::router())
        .merge(outlet_apis::router())
        .merge(customer_apis::router())
        .merge(queue_apis::router())
}
