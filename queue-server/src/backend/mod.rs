//! # Backend Module
//!
//! Contains all non-binary logic for the queue service.
//!
//! ## Architecture
//!
//! The backend follows a layered architecture:
//! ```text
//! IO Layer (REST API, directory file)
//!     ↓
//! Domain Layer (admission, transitions, queries)
//!     ↓
//! Storage Layer (SQLite or CSV files)
//! ```
//!
//! Services are generic over the storage `Connection`, so the same wiring
//! serves both backends; the binary picks one at startup.

pub mod domain;
pub mod io;
pub mod storage;

use axum::{
    http::{HeaderValue, Method},
    Router,
};
use log::{info, warn};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::domain::ledger::QueueLedger;
use crate::backend::domain::{
    AdmissionService, Clock, OutletService, QueueQueryService, QueueSettings, SystemClock,
    TransitionService,
};
use crate::backend::storage::Connection;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState<C: Connection> {
    pub outlet_service: OutletService<C>,
    pub admission_service: AdmissionService<C>,
    pub transition_service: TransitionService<C>,
    pub query_service: QueueQueryService<C>,
    pub clock: Arc<dyn Clock>,
    pub storage_backend: &'static str,
}

impl<C: Connection> AppState<C> {
    /// Wire every service over one connection. All services share one
    /// ledger, so they share its per-day locks.
    pub fn with_clock(connection: &C, settings: QueueSettings, clock: Arc<dyn Clock>) -> Self {
        let ledger = QueueLedger::new(connection, clock.clone(), settings.clone());
        let outlet_service = OutletService::new(connection, &settings);

        Self {
            admission_service: AdmissionService::new(ledger.clone(), outlet_service.clone()),
            transition_service: TransitionService::new(ledger.clone(), outlet_service.clone()),
            query_service: QueueQueryService::new(ledger, outlet_service.clone()),
            outlet_service,
            clock,
            storage_backend: connection.backend_name(),
        }
    }
}

/// Initialize the backend with all required services
pub fn initialize_backend<C: Connection>(connection: &C, settings: QueueSettings) -> AppState<C> {
    info!(
        "Setting up queue services on {} storage (timeout {:?}, {} conflict retries, offset {})",
        connection.backend_name(),
        settings.operation_timeout,
        settings.conflict_retries,
        settings.utc_offset
    );
    AppState::with_clock(connection, settings, Arc::new(SystemClock))
}

/// Create the Axum router with all routes configured
pub fn create_router<C: Connection>(app_state: AppState<C>, cors_origin: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    let cors = match cors_origin.map(|origin| origin.parse::<HeaderValue>()) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(_)) => {
            warn!("Ignoring invalid CORS origin; allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    };

    Router::new()
        .nest("/api", io::rest::api_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
