//! # REST API for Queue Views
//!
//! Snapshot, token lookup and aggregate reconciliation for one outlet and
//! business day. `?date=YYYY-MM-DD` selects a past day; the default is today.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use log::info;
use serde::Deserialize;
use shared::{QueueEntry, QueueSnapshot, ReconcileResponse};

use crate::backend::domain::commands::queries::{EntryByTokenQuery, QueueSnapshotQuery};
use crate::backend::io::rest::errors::{ApiError, ApiResult};
use crate::backend::io::rest::mappers::customer_mapper::CustomerMapper;
use crate::backend::io::rest::mappers::snapshot_mapper::SnapshotMapper;
use crate::backend::storage::Connection;
use crate::backend::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DayParams {
    pub date: Option<String>,
}

impl DayParams {
    fn service_day(&self) -> ApiResult<Option<NaiveDate>> {
        match self.date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("Invalid date '{}', expected YYYY-MM-DD", date))),
        }
    }
}

/// Create a router for queue related APIs
pub fn router<C: Connection>() -> Router<AppState<C>> {
    Router::new()
        .route("/queues/:outlet_id", get(get_queue_snapshot::<C>))
        .route("/queues/:outlet_id/tokens/:token", get(get_entry_by_token::<C>))
        .route("/queues/:outlet_id/reconcile", post(reconcile_queue::<C>))
}

pub async fn get_queue_snapshot<C: Connection>(
    State(state): State<AppState<C>>,
    Path(outlet_id): Path<String>,
    Query(params): Query<DayParams>,
) -> ApiResult<Json<QueueSnapshot>> {
    info!("GET /api/queues/{} - date: {:?}", outlet_id, params.date);

    let query = QueueSnapshotQuery {
        outlet_id,
        service_day: params.service_day()?,
    };
    let result = state.query_service.get_queue_snapshot(query).await?;
    Ok(Json(SnapshotMapper::to_dto(result)))
}

pub async fn get_entry_by_token<C: Connection>(
    State(state): State<AppState<C>>,
    Path((outlet_id, token)): Path<(String, String)>,
    Query(params): Query<DayParams>,
) -> ApiResult<Json<QueueEntry>> {
    info!("GET /api/queues/{}/tokens/{}", outlet_id, token);

    let query = EntryByTokenQuery {
        outlet_id,
        token,
        service_day: params.service_day()?,
    };
    let customer = state.query_service.get_entry_by_token(query).await?;
    Ok(Json(CustomerMapper::to_dto(customer)))
}

/// Rebuild the stored aggregate from the ledger
pub async fn reconcile_queue<C: Connection>(
    State(state): State<AppState<C>>,
    Path(outlet_id): Path<String>,
    Query(params): Query<DayParams>,
) -> ApiResult<Json<ReconcileResponse>> {
    info!("POST /api/queues/{}/reconcile - date: {:?}", outlet_id, params.date);

    let service_day = params.service_day()?;
    let result = state.query_service.reconcile(&outlet_id, service_day).await?;
    let snapshot = state
        .query_service
        .get_queue_snapshot(QueueSnapshotQuery {
            outlet_id,
            service_day: Some(result.queue_day.service_day),
        })
        .await?;
    Ok(Json(SnapshotMapper::to_reconcile_response(result, snapshot.next_tokens)))
}
