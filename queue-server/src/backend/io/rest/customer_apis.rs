//! # REST API for Customer Entries
//!
//! Registration, status transitions, lookups by id and feedback.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use log::info;
use shared::{
    QueueEntry, RegisterCustomerRequest, RegisterCustomerResponse, SubmitFeedbackRequest,
    SubmitFeedbackResponse, UpdateStatusRequest, UpdateStatusResponse,
};

use crate::backend::io::rest::errors::ApiResult;
use crate::backend::io::rest::mappers::customer_mapper::CustomerMapper;
use crate::backend::storage::Connection;
use crate::backend::AppState;

/// Create a router for customer related APIs
pub fn router<C: Connection>() -> Router<AppState<C>> {
    Router::new()
        .route("/customers/register", post(register_customer::<C>))
        .route("/customers/:customer_id", get(get_customer::<C>))
        .route("/customers/:customer_id/status", put(update_status::<C>))
        .route("/customers/:customer_id/feedback", post(submit_feedback::<C>))
}

/// Admit a customer to an outlet's queue for today
pub async fn register_customer<C: Connection>(
    State(state): State<AppState<C>>,
    Json(request): Json<RegisterCustomerRequest>,
) -> ApiResult<(StatusCode, Json<RegisterCustomerResponse>)> {
    info!(
        "POST /api/customers/register - outlet: {}, service: {}",
        request.outlet_id, request.service_type
    );

    let command = CustomerMapper::to_register_command(request);
    let customer = state.admission_service.register(command).await?;
    Ok((
        StatusCode::CREATED,
        Json(CustomerMapper::to_register_response(customer)),
    ))
}

pub async fn get_customer<C: Connection>(
    State(state): State<AppState<C>>,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<QueueEntry>> {
    info!("GET /api/customers/{}", customer_id);
    let customer = state.query_service.get_entry(&customer_id).await?;
    Ok(Json(CustomerMapper::to_dto(customer)))
}

/// Move an entry through the service state machine
pub async fn update_status<C: Connection>(
    State(state): State<AppState<C>>,
    Path(customer_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<UpdateStatusResponse>> {
    info!("PUT /api/customers/{}/status - target: {}", customer_id, request.status);

    let command = CustomerMapper::to_transition_command(customer_id, request);
    let customer = state.transition_service.transition(command).await?;
    Ok(Json(CustomerMapper::to_update_status_response(customer)))
}

pub async fn submit_feedback<C: Connection>(
    State(state): State<AppState<C>>,
    Path(customer_id): Path<String>,
    Json(request): Json<SubmitFeedbackRequest>,
) -> ApiResult<Json<SubmitFeedbackResponse>> {
    info!("POST /api/customers/{}/feedback - rating: {}", customer_id, request.rating);

    let command = CustomerMapper::to_feedback_command(customer_id, request);
    let customer = state.transition_service.submit_feedback(command).await?;
    Ok(Json(CustomerMapper::to_feedback_response(customer)))
}
