//! # REST API for the Outlet Directory
//!
//! Read-only endpoints for outlets and the service-type catalog.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use log::info;
use shared::{Outlet, OutletListResponse, ServiceTypeListResponse};

use crate::backend::io::rest::errors::ApiResult;
use crate::backend::io::rest::mappers::outlet_mapper::OutletMapper;
use crate::backend::storage::Connection;
use crate::backend::AppState;

/// Create a router for outlet related APIs
pub fn router<C: Connection>() -> Router<AppState<C>> {
    Router::new()
        .route("/outlets", get(list_outlets::<C>))
        .route("/outlets/:outlet_id", get(get_outlet::<C>))
        .route("/services/types", get(list_service_types::<C>))
}

pub async fn list_outlets<C: Connection>(
    State(state): State<AppState<C>>,
) -> ApiResult<Json<OutletListResponse>> {
    info!("GET /api/outlets");
    let outlets = state.outlet_service.list_outlets().await?;
    Ok(Json(OutletMapper::to_outlet_list_dto(outlets)))
}

pub async fn get_outlet<C: Connection>(
    State(state): State<AppState<C>>,
    Path(outlet_id): Path<String>,
) -> ApiResult<Json<Outlet>> {
    info!("GET /api/outlets/{}", outlet_id);
    let outlet = state.outlet_service.get_outlet(&outlet_id).await?;
    Ok(Json(OutletMapper::to_dto(outlet)))
}

pub async fn list_service_types<C: Connection>(
    State(state): State<AppState<C>>,
) -> ApiResult<Json<ServiceTypeListResponse>> {
    info!("GET /api/services/types");
    let service_types = state.outlet_service.list_service_types().await?;
    Ok(Json(OutletMapper::to_service_type_list_dto(service_types)))
}
