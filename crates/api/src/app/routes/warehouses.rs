use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockledger_core::DomainError;
use stockledger_warehouses::{WarehouseChanges, WarehouseId};

use crate::app::dto::{self, ApiJson, ApiQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route("/reasons", get(list_reasons))
        .route("/:id", get(get_warehouse).patch(update_warehouse))
}

pub async fn create_warehouse(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<dto::CreateWarehouseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = services.workflow().create_warehouse(tenant.tenant_id(), body.into())?;
    let rm = services
        .models()
        .warehouses
        .get(tenant.tenant_id(), &id)
        .ok_or_else(DomainError::not_found)?;
    Ok((StatusCode::CREATED, Json(rm)))
}

pub async fn list_warehouses(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
) -> impl IntoResponse {
    Json(services.models().warehouses.list(tenant.tenant_id()))
}

pub async fn get_warehouse(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: WarehouseId = dto::parse_id(&id)?;
    let rm = services
        .models()
        .warehouses
        .get(tenant.tenant_id(), &id)
        .ok_or_else(DomainError::not_found)?;
    Ok(Json(rm))
}

pub async fn update_warehouse(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<WarehouseChanges>,
) -> Result<impl IntoResponse, ApiError> {
    let id: WarehouseId = dto::parse_id(&id)?;
    services.workflow().update_warehouse(tenant.tenant_id(), id, changes)?;
    let rm = services
        .models()
        .warehouses
        .get(tenant.tenant_id(), &id)
        .ok_or_else(DomainError::not_found)?;
    Ok(Json(rm))
}

/// Reasons used so far, optionally for one sheet kind.
pub async fn list_reasons(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(q): ApiQuery<dto::KindQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.models().reasons.list(tenant.tenant_id(), q.kind()?)))
}
