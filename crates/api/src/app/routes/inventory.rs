use axum::{
    Extension, Json, Router,
    extract::Path,
    response::IntoResponse,
    routing::get,
};

use stockledger_products::VariantId;

use crate::app::dto::{self, ApiQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_inventory))
        .route("/variants", get(variant_totals))
        .route("/logs", get(movement_log))
        .route("/available", get(list_available))
        .route("/available/:variant_id/history", get(available_history))
}

/// Current quantity per (warehouse, batch).
pub async fn list_inventory(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(q): ApiQuery<dto::InventoryQuery>,
) -> impl IntoResponse {
    Json(services.models().balances.list(tenant.tenant_id(), &q.into()))
}

/// Per-variant totals across batches and warehouses.
pub async fn variant_totals(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.models().balances.variant_totals(tenant.tenant_id())?))
}

pub async fn movement_log(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(q): ApiQuery<dto::MovementQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = services
        .models()
        .movements
        .list(tenant.tenant_id(), &q.filter()?, q.pagination());
    Ok(Json(page))
}

pub async fn list_available(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(q): ApiQuery<dto::PageQuery>,
) -> impl IntoResponse {
    Json(services.models().availability.list(tenant.tenant_id(), q.pagination()))
}

pub async fn available_history(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    Path(variant_id): Path<String>,
    ApiQuery(q): ApiQuery<dto::PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let variant_id: VariantId = dto::parse_id(&variant_id)?;
    let page = services
        .models()
        .availability
        .history(tenant.tenant_id(), &variant_id, q.pagination())?;
    Ok(Json(page))
}
