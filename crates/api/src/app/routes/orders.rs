use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_core::DomainError;
use stockledger_infra::workflow::NewOrder;

use crate::app::dto::ApiJson;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/:key", get(get_order))
        .route("/:key/complete", post(complete_order))
        .route("/:key/cancel", post(cancel_order))
}

pub async fn place_order(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<NewOrder>,
) -> Result<impl IntoResponse, ApiError> {
    let rm = services
        .workflow()
        .place_order(tenant.tenant_id(), tenant.actor(), body)?;
    Ok((StatusCode::CREATED, Json(rm)))
}

pub async fn list_orders(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
) -> impl IntoResponse {
    Json(services.models().orders.list(tenant.tenant_id()))
}

pub async fn get_order(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let rm = services
        .models()
        .orders
        .get(tenant.tenant_id(), key.trim())
        .ok_or_else(DomainError::not_found)?;
    Ok(Json(rm))
}

pub async fn complete_order(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let rm = services
        .workflow()
        .complete_order(tenant.tenant_id(), tenant.actor(), key.trim())?;
    Ok(Json(rm))
}

pub async fn cancel_order(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let rm = services.workflow().cancel_order(tenant.tenant_id(), key.trim())?;
    Ok(Json(rm))
}
