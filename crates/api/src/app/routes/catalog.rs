use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use stockledger_core::DomainError;
use stockledger_infra::workflow::{NewBatch, NewProduct, NewVariant};
use stockledger_products::ProductId;

use crate::app::dto::{self, ApiJson, ApiQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", patch(rename_product))
        .route("/variants", get(list_variants).post(create_variant))
        .route("/batches", post(register_batch))
}

pub async fn create_product(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<NewProduct>,
) -> Result<impl IntoResponse, ApiError> {
    let id = services.workflow().create_product(tenant.tenant_id(), body)?;
    let rm = services
        .models()
        .catalog
        .product(tenant.tenant_id(), &id)
        .ok_or_else(DomainError::not_found)?;
    Ok((StatusCode::CREATED, Json(rm)))
}

pub async fn list_products(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
) -> impl IntoResponse {
    Json(services.models().catalog.products(tenant.tenant_id()))
}

pub async fn rename_product(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::RenameProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ProductId = dto::parse_id(&id)?;
    services
        .workflow()
        .rename_product(tenant.tenant_id(), id, body.name, body.category)?;
    let rm = services
        .models()
        .catalog
        .product(tenant.tenant_id(), &id)
        .ok_or_else(DomainError::not_found)?;
    Ok(Json(rm))
}

pub async fn create_variant(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<NewVariant>,
) -> Result<impl IntoResponse, ApiError> {
    let id = services.workflow().create_variant(tenant.tenant_id(), body)?;
    let rm = services
        .models()
        .catalog
        .variant(tenant.tenant_id(), &id)
        .ok_or_else(DomainError::not_found)?;
    Ok((StatusCode::CREATED, Json(rm)))
}

pub async fn list_variants(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(q): ApiQuery<dto::VariantsQuery>,
) -> impl IntoResponse {
    Json(services.models().catalog.variants(tenant.tenant_id(), q.product_id))
}

pub async fn register_batch(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<NewBatch>,
) -> Result<impl IntoResponse, ApiError> {
    let id = services.workflow().register_batch(tenant.tenant_id(), body)?;
    let rm = services
        .models()
        .catalog
        .batch(tenant.tenant_id(), &id)
        .ok_or_else(DomainError::not_found)?;
    Ok((StatusCode::CREATED, Json(rm)))
}
