use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_core::DomainError;
use stockledger_infra::projections::SheetReadModel;
use stockledger_infra::workflow::{BulkConfirmEntry, NewSheet, SheetChanges};
use stockledger_warehouses::SheetId;

use crate::app::dto::{self, ApiJson, ApiQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_sheets))
        .route("/import-export", post(create_import_export))
        .route("/transfer", post(create_transfer))
        .route("/check", post(create_check))
        .route("/bulk-confirm", post(bulk_confirm))
        .route("/:id", get(get_sheet).patch(update_sheet))
}

fn create(
    services: &AppServices,
    tenant: &TenantContext,
    sheet: NewSheet,
) -> Result<(StatusCode, Json<SheetReadModel>), ApiError> {
    let rm = services
        .workflow()
        .create_sheet(tenant.tenant_id(), tenant.actor(), sheet)?;
    Ok((StatusCode::CREATED, Json(rm)))
}

pub async fn create_import_export(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<dto::ImportExportSheetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create(&services, &tenant, body.try_into()?)
}

pub async fn create_transfer(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<dto::TransferSheetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create(&services, &tenant, body.into())
}

pub async fn create_check(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<dto::CheckSheetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create(&services, &tenant, body.into())
}

pub async fn list_sheets(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(q): ApiQuery<dto::SheetListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = services
        .models()
        .sheets
        .list(tenant.tenant_id(), &q.filter()?, q.pagination());
    Ok(Json(page))
}

pub async fn get_sheet(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: SheetId = dto::parse_id(&id)?;
    let rm = services
        .models()
        .sheets
        .get(tenant.tenant_id(), &id)
        .ok_or_else(DomainError::not_found)?;
    Ok(Json(rm))
}

pub async fn update_sheet(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<SheetChanges>,
) -> Result<impl IntoResponse, ApiError> {
    let id: SheetId = dto::parse_id(&id)?;
    let rm = services
        .workflow()
        .update_sheet(tenant.tenant_id(), tenant.actor(), id, changes)?;
    Ok(Json(rm))
}

pub async fn bulk_confirm(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(entries): ApiJson<Vec<BulkConfirmEntry>>,
) -> Result<impl IntoResponse, ApiError> {
    let sheets = services
        .workflow()
        .bulk_confirm(tenant.tenant_id(), tenant.actor(), &entries)?;
    Ok(Json(sheets))
}
