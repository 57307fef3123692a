use axum::{Extension, Json, Router, response::IntoResponse, routing::get};
use chrono::Utc;

use stockledger_infra::reports::WarehouseReport;

use crate::app::dto::{self, ApiQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new().route("/warehouse", get(warehouse_report))
}

pub async fn warehouse_report(
    Extension(services): Extension<AppServices>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(params): ApiQuery<dto::ReportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let report = WarehouseReport::build(
        services.models(),
        tenant.tenant_id(),
        &params.query()?,
        Utc::now().date_naive(),
    )?;
    Ok(Json(report))
}
