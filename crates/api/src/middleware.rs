use axum::{
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use stockledger_core::{TenantId, UserId};

use crate::app::errors::ApiError;
use crate::context::TenantContext;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// Resolve [`TenantContext`] from `X-Tenant-Id` (required) and `X-User-Id` (optional).
pub async fn tenant_middleware(mut req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let tenant_id: TenantId = header(req.headers(), TENANT_HEADER)?
        .ok_or_else(|| ApiError::BadRequest("missing X-Tenant-Id header".into()))?;
    let actor: Option<UserId> = header(req.headers(), USER_HEADER)?;

    req.extensions_mut().insert(TenantContext::new(tenant_id, actor));
    Ok(next.run(req).await)
}

fn header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Result<Option<T>, ApiError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .map(str::trim)
        .and_then(|v| v.parse().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid {name} header")))
}
