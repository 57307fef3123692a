//! Router assembly.
//!
//! - `services.rs`: event store, dispatcher, read models and workflow wiring
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies, query strings and extractors
//! - `errors.rs`: the JSON error contract

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Full HTTP router; `/health` is the only route without a tenant.
pub fn build_app(services: services::AppServices) -> Router {
    let tenant_scoped = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::tenant_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(tenant_scoped)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
