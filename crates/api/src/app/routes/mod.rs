use axum::Router;

pub mod catalog;
pub mod inventory;
pub mod orders;
pub mod reports;
pub mod sheets;
pub mod system;
pub mod warehouses;

/// Router for every tenant-scoped endpoint.
pub fn router() -> Router {
    Router::new()
        .nest("/warehouses", warehouses::router())
        .nest("/catalog", catalog::router())
        .nest("/sheets", sheets::router())
        .nest("/inventory", inventory::router())
        .nest("/reports", reports::router())
        .nest("/orders", orders::router())
}
