//! Read models built from published envelopes.
//!
//! Every projection keeps per-stream cursors ([`StreamCursors`]): redelivered envelopes
//! are skipped, gaps are rejected, and a payload whose tenant differs from the envelope's
//! is refused. All of them can be rebuilt from the event store.

pub mod availability;
pub mod catalog;
pub mod inventory_balances;
pub mod inventory_history;
pub mod movement_log;
pub mod orders;
pub mod read_models;
pub mod reasons;
pub mod sheets;
pub mod warehouses;

pub use availability::{AvailabilityHistoryRow, AvailabilityProjection, VariantAvailability};
pub use catalog::{BatchReadModel, CatalogProjection, ProductReadModel, VariantReadModel};
pub use inventory_balances::{InventoryBalancesProjection, InventoryFilter, InventoryRow, VariantStock};
pub use inventory_history::{InventoryHistoryProjection, InventorySnapshot};
pub use movement_log::{MovementFilter, MovementLogProjection, MovementLogRow};
pub use orders::{OrderDirectoryProjection, OrderReadModel};
pub use read_models::ReadModels;
pub use reasons::ChangeReasonsProjection;
pub use sheets::{SheetDirectoryProjection, SheetFilter, SheetReadModel};
pub use warehouses::{WarehouseDirectoryProjection, WarehouseReadModel};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use stockledger_core::{AggregateId, Quantity};
use stockledger_events::{EventEnvelope, ProjectionError};

use crate::event_store::Pagination;

/// One page of a listing plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: u32,
    pub offset: u32,
}

impl<T> Page<T> {
    pub fn from_sorted(items: Vec<T>, pagination: Pagination) -> Self {
        let total = items.len();
        Self {
            items: pagination.apply(items),
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        }
    }
}

pub(crate) fn decode<E: DeserializeOwned>(envelope: &EventEnvelope<JsonValue>) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize(e.to_string()))
}

/// The id carried in the payload must be the stream the envelope came from.
pub(crate) fn ensure_stream(envelope: &EventEnvelope<JsonValue>, id: AggregateId) -> Result<(), ProjectionError> {
    if envelope.aggregate_id() != id {
        return Err(ProjectionError::TenantIsolation(
            "event id does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn add(a: Quantity, b: Quantity) -> Result<Quantity, ProjectionError> {
    a.checked_add(b).map_err(|e| ProjectionError::Rejected(e.to_string()))
}

/// Case-insensitive substring match; an empty needle matches everything.
pub(crate) fn text_matches(needle: &str, haystacks: &[&str]) -> bool {
    let needle = needle.trim().to_lowercase();
    needle.is_empty() || haystacks.iter().any(|h| h.to_lowercase().contains(&needle))
}
