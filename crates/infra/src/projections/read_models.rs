use std::sync::Mutex;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use stockledger_events::{EventEnvelope, Projection, ProjectionError, rebuild_from_scratch};
use stockledger_warehouses::{SheetId, StockKey, WarehouseId};

use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{
    AvailabilityProjection, CatalogProjection, ChangeReasonsProjection, InventoryBalancesProjection,
    InventoryHistoryProjection, InventoryRow, MovementLogProjection, OrderDirectoryProjection,
    SheetDirectoryProjection, SheetReadModel, WarehouseDirectoryProjection, WarehouseReadModel,
};
use crate::read_model::InMemoryTenantStore;

/// Every read model of the service, fed from committed events.
///
/// Committed events are applied right after the append that produced them, so a caller
/// reads its own writes. When a projection reports a sequence gap (another writer got
/// there first) the stream is reloaded from the store and replayed.
#[derive(Debug)]
pub struct ReadModels {
    pub catalog: CatalogProjection,
    pub warehouses: WarehouseDirectoryProjection<InMemoryTenantStore<WarehouseId, WarehouseReadModel>>,
    pub sheets: SheetDirectoryProjection<InMemoryTenantStore<SheetId, SheetReadModel>>,
    pub reasons: ChangeReasonsProjection,
    pub orders: OrderDirectoryProjection,
    pub balances: InventoryBalancesProjection<InMemoryTenantStore<StockKey, InventoryRow>>,
    pub history: InventoryHistoryProjection,
    pub movements: MovementLogProjection,
    pub availability: AvailabilityProjection,
    apply_lock: Mutex<()>,
}

impl Default for ReadModels {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ReadModels {
    pub fn in_memory() -> Self {
        Self {
            catalog: CatalogProjection::new(),
            warehouses: WarehouseDirectoryProjection::new(InMemoryTenantStore::new()),
            sheets: SheetDirectoryProjection::new(InMemoryTenantStore::new()),
            reasons: ChangeReasonsProjection::new(),
            orders: OrderDirectoryProjection::new(),
            balances: InventoryBalancesProjection::new(InMemoryTenantStore::new()),
            history: InventoryHistoryProjection::new(),
            movements: MovementLogProjection::new(),
            availability: AvailabilityProjection::new(),
            apply_lock: Mutex::new(()),
        }
    }

    pub fn projections(&self) -> Vec<&dyn Projection> {
        vec![
            &self.catalog,
            &self.warehouses,
            &self.sheets,
            &self.reasons,
            &self.orders,
            &self.balances,
            &self.history,
            &self.movements,
            &self.availability,
        ]
    }

    /// Apply freshly committed events to every interested projection.
    ///
    /// Failures are logged, never returned: the events are already durable and a
    /// rebuild restores the read model.
    pub fn project<S: EventStore + ?Sized>(&self, store: &S, committed: &[StoredEvent]) {
        let _guard = match self.apply_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        for event in committed {
            let env = event.to_envelope();
            for projection in self.projections() {
                if !projection.consumes(env.aggregate_type()) {
                    continue;
                }
                match projection.apply_envelope(&env) {
                    Ok(()) => {}
                    Err(ProjectionError::NonMonotonicSequence { last, found }) => {
                        debug!(projection = projection.name(), last, found, "catching up stream");
                        if let Err(err) = catch_up(projection, store, event) {
                            warn!(projection = projection.name(), error = %err, "projection catch-up failed");
                        }
                    }
                    Err(err) => {
                        warn!(
                            projection = projection.name(),
                            event_id = %env.event_id(),
                            error = %err,
                            "projection rejected event"
                        );
                    }
                }
            }
        }
    }

    /// Reset every projection and replay `envelopes` (startup, or after a failure).
    pub fn rebuild(&self, envelopes: &[EventEnvelope<JsonValue>]) -> Result<(), ProjectionError> {
        let _guard = match self.apply_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        for projection in self.projections() {
            rebuild_from_scratch(projection, envelopes.iter().cloned())?;
        }
        Ok(())
    }

    /// Rebuild from everything the store holds.
    pub fn rebuild_from_store<S: EventStore + ?Sized>(&self, store: &S) -> Result<(), String> {
        let envelopes: Vec<_> = store
            .load_all()
            .map_err(|e| e.to_string())?
            .iter()
            .map(StoredEvent::to_envelope)
            .collect();
        self.rebuild(&envelopes).map_err(|e| e.to_string())
    }
}

/// Replay the whole stream of `event`; already applied envelopes are skipped by the cursors.
fn catch_up<S: EventStore + ?Sized>(
    projection: &dyn Projection,
    store: &S,
    event: &StoredEvent,
) -> Result<(), String> {
    let stream = store
        .load_stream(event.tenant_id, event.aggregate_id)
        .map_err(|e| e.to_string())?;
    for stored in &stream {
        projection
            .apply_envelope(&stored.to_envelope())
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}
