use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::instrument;

use stockledger_core::{DomainError, TenantId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_warehouses::{
    CreateWarehouse, UpdateWarehouse, WAREHOUSE_AGGREGATE, Warehouse, WarehouseChanges, WarehouseCommand,
    WarehouseId, WarehouseProfile,
};

use super::{InventoryWorkflow, WorkflowResult};
use crate::event_store::EventStore;

impl<S, B> InventoryWorkflow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Warehouse names are unique per tenant (case-insensitive).
    #[instrument(skip(self, profile), fields(tenant_id = %tenant_id), err)]
    pub fn create_warehouse(&self, tenant_id: TenantId, profile: WarehouseProfile) -> WorkflowResult<WarehouseId> {
        let _guard = self.lock();
        self.ensure_unique_name(tenant_id, &profile.name, None)?;

        let warehouse_id = WarehouseId::generate();
        self.execute(
            tenant_id,
            warehouse_id.0,
            WAREHOUSE_AGGREGATE,
            WarehouseCommand::CreateWarehouse(CreateWarehouse {
                tenant_id,
                warehouse_id,
                profile,
                occurred_at: Utc::now(),
            }),
            |_, id| Warehouse::empty(WarehouseId(id)),
        )?;
        Ok(warehouse_id)
    }

    #[instrument(skip(self, changes), fields(tenant_id = %tenant_id, warehouse_id = %warehouse_id), err)]
    pub fn update_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        changes: WarehouseChanges,
    ) -> WorkflowResult<()> {
        let _guard = self.lock();
        if let Some(name) = &changes.name {
            self.ensure_unique_name(tenant_id, name, Some(warehouse_id))?;
        }

        self.execute(
            tenant_id,
            warehouse_id.0,
            WAREHOUSE_AGGREGATE,
            WarehouseCommand::UpdateWarehouse(UpdateWarehouse {
                tenant_id,
                warehouse_id,
                changes,
                occurred_at: Utc::now(),
            }),
            |_, id| Warehouse::empty(WarehouseId(id)),
        )?;
        Ok(())
    }

    fn ensure_unique_name(&self, tenant_id: TenantId, name: &str, except: Option<WarehouseId>) -> WorkflowResult<()> {
        match self.models.warehouses.find_by_name(tenant_id, name) {
            Some(existing) if Some(existing.id) != except => Err(DomainError::conflict(format!(
                "warehouse name '{}' is already used",
                name.trim()
            ))
            .into()),
            _ => Ok(()),
        }
    }

    /// Strong read; missing warehouses are a validation error.
    pub(super) fn warehouse(&self, tenant_id: TenantId, warehouse_id: WarehouseId) -> WorkflowResult<Warehouse> {
        let warehouse: Warehouse = self.load(tenant_id, warehouse_id.0, WAREHOUSE_AGGREGATE, |_, id| {
            Warehouse::empty(WarehouseId(id))
        })?;
        if !warehouse.is_created() {
            return Err(DomainError::validation(format!("warehouse {warehouse_id} not found")).into());
        }
        Ok(warehouse)
    }
}
