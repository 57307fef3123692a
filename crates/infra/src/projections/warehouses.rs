use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::TenantId;
use stockledger_events::{
    CursorDecision, EventEnvelope, Projection, ProjectionError, StreamCursors, ensure_same_tenant,
};
use stockledger_warehouses::{WAREHOUSE_AGGREGATE, WarehouseEvent, WarehouseId, WarehouseProfile};

use crate::projections::{decode, ensure_stream};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseReadModel {
    pub id: WarehouseId,
    #[serde(flatten)]
    pub profile: WarehouseProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct WarehouseDirectoryProjection<S>
where
    S: TenantStore<WarehouseId, WarehouseReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> WarehouseDirectoryProjection<S>
where
    S: TenantStore<WarehouseId, WarehouseReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, id: &WarehouseId) -> Option<WarehouseReadModel> {
        self.store.get(tenant_id, id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<WarehouseReadModel> {
        let mut out = self.store.list(tenant_id);
        out.sort_by(|a, b| a.profile.name.cmp(&b.profile.name).then(a.id.cmp(&b.id)));
        out
    }

    /// Warehouse carrying `name` (trimmed, case-insensitive).
    pub fn find_by_name(&self, tenant_id: TenantId, name: &str) -> Option<WarehouseReadModel> {
        let name = name.trim();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|w| w.profile.name.eq_ignore_ascii_case(name))
    }

    pub fn name_of(&self, tenant_id: TenantId, id: &WarehouseId) -> Option<String> {
        self.get(tenant_id, id).map(|w| w.profile.name)
    }
}

impl<S> Projection for WarehouseDirectoryProjection<S>
where
    S: TenantStore<WarehouseId, WarehouseReadModel>,
{
    fn name(&self) -> &'static str {
        "warehouse_directory"
    }

    fn consumes(&self, aggregate_type: &str) -> bool {
        aggregate_type == WAREHOUSE_AGGREGATE
    }

    fn apply_envelope(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if self.cursors.check(env)? == CursorDecision::Skip {
            return Ok(());
        }

        let ev: WarehouseEvent = decode(env)?;
        ensure_same_tenant(env, ev.tenant_id())?;
        let tenant_id = env.tenant_id();

        match ev {
            WarehouseEvent::WarehouseCreated(e) => {
                ensure_stream(env, e.warehouse_id.0)?;
                self.store.upsert(
                    tenant_id,
                    e.warehouse_id,
                    WarehouseReadModel {
                        id: e.warehouse_id,
                        profile: e.profile,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            WarehouseEvent::WarehouseUpdated(e) => {
                ensure_stream(env, e.warehouse_id.0)?;
                let created_at = self
                    .store
                    .get(tenant_id, &e.warehouse_id)
                    .map(|w| w.created_at)
                    .unwrap_or(e.occurred_at);
                self.store.upsert(
                    tenant_id,
                    e.warehouse_id,
                    WarehouseReadModel {
                        id: e.warehouse_id,
                        profile: e.profile,
                        created_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
        }

        self.cursors.advance(env)
    }

    fn reset(&self) {
        self.store.clear_all();
        self.cursors.clear();
    }
}
