use serde_json::Value as JsonValue;

use stockledger_core::TenantId;
use stockledger_events::{
    CursorDecision, EventEnvelope, Projection, ProjectionError, StreamCursors, ensure_same_tenant,
};
use stockledger_warehouses::{ChangeReason, SHEET_AGGREGATE, SheetEvent, SheetKind};

use crate::projections::decode;
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Change reasons used on sheets, per kind (feeds the reason pickers).
#[derive(Debug, Default)]
pub struct ChangeReasonsProjection {
    store: InMemoryTenantStore<ChangeReason, ChangeReason>,
    cursors: StreamCursors,
}

impl ChangeReasonsProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted by kind, then name.
    pub fn list(&self, tenant_id: TenantId, kind: Option<SheetKind>) -> Vec<ChangeReason> {
        let mut out: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .collect();
        out.sort();
        out
    }
}

impl Projection for ChangeReasonsProjection {
    fn name(&self) -> &'static str {
        "change_reasons"
    }

    fn consumes(&self, aggregate_type: &str) -> bool {
        aggregate_type == SHEET_AGGREGATE
    }

    fn apply_envelope(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if self.cursors.check(env)? == CursorDecision::Skip {
            return Ok(());
        }

        let ev: SheetEvent = decode(env)?;
        ensure_same_tenant(env, ev.tenant_id())?;

        let reason = match ev {
            SheetEvent::SheetCreated(e) => Some(e.reason),
            SheetEvent::SheetUpdated(e) => Some(e.reason),
            SheetEvent::SheetConfirmed(_) => None,
        };
        if let Some(r) = reason {
            self.store.upsert(env.tenant_id(), r.clone(), r);
        }

        self.cursors.advance(env)
    }

    fn reset(&self) {
        self.store.clear_all();
        self.cursors.clear();
    }
}
