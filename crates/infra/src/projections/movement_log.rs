//! Immutable inventory log: one row per posted movement.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockledger_core::{Quantity, TenantId};
use stockledger_events::{
    CursorDecision, EventEnvelope, Projection, ProjectionError, StreamCursors, ensure_same_tenant,
};
use stockledger_products::{BATCH_AGGREGATE, BatchEvent, BatchId, VariantId};
use stockledger_warehouses::{
    LEDGER_AGGREGATE, LedgerEvent, SheetKind, WAREHOUSE_AGGREGATE, WarehouseEvent, WarehouseId, ledger_id,
};

use crate::event_store::Pagination;
use crate::projections::{Page, decode, ensure_stream, text_matches};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementLogRow {
    /// Stable across rebuilds: derived from the ledger event id and movement index.
    pub id: Uuid,
    pub sheet_code: String,
    pub kind: SheetKind,
    pub reason: String,
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    pub batch_id: BatchId,
    pub batch_name: String,
    pub variant_id: VariantId,
    pub quantity: Quantity,
    pub balance_after: Quantity,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    position: (u64, u32),
}

#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub batch_id: Option<BatchId>,
    pub variant_id: Option<VariantId>,
    pub kind: Option<SheetKind>,
    pub sheet_code: Option<String>,
    /// Inclusive.
    pub date_from: Option<DateTime<Utc>>,
    /// Exclusive.
    pub date_to: Option<DateTime<Utc>>,
    /// Sheet code, reason, warehouse name or batch name.
    pub search: Option<String>,
}

impl MovementFilter {
    fn matches(&self, r: &MovementLogRow) -> bool {
        self.warehouse_id.is_none_or(|w| r.warehouse_id == w)
            && self.batch_id.is_none_or(|b| r.batch_id == b)
            && self.variant_id.is_none_or(|v| r.variant_id == v)
            && self.kind.is_none_or(|k| r.kind == k)
            && self.sheet_code.as_deref().is_none_or(|c| r.sheet_code == c)
            && self.date_from.is_none_or(|f| r.created_at >= f)
            && self.date_to.is_none_or(|t| r.created_at < t)
            && self.search.as_deref().is_none_or(|q| {
                text_matches(q, &[&r.sheet_code, &r.reason, &r.warehouse_name, &r.batch_name])
            })
    }
}

#[derive(Debug, Default)]
struct LogState {
    rows: HashMap<TenantId, Vec<MovementLogRow>>,
    warehouse_names: HashMap<(TenantId, WarehouseId), String>,
    batch_names: HashMap<(TenantId, BatchId), String>,
}

/// Log rows plus the warehouse and batch names the listing searches over.
#[derive(Debug, Default)]
pub struct MovementLogProjection {
    state: RwLock<LogState>,
    cursors: StreamCursors,
}

impl MovementLogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest first.
    pub fn list(&self, tenant_id: TenantId, filter: &MovementFilter, pagination: Pagination) -> Page<MovementLogRow> {
        let Ok(state) = self.state.read() else {
            return Page::from_sorted(Vec::new(), pagination);
        };
        let mut rows: Vec<_> = state
            .rows
            .get(&tenant_id)
            .into_iter()
            .flatten()
            .map(|r| {
                let mut r = r.clone();
                if let Some(n) = state.warehouse_names.get(&(tenant_id, r.warehouse_id)) {
                    r.warehouse_name = n.clone();
                }
                if let Some(n) = state.batch_names.get(&(tenant_id, r.batch_id)) {
                    r.batch_name = n.clone();
                }
                r
            })
            .filter(|r| filter.matches(r))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.position.cmp(&a.position)));
        Page::from_sorted(rows, pagination)
    }

    fn apply_ledger(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let LedgerEvent::MovementsPosted(e) = decode(env)?;
        ensure_same_tenant(env, e.tenant_id)?;
        ensure_stream(env, ledger_id(e.tenant_id))?;

        let mut state = self.state.write().map_err(|_| ProjectionError::Poisoned)?;
        let mut index = 0u32;
        let mut fresh = Vec::new();
        for sheet in &e.sheets {
            for m in &sheet.movements {
                let name = format!("{}:{index}", env.event_id());
                fresh.push(MovementLogRow {
                    id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
                    sheet_code: sheet.sheet_code.clone(),
                    kind: sheet.kind,
                    reason: sheet.reason.clone(),
                    warehouse_id: m.warehouse_id,
                    warehouse_name: state
                        .warehouse_names
                        .get(&(e.tenant_id, m.warehouse_id))
                        .cloned()
                        .unwrap_or_default(),
                    batch_id: m.batch_id,
                    batch_name: state
                        .batch_names
                        .get(&(e.tenant_id, m.batch_id))
                        .cloned()
                        .unwrap_or_default(),
                    variant_id: m.variant_id,
                    quantity: m.delta,
                    balance_after: m.balance_after,
                    created_at: e.occurred_at,
                    position: (env.sequence_number(), index),
                });
                index += 1;
            }
        }
        state.rows.entry(e.tenant_id).or_default().extend(fresh);
        Ok(())
    }

    fn apply_warehouse(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let (tenant_id, warehouse_id, name) = match decode(env)? {
            WarehouseEvent::WarehouseCreated(e) => (e.tenant_id, e.warehouse_id, e.profile.name),
            WarehouseEvent::WarehouseUpdated(e) => (e.tenant_id, e.warehouse_id, e.profile.name),
        };
        ensure_same_tenant(env, tenant_id)?;
        ensure_stream(env, warehouse_id.0)?;

        let mut state = self.state.write().map_err(|_| ProjectionError::Poisoned)?;
        state.warehouse_names.insert((tenant_id, warehouse_id), name);
        Ok(())
    }

    fn apply_batch(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let BatchEvent::BatchRegistered(e) = decode(env)?;
        ensure_same_tenant(env, e.tenant_id)?;
        ensure_stream(env, e.batch_id.0)?;

        let mut state = self.state.write().map_err(|_| ProjectionError::Poisoned)?;
        state.batch_names.insert((e.tenant_id, e.batch_id), e.name);
        Ok(())
    }
}

impl Projection for MovementLogProjection {
    fn name(&self) -> &'static str {
        "movement_log"
    }

    fn consumes(&self, aggregate_type: &str) -> bool {
        matches!(aggregate_type, LEDGER_AGGREGATE | WAREHOUSE_AGGREGATE | BATCH_AGGREGATE)
    }

    fn apply_envelope(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if self.cursors.check(env)? == CursorDecision::Skip {
            return Ok(());
        }

        match env.aggregate_type() {
            LEDGER_AGGREGATE => self.apply_ledger(env)?,
            WAREHOUSE_AGGREGATE => self.apply_warehouse(env)?,
            BATCH_AGGREGATE => self.apply_batch(env)?,
            _ => return Ok(()),
        }

        self.cursors.advance(env)
    }

    fn reset(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = LogState::default();
        }
        self.cursors.clear();
    }
}
