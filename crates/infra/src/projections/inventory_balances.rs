use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::{Quantity, TenantId};
use stockledger_events::{
    CursorDecision, EventEnvelope, Projection, ProjectionError, StreamCursors, ensure_same_tenant,
};
use stockledger_products::{BatchId, VariantId};
use stockledger_warehouses::{LEDGER_AGGREGATE, LedgerEvent, StockKey, WarehouseId, ledger_id};

use crate::projections::{add, decode, ensure_stream};
use crate::read_model::TenantStore;

/// Current quantity of one (warehouse, batch) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRow {
    pub warehouse_id: WarehouseId,
    pub batch_id: BatchId,
    pub variant_id: VariantId,
    pub quantity: Quantity,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRow {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.warehouse_id, self.batch_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub batch_id: Option<BatchId>,
    pub variant_id: Option<VariantId>,
    /// Keep rows whose quantity dropped to zero.
    pub include_empty: bool,
}

impl InventoryFilter {
    fn matches(&self, r: &InventoryRow) -> bool {
        self.warehouse_id.is_none_or(|w| r.warehouse_id == w)
            && self.batch_id.is_none_or(|b| r.batch_id == b)
            && self.variant_id.is_none_or(|v| r.variant_id == v)
            && (self.include_empty || !r.quantity.is_zero())
    }
}

/// Stock of one variant summed over every warehouse and batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantStock {
    pub variant_id: VariantId,
    pub quantity: Quantity,
    /// Distinct batches currently holding stock.
    pub batches: usize,
}

#[derive(Debug)]
pub struct InventoryBalancesProjection<S>
where
    S: TenantStore<StockKey, InventoryRow>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> InventoryBalancesProjection<S>
where
    S: TenantStore<StockKey, InventoryRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, key: &StockKey) -> Option<InventoryRow> {
        self.store.get(tenant_id, key)
    }

    /// 0 for rows the ledger never touched.
    pub fn quantity(&self, tenant_id: TenantId, key: &StockKey) -> Quantity {
        self.get(tenant_id, key).map(|r| r.quantity).unwrap_or(Quantity::ZERO)
    }

    /// Sorted by warehouse, then batch.
    pub fn list(&self, tenant_id: TenantId, filter: &InventoryFilter) -> Vec<InventoryRow> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        rows.sort_by_key(InventoryRow::key);
        rows
    }

    pub fn variant_totals(&self, tenant_id: TenantId) -> Result<Vec<VariantStock>, ProjectionError> {
        let mut totals: BTreeMap<VariantId, (Quantity, BTreeSet<BatchId>)> = BTreeMap::new();
        for row in self.store.list(tenant_id) {
            let entry = totals.entry(row.variant_id).or_default();
            entry.0 = add(entry.0, row.quantity)?;
            if row.quantity.is_positive() {
                entry.1.insert(row.batch_id);
            }
        }
        Ok(totals
            .into_iter()
            .map(|(variant_id, (quantity, batches))| VariantStock {
                variant_id,
                quantity,
                batches: batches.len(),
            })
            .collect())
    }
}

impl<S> Projection for InventoryBalancesProjection<S>
where
    S: TenantStore<StockKey, InventoryRow>,
{
    fn name(&self) -> &'static str {
        "inventory_balances"
    }

    fn consumes(&self, aggregate_type: &str) -> bool {
        aggregate_type == LEDGER_AGGREGATE
    }

    fn apply_envelope(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if self.cursors.check(env)? == CursorDecision::Skip {
            return Ok(());
        }

        let LedgerEvent::MovementsPosted(e) = decode(env)?;
        ensure_same_tenant(env, e.tenant_id)?;
        ensure_stream(env, ledger_id(e.tenant_id))?;

        for m in e.sheets.iter().flat_map(|s| &s.movements) {
            let current = self.quantity(e.tenant_id, &m.key());
            if add(current, m.delta)? != m.balance_after {
                return Err(ProjectionError::Rejected(format!(
                    "balance_after {} does not follow {} + {}",
                    m.balance_after, current, m.delta
                )));
            }
            self.store.upsert(
                e.tenant_id,
                m.key(),
                InventoryRow {
                    warehouse_id: m.warehouse_id,
                    batch_id: m.batch_id,
                    variant_id: m.variant_id,
                    quantity: m.balance_after,
                    updated_at: e.occurred_at,
                },
            );
        }

        self.cursors.advance(env)
    }

    fn reset(&self) {
        self.store.clear_all();
        self.cursors.clear();
    }
}
