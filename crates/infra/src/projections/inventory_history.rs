//! Point-in-time inventory: one snapshot per ledger movement.
//!
//! "Quantity as of T" for a (warehouse, batch) row is the latest snapshot taken at or
//! before T, ordered by `(at, sequence, index)`. Snapshots are never rewritten.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::{Quantity, TenantId};
use stockledger_events::{
    CursorDecision, EventEnvelope, Projection, ProjectionError, StreamCursors, ensure_same_tenant,
};
use stockledger_products::VariantId;
use stockledger_warehouses::{LEDGER_AGGREGATE, LedgerEvent, SheetKind, StockKey, ledger_id};

use crate::projections::{decode, ensure_stream};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventorySnapshot {
    pub at: DateTime<Utc>,
    /// Ledger event sequence number.
    pub sequence: u64,
    /// Movement index inside that event.
    pub index: u32,
    pub delta: Quantity,
    /// Row quantity right after the movement.
    pub quantity: Quantity,
    pub sheet_code: String,
    pub kind: SheetKind,
}

impl InventorySnapshot {
    fn order_key(&self) -> (DateTime<Utc>, u64, u32) {
        (self.at, self.sequence, self.index)
    }
}

#[derive(Debug, Clone)]
struct RowHistory {
    variant_id: VariantId,
    snapshots: Vec<InventorySnapshot>,
}

#[derive(Debug, Default)]
pub struct InventoryHistoryProjection {
    rows: RwLock<BTreeMap<(TenantId, StockKey), RowHistory>>,
    cursors: StreamCursors,
}

impl InventoryHistoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row the ledger ever touched, with its variant, sorted by key.
    pub fn keys(&self, tenant_id: TenantId) -> Vec<(StockKey, VariantId)> {
        let Ok(rows) = self.rows.read() else {
            return Vec::new();
        };
        rows.iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|((_, key), h)| (*key, h.variant_id))
            .collect()
    }

    /// Latest snapshot at or before `at` (strictly before when `inclusive` is false).
    pub fn as_of(
        &self,
        tenant_id: TenantId,
        key: &StockKey,
        at: DateTime<Utc>,
        inclusive: bool,
    ) -> Option<InventorySnapshot> {
        let rows = self.rows.read().ok()?;
        rows.get(&(tenant_id, *key))?
            .snapshots
            .iter()
            .filter(|s| if inclusive { s.at <= at } else { s.at < at })
            .max_by_key(|s| s.order_key())
            .cloned()
    }

    /// Quantity as of `at`; 0 before the first movement.
    pub fn quantity_as_of(&self, tenant_id: TenantId, key: &StockKey, at: DateTime<Utc>, inclusive: bool) -> Quantity {
        self.as_of(tenant_id, key, at, inclusive)
            .map(|s| s.quantity)
            .unwrap_or(Quantity::ZERO)
    }

    /// Movements in `[from, to)`, oldest first. `from = None` means since the beginning.
    pub fn movements_between(
        &self,
        tenant_id: TenantId,
        key: &StockKey,
        from: Option<DateTime<Utc>>,
        to: DateTime<Utc>,
    ) -> Vec<InventorySnapshot> {
        let mut out: Vec<_> = self
            .history(tenant_id, key)
            .into_iter()
            .filter(|s| from.is_none_or(|f| s.at >= f) && s.at < to)
            .collect();
        out.sort_by_key(InventorySnapshot::order_key);
        out
    }

    /// Full history of one row, oldest first.
    pub fn history(&self, tenant_id: TenantId, key: &StockKey) -> Vec<InventorySnapshot> {
        let Ok(rows) = self.rows.read() else {
            return Vec::new();
        };
        rows.get(&(tenant_id, *key))
            .map(|h| h.snapshots.clone())
            .unwrap_or_default()
    }
}

impl Projection for InventoryHistoryProjection {
    fn name(&self) -> &'static str {
        "inventory_history"
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

        {
            let mut rows = self.rows.write().map_err(|_| ProjectionError::Poisoned)?;
            let mut index = 0u32;
            for sheet in &e.sheets {
                for m in &sheet.movements {
                    let history = rows.entry((e.tenant_id, m.key())).or_insert_with(|| RowHistory {
                        variant_id: m.variant_id,
                        snapshots: Vec::new(),
                    });
                    history.snapshots.push(InventorySnapshot {
                        at: e.occurred_at,
                        sequence: env.sequence_number(),
                        index,
                        delta: m.delta,
                        quantity: m.balance_after,
                        sheet_code: sheet.sheet_code.clone(),
                        kind: sheet.kind,
                    });
                    index += 1;
                }
            }
        }

        self.cursors.advance(env)
    }

    fn reset(&self) {
        if let Ok(mut rows) = self.rows.write() {
            rows.clear();
        }
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use stockledger_products::BatchId;
    use stockledger_warehouses::{MovementsPosted, PostedMovement, PostedSheet, SheetId, WarehouseId};
    use uuid::Uuid;

    #[allow(clippy::too_many_arguments)]
    fn post(
        p: &InventoryHistoryProjection,
        tenant_id: TenantId,
        seq: u64,
        at: DateTime<Utc>,
        key: StockKey,
        variant_id: VariantId,
        delta: i64,
        after: i64,
    ) {
        let ev = LedgerEvent::MovementsPosted(MovementsPosted {
            tenant_id,
            ledger_id: ledger_id(tenant_id),
            sheets: vec![PostedSheet {
                sheet_id: SheetId::generate(),
                sheet_code: format!("IP{seq:06}"),
                kind: if delta >= 0 { SheetKind::Import } else { SheetKind::Export },
                reason: "r".into(),
                movements: vec![PostedMovement {
                    warehouse_id: key.warehouse_id,
                    batch_id: key.batch_id,
                    variant_id,
                    delta: Quantity::from_i64(delta).unwrap(),
                    balance_after: Quantity::from_i64(after).unwrap(),
                }],
            }],
            posted_by: None,
            occurred_at: at,
        });
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            ledger_id(tenant_id),
            LEDGER_AGGREGATE,
            seq,
            serde_json::to_value(&ev).unwrap(),
        );
        p.apply_envelope(&env).unwrap();
    }

    fn key() -> StockKey {
        StockKey::new(WarehouseId::generate(), BatchId::generate())
    }

    #[test]
    fn as_of_picks_latest_snapshot_not_after_t() {
        let p = InventoryHistoryProjection::new();
        let t = TenantId::new();
        let k = key();
        let v = VariantId::generate();
        let t0 = Utc::now();

        post(&p, t, 1, t0, k, v, 10, 10);
        post(&p, t, 2, t0 + Duration::hours(1), k, v, -4, 6);

        assert!(p.as_of(t, &k, t0 - Duration::seconds(1), true).is_none());
        assert_eq!(p.quantity_as_of(t, &k, t0, true), Quantity::from_i64(10).unwrap());
        assert_eq!(p.quantity_as_of(t, &k, t0, false), Quantity::ZERO);
        assert_eq!(p.quantity_as_of(t, &k, t0 + Duration::hours(2), true), Quantity::from_i64(6).unwrap());
        assert_eq!(p.keys(t), vec![(k, v)]);
        assert!(p.keys(TenantId::new()).is_empty());
    }

    #[test]
    fn same_timestamp_is_ordered_by_sequence() {
        let p = InventoryHistoryProjection::new();
        let t = TenantId::new();
        let k = key();
        let v = VariantId::generate();
        let at = Utc::now();

        post(&p, t, 1, at, k, v, 5, 5);
        post(&p, t, 2, at, k, v, 2, 7);

        assert_eq!(p.quantity_as_of(t, &k, at, true), Quantity::from_i64(7).unwrap());
        let window = p.movements_between(t, &k, Some(at), at + Duration::seconds(1));
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].sequence, 1);
    }

    proptest! {
        #[test]
        fn reconstruction_matches_running_sum(deltas in proptest::collection::vec(-20i64..40, 1..30), pick in 0usize..30) {
            let p = InventoryHistoryProjection::new();
            let t = TenantId::new();
            let k = key();
            let v = VariantId::generate();
            let t0 = Utc::now();

            let mut balance = 0i64;
            let mut seq = 0u64;
            let mut expected = Vec::new();
            for d in deltas {
                if balance + d < 0 {
                    continue;
                }
                balance += d;
                seq += 1;
                post(&p, t, seq, t0 + Duration::minutes(seq as i64), k, v, d, balance);
                expected.push(balance);
            }
            prop_assume!(!expected.is_empty());

            let i = pick % expected.len();
            let at = t0 + Duration::minutes(i as i64 + 1);
            prop_assert_eq!(p.quantity_as_of(t, &k, at, true), Quantity::from_i64(expected[i]).unwrap());

            let total = p
                .movements_between(t, &k, None, at + Duration::seconds(1))
                .iter()
                .try_fold(Quantity::ZERO, |acc, s| acc.checked_add(s.delta))
                .unwrap();
            prop_assert_eq!(total, Quantity::from_i64(expected[i]).unwrap());
        }
    }
}
