//! Sellable availability per variant: the confirmed / non-confirmed reservation buckets.
//!
//! Order events carry their bucket changes as [`ReservationDelta`]s. Confirmed export
//! sheets take the shipped quantity out of the confirmed bucket.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::{Quantity, TenantId};
use stockledger_events::{
    CursorDecision, Event, EventEnvelope, Projection, ProjectionError, StreamCursors, ensure_same_tenant,
};
use stockledger_orders::{ORDER_AGGREGATE, OrderEvent, ReservationDelta};
use stockledger_products::VariantId;
use stockledger_warehouses::{LEDGER_AGGREGATE, LedgerEvent, SheetKind, ledger_id};

use crate::event_store::Pagination;
use crate::projections::{Page, add, decode, ensure_stream};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantAvailability {
    pub variant_id: VariantId,
    pub quantity_confirm: Quantity,
    pub quantity_non_confirm: Quantity,
    /// Order key or sheet code of the last change.
    pub note: String,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityHistoryRow {
    pub variant_id: VariantId,
    pub quantity_confirm: Quantity,
    pub quantity_non_confirm: Quantity,
    /// Difference to the next older row, 4 decimals.
    pub quantity_confirm_change: String,
    pub quantity_non_confirm_change: String,
    pub note: String,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct VariantLog {
    current: Option<VariantAvailability>,
    history: Vec<(u64, VariantAvailability)>,
}

#[derive(Debug, Default)]
struct AvailabilityState {
    variants: HashMap<(TenantId, VariantId), VariantLog>,
    counter: u64,
}

#[derive(Debug, Default)]
pub struct AvailabilityProjection {
    state: RwLock<AvailabilityState>,
    cursors: StreamCursors,
}

impl AvailabilityProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, variant_id: &VariantId) -> Option<VariantAvailability> {
        let state = self.state.read().ok()?;
        state.variants.get(&(tenant_id, *variant_id))?.current.clone()
    }

    /// Most recently modified first.
    pub fn list(&self, tenant_id: TenantId, pagination: Pagination) -> Page<VariantAvailability> {
        let mut rows: Vec<_> = match self.state.read() {
            Ok(state) => state
                .variants
                .iter()
                .filter(|((t, _), _)| *t == tenant_id)
                .filter_map(|(_, log)| log.current.clone())
                .collect(),
            Err(_) => Vec::new(),
        };
        rows.sort_by(|a, b| b.modified.cmp(&a.modified).then(a.variant_id.cmp(&b.variant_id)));
        Page::from_sorted(rows, pagination)
    }

    /// Newest first; each row carries its change versus the next older row.
    pub fn history(
        &self,
        tenant_id: TenantId,
        variant_id: &VariantId,
        pagination: Pagination,
    ) -> Result<Page<AvailabilityHistoryRow>, ProjectionError> {
        let mut history = {
            let state = self.state.read().map_err(|_| ProjectionError::Poisoned)?;
            state
                .variants
                .get(&(tenant_id, *variant_id))
                .map(|log| log.history.clone())
                .unwrap_or_default()
        };
        history.sort_by(|(ca, a), (cb, b)| a.modified.cmp(&b.modified).then(ca.cmp(cb)));

        let mut rows = Vec::with_capacity(history.len());
        let mut previous: Option<&VariantAvailability> = None;
        for (_, snap) in &history {
            let (confirm_change, non_confirm_change) = match previous {
                Some(p) => (
                    diff(snap.quantity_confirm, p.quantity_confirm)?,
                    diff(snap.quantity_non_confirm, p.quantity_non_confirm)?,
                ),
                None => (Quantity::ZERO, Quantity::ZERO),
            };
            rows.push(AvailabilityHistoryRow {
                variant_id: snap.variant_id,
                quantity_confirm: snap.quantity_confirm,
                quantity_non_confirm: snap.quantity_non_confirm,
                quantity_confirm_change: confirm_change.to_fixed_string(),
                quantity_non_confirm_change: non_confirm_change.to_fixed_string(),
                note: snap.note.clone(),
                modified: snap.modified,
            });
            previous = Some(snap);
        }
        rows.reverse();
        Ok(Page::from_sorted(rows, pagination))
    }

    fn change(
        &self,
        tenant_id: TenantId,
        changes: &[(&str, Vec<ReservationDelta>)],
        at: DateTime<Utc>,
    ) -> Result<(), ProjectionError> {
        let mut state = self.state.write().map_err(|_| ProjectionError::Poisoned)?;

        // Every delta is resolved before any of them is written.
        let mut next: Vec<VariantAvailability> = Vec::new();
        for (note, d) in changes.iter().flat_map(|(note, deltas)| deltas.iter().map(move |d| (*note, d))) {
            if d.confirmed.is_zero() && d.non_confirmed.is_zero() {
                continue;
            }
            let current = next
                .iter()
                .rev()
                .find(|n| n.variant_id == d.variant_id)
                .or_else(|| {
                    state
                        .variants
                        .get(&(tenant_id, d.variant_id))
                        .and_then(|log| log.current.as_ref())
                });
            let (confirm, non_confirm) = current
                .map(|c| (c.quantity_confirm, c.quantity_non_confirm))
                .unwrap_or((Quantity::ZERO, Quantity::ZERO));
            next.push(VariantAvailability {
                variant_id: d.variant_id,
                quantity_confirm: add(confirm, d.confirmed)?,
                quantity_non_confirm: add(non_confirm, d.non_confirmed)?,
                note: note.to_string(),
                modified: at,
            });
        }

        for snap in next {
            state.counter += 1;
            let counter = state.counter;
            let log = state.variants.entry((tenant_id, snap.variant_id)).or_default();
            log.history.push((counter, snap.clone()));
            log.current = Some(snap);
        }
        Ok(())
    }

    fn apply_order(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ev: OrderEvent = decode(env)?;
        ensure_same_tenant(env, ev.tenant_id())?;
        self.change(
            env.tenant_id(),
            &[(ev.order_key(), ev.reservation().to_vec())],
            ev.occurred_at(),
        )
    }

    fn apply_ledger(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let LedgerEvent::MovementsPosted(e) = decode(env)?;
        ensure_same_tenant(env, e.tenant_id)?;
        ensure_stream(env, ledger_id(e.tenant_id))?;

        let mut changes = Vec::new();
        for sheet in e.sheets.iter().filter(|s| s.kind == SheetKind::Export) {
            let mut shipped: BTreeMap<VariantId, Quantity> = BTreeMap::new();
            for m in &sheet.movements {
                let entry = shipped.entry(m.variant_id).or_default();
                *entry = add(*entry, m.delta)?;
            }
            let deltas: Vec<_> = shipped
                .into_iter()
                .map(|(variant_id, delta)| ReservationDelta {
                    variant_id,
                    confirmed: delta,
                    non_confirmed: Quantity::ZERO,
                })
                .collect();
            changes.push((sheet.sheet_code.as_str(), deltas));
        }
        self.change(e.tenant_id, &changes, e.occurred_at)
    }
}

fn diff(current: Quantity, previous: Quantity) -> Result<Quantity, ProjectionError> {
    current
        .checked_sub(previous)
        .map_err(|e| ProjectionError::Rejected(e.to_string()))
}

impl Projection for AvailabilityProjection {
    fn name(&self) -> &'static str {
        "availability"
    }

    fn consumes(&self, aggregate_type: &str) -> bool {
        matches!(aggregate_type, ORDER_AGGREGATE | LEDGER_AGGREGATE)
    }

    fn apply_envelope(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if self.cursors.check(env)? == CursorDecision::Skip {
            return Ok(());
        }

        match env.aggregate_type() {
            ORDER_AGGREGATE => self.apply_order(env)?,
            LEDGER_AGGREGATE => self.apply_ledger(env)?,
            _ => return Ok(()),
        }

        self.cursors.advance(env)
    }

    fn reset(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = AvailabilityState::default();
        }
        self.cursors.clear();
    }
}
