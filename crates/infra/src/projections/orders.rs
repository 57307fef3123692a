use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::{TenantId, UserId};
use stockledger_events::{
    CursorDecision, EventEnvelope, Projection, ProjectionError, StreamCursors, ensure_same_tenant,
};
use stockledger_orders::{LinkedSheet, ORDER_AGGREGATE, OrderEvent, OrderId, OrderLine, OrderStatus};

use crate::projections::{decode, ensure_stream};
use crate::read_model::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReadModel {
    pub id: OrderId,
    pub order_key: String,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub sheets: Vec<LinkedSheet>,
    pub placed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub completed_by: Option<UserId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Orders addressed by their key (`OD000001`).
#[derive(Debug, Default)]
pub struct OrderDirectoryProjection {
    store: InMemoryTenantStore<String, OrderReadModel>,
    cursors: StreamCursors,
}

impl OrderDirectoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, order_key: &str) -> Option<OrderReadModel> {
        self.store.get(tenant_id, &order_key.to_string())
    }

    /// Newest first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<OrderReadModel> {
        let mut out = self.store.list(tenant_id);
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.order_key.cmp(&a.order_key)));
        out
    }

    fn modify(
        &self,
        tenant_id: TenantId,
        order_key: &str,
        f: impl FnOnce(&mut OrderReadModel),
    ) -> Result<(), ProjectionError> {
        let mut rm = self
            .get(tenant_id, order_key)
            .ok_or_else(|| ProjectionError::Rejected(format!("order {order_key} was never placed")))?;
        f(&mut rm);
        self.store.upsert(tenant_id, order_key.to_string(), rm);
        Ok(())
    }
}

impl Projection for OrderDirectoryProjection {
    fn name(&self) -> &'static str {
        "order_directory"
    }

    fn consumes(&self, aggregate_type: &str) -> bool {
        aggregate_type == ORDER_AGGREGATE
    }

    fn apply_envelope(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if self.cursors.check(env)? == CursorDecision::Skip {
            return Ok(());
        }

        let ev: OrderEvent = decode(env)?;
        ensure_same_tenant(env, ev.tenant_id())?;
        let tenant_id = env.tenant_id();

        match ev {
            OrderEvent::OrderPlaced(e) => {
                ensure_stream(env, e.order_id.0)?;
                let completed = e.status == OrderStatus::Completed;
                self.store.upsert(
                    tenant_id,
                    e.order_key.clone(),
                    OrderReadModel {
                        id: e.order_id,
                        order_key: e.order_key,
                        status: e.status,
                        lines: e.lines,
                        sheets: Vec::new(),
                        placed_by: e.placed_by,
                        created_at: e.occurred_at,
                        completed_by: if completed { e.placed_by } else { None },
                        completed_at: completed.then_some(e.occurred_at),
                        cancelled_at: None,
                        updated_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::OrderCompleted(e) => {
                ensure_stream(env, e.order_id.0)?;
                self.modify(tenant_id, &e.order_key, |rm| {
                    rm.status = OrderStatus::Completed;
                    rm.completed_by = e.completed_by;
                    rm.completed_at = Some(e.occurred_at);
                    rm.updated_at = e.occurred_at;
                })?;
            }
            OrderEvent::OrderCancelled(e) => {
                ensure_stream(env, e.order_id.0)?;
                self.modify(tenant_id, &e.order_key, |rm| {
                    rm.status = OrderStatus::Cancelled;
                    rm.cancelled_at = Some(e.occurred_at);
                    rm.updated_at = e.occurred_at;
                })?;
            }
            OrderEvent::SheetAttached(e) => {
                ensure_stream(env, e.order_id.0)?;
                self.modify(tenant_id, &e.order_key, |rm| {
                    rm.sheets.push(LinkedSheet {
                        kind: e.kind,
                        code: e.sheet_code,
                        confirmed: false,
                    });
                    rm.updated_at = e.occurred_at;
                })?;
            }
            OrderEvent::LinkedSheetConfirmed(e) => {
                ensure_stream(env, e.order_id.0)?;
                self.modify(tenant_id, &e.order_key, |rm| {
                    if let Some(s) = rm.sheets.iter_mut().find(|s| s.code == e.sheet_code) {
                        s.confirmed = true;
                    }
                    rm.updated_at = e.occurred_at;
                })?;
            }
        }

        self.cursors.advance(env)
    }

    fn reset(&self) {
        self.store.clear_all();
        self.cursors.clear();
    }
}
