use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::{TenantId, UserId};
use stockledger_events::{
    CursorDecision, EventEnvelope, Projection, ProjectionError, StreamCursors, ensure_same_tenant,
};
use stockledger_warehouses::{SHEET_AGGREGATE, SheetBody, SheetEvent, SheetId, SheetKind, WarehouseId};

use crate::event_store::Pagination;
use crate::projections::{Page, decode, ensure_stream, text_matches};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetReadModel {
    pub id: SheetId,
    pub kind: SheetKind,
    pub code: String,
    pub reason: String,
    pub note: Option<String>,
    pub body: SheetBody,
    pub order_key: Option<String>,
    pub is_confirmed: bool,
    pub is_deleted: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub confirmed_by: Option<UserId>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SheetFilter {
    pub kind: Option<SheetKind>,
    /// Matches either side of a transfer.
    pub warehouse_id: Option<WarehouseId>,
    pub is_confirmed: Option<bool>,
    pub is_deleted: Option<bool>,
    /// Substring of the code, reason or note.
    pub search: Option<String>,
}

impl SheetFilter {
    fn matches(&self, s: &SheetReadModel) -> bool {
        self.kind.is_none_or(|k| s.kind == k)
            && self
                .warehouse_id
                .is_none_or(|w| s.body.warehouse_ids().contains(&w))
            && self.is_confirmed.is_none_or(|c| s.is_confirmed == c)
            && self.is_deleted.is_none_or(|d| s.is_deleted == d)
            && self.search.as_deref().is_none_or(|q| {
                text_matches(q, &[&s.code, &s.reason, s.note.as_deref().unwrap_or_default()])
            })
    }
}

#[derive(Debug)]
pub struct SheetDirectoryProjection<S>
where
    S: TenantStore<SheetId, SheetReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> SheetDirectoryProjection<S>
where
    S: TenantStore<SheetId, SheetReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, id: &SheetId) -> Option<SheetReadModel> {
        self.store.get(tenant_id, id)
    }

    pub fn find_by_code(&self, tenant_id: TenantId, code: &str) -> Option<SheetReadModel> {
        self.store.list(tenant_id).into_iter().find(|s| s.code == code)
    }

    /// Newest first.
    pub fn list(&self, tenant_id: TenantId, filter: &SheetFilter, pagination: Pagination) -> Page<SheetReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.code.cmp(&a.code)));
        Page::from_sorted(rows, pagination)
    }

    fn modify(
        &self,
        tenant_id: TenantId,
        id: SheetId,
        f: impl FnOnce(&mut SheetReadModel),
    ) -> Result<(), ProjectionError> {
        let mut rm = self
            .store
            .get(tenant_id, &id)
            .ok_or_else(|| ProjectionError::Rejected(format!("sheet {id} has no creation event")))?;
        f(&mut rm);
        self.store.upsert(tenant_id, id, rm);
        Ok(())
    }
}

impl<S> Projection for SheetDirectoryProjection<S>
where
    S: TenantStore<SheetId, SheetReadModel>,
{
    fn name(&self) -> &'static str {
        "sheet_directory"
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
        ensure_stream(env, ev.sheet_id().0)?;
        let tenant_id = env.tenant_id();

        match ev {
            SheetEvent::SheetCreated(e) => {
                let order_key = e.body.order_key().map(str::to_string);
                self.store.upsert(
                    tenant_id,
                    e.sheet_id,
                    SheetReadModel {
                        id: e.sheet_id,
                        kind: e.kind,
                        code: e.code,
                        reason: e.reason.name,
                        note: e.note,
                        body: e.body,
                        order_key,
                        is_confirmed: false,
                        is_deleted: false,
                        created_by: e.created_by,
                        created_at: e.occurred_at,
                        confirmed_by: None,
                        confirmed_at: None,
                        updated_at: e.occurred_at,
                    },
                );
            }
            SheetEvent::SheetUpdated(e) => self.modify(tenant_id, e.sheet_id, |rm| {
                rm.note = e.note;
                rm.reason = e.reason.name;
                rm.is_deleted = e.is_deleted;
                rm.updated_at = e.occurred_at;
            })?,
            SheetEvent::SheetConfirmed(e) => self.modify(tenant_id, e.sheet_id, |rm| {
                rm.is_confirmed = true;
                rm.confirmed_by = e.confirmed_by;
                rm.confirmed_at = Some(e.occurred_at);
                rm.updated_at = e.occurred_at;
            })?,
        }

        self.cursors.advance(env)
    }

    fn reset(&self) {
        self.store.clear_all();
        self.cursors.clear();
    }
}
