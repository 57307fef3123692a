use chrono::Utc;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use stockledger_core::{Aggregate, AggregateRoot, DomainError, Quantity, TenantId, UserId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_orders::{
    AttachSheet, MarkSheetConfirmed, ORDER_AGGREGATE, Order, OrderCommand, OrderId, OrderStatus, order_id_for_key,
    stock_items,
};
use stockledger_products::BatchId;
use stockledger_warehouses::{
    ChangeReason, CheckLine, CreateSheet, LedgerCommand, PostSheets,
    SHEET_AGGREGATE, SetConfirmation, Sheet, SheetBody, SheetCommand, SheetId, SheetKind, SheetLine, SheetPosting,
    StockKey, UpdateSheet, WarehouseId, format_code,
};

use super::{InventoryWorkflow, WorkflowError, WorkflowResult};
use crate::event_store::EventStore;
use crate::projections::SheetReadModel;

/// Most sheets one bulk confirmation may carry.
pub const MAX_BULK_CONFIRM: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct NewSheetLine {
    pub batch_id: BatchId,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCheckLine {
    pub batch_id: BatchId,
    pub quantity_actual: Quantity,
}

/// Sheet content as submitted; variants and system quantities are filled in on creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NewSheetBody {
    ImportExport {
        warehouse_id: WarehouseId,
        #[serde(default)]
        order_key: Option<String>,
        lines: Vec<NewSheetLine>,
    },
    Transfer {
        from_warehouse_id: WarehouseId,
        to_warehouse_id: WarehouseId,
        lines: Vec<NewSheetLine>,
    },
    Check {
        warehouse_id: WarehouseId,
        lines: Vec<NewCheckLine>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSheet {
    pub kind: SheetKind,
    pub reason: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub is_confirm: bool,
    pub body: NewSheetBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetChanges {
    pub note: Option<String>,
    pub reason: Option<String>,
    pub is_deleted: Option<bool>,
    pub is_confirm: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkConfirmEntry {
    pub id: SheetId,
    pub is_confirm: bool,
}

impl<S, B> InventoryWorkflow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create a sheet with a fresh code; `is_confirm` posts it to the ledger right away.
    ///
    /// Everything is validated before the code is issued, including the ledger posting
    /// when confirming, so a rejected request leaves no trace.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, kind = %input.kind), err)]
    pub fn create_sheet(
        &self,
        tenant_id: TenantId,
        actor: Option<UserId>,
        input: NewSheet,
    ) -> WorkflowResult<SheetReadModel> {
        let _guard = self.lock();

        let reason = ChangeReason::new(input.kind, &input.reason)?;
        let body = self.resolve_body(tenant_id, input.body)?;
        let order = match body.order_key() {
            Some(key) => Some(self.linkable_order(tenant_id, key, input.kind, &body)?),
            None => None,
        };

        let sheet_id = SheetId::generate();
        let mut create = CreateSheet {
            tenant_id,
            sheet_id,
            kind: input.kind,
            code: format_code(input.kind.sequence(), 0),
            reason,
            note: input.note,
            body,
            created_by: actor,
            occurred_at: Utc::now(),
        };

        let mut draft = Sheet::empty(sheet_id);
        for e in draft.handle(&SheetCommand::CreateSheet(create.clone()))? {
            draft.apply(&e);
        }
        if input.is_confirm {
            self.preflight_posting(tenant_id, draft.posting()?)?;
        }

        create.code = self.issue_code(tenant_id, input.kind.sequence())?;
        let code = create.code.clone();
        self.execute(
            tenant_id,
            sheet_id.0,
            SHEET_AGGREGATE,
            SheetCommand::CreateSheet(create),
            |_, id| Sheet::empty(SheetId(id)),
        )?;

        if let Some(order) = order {
            self.execute(
                tenant_id,
                order.0,
                ORDER_AGGREGATE,
                OrderCommand::AttachSheet(AttachSheet {
                    tenant_id,
                    order_id: order,
                    kind: input.kind,
                    sheet_code: code.clone(),
                    occurred_at: Utc::now(),
                }),
                |_, id| Order::empty(OrderId(id)),
            )?;
        }

        if input.is_confirm {
            self.confirm_sheets(tenant_id, actor, &[sheet_id])?;
        }
        info!(sheet_code = %code, "sheet created");

        self.sheet_read_model(tenant_id, sheet_id)
    }

    /// Edit note, reason or deletion flag; `is_confirm = true` confirms.
    #[instrument(skip(self, changes), fields(tenant_id = %tenant_id, sheet_id = %sheet_id), err)]
    pub fn update_sheet(
        &self,
        tenant_id: TenantId,
        actor: Option<UserId>,
        sheet_id: SheetId,
        changes: SheetChanges,
    ) -> WorkflowResult<SheetReadModel> {
        let _guard = self.lock();

        let sheet = self.sheet(tenant_id, sheet_id)?;
        if changes.is_confirm == Some(false) && sheet.is_confirmed() {
            return Err(DomainError::invariant("cannot change confirmation True→False").into());
        }
        let reason = changes
            .reason
            .as_deref()
            .map(|r| ChangeReason::new(sheet.kind(), r))
            .transpose()?;

        let confirm = changes.is_confirm == Some(true) && !sheet.is_confirmed();
        if confirm {
            if changes.is_deleted.unwrap_or(sheet.is_deleted()) {
                return Err(DomainError::invariant("deleted sheet cannot be confirmed").into());
            }
            self.ensure_order_open(tenant_id, &sheet)?;
            self.preflight_posting(tenant_id, sheet.posting()?)?;
        }

        self.execute(
            tenant_id,
            sheet_id.0,
            SHEET_AGGREGATE,
            SheetCommand::UpdateSheet(UpdateSheet {
                tenant_id,
                sheet_id,
                note: changes.note,
                reason,
                is_deleted: changes.is_deleted,
                occurred_at: Utc::now(),
            }),
            |_, id| Sheet::empty(SheetId(id)),
        )?;

        if confirm {
            self.confirm_sheets(tenant_id, actor, &[sheet_id])?;
        }

        self.sheet_read_model(tenant_id, sheet_id)
    }

    /// Confirm up to [`MAX_BULK_CONFIRM`] sheets with a single ledger posting: either every
    /// sheet's stock moves or none does.
    #[instrument(skip(self, entries), fields(tenant_id = %tenant_id, count = entries.len()), err)]
    pub fn bulk_confirm(
        &self,
        tenant_id: TenantId,
        actor: Option<UserId>,
        entries: &[BulkConfirmEntry],
    ) -> WorkflowResult<Vec<SheetReadModel>> {
        if entries.is_empty() || entries.len() > MAX_BULK_CONFIRM {
            return Err(DomainError::validation(format!(
                "bulk confirmation takes between 1 and {MAX_BULK_CONFIRM} sheets"
            ))
            .into());
        }
        let _guard = self.lock();

        let mut to_confirm = Vec::new();
        for entry in entries {
            let sheet = match self.sheet(tenant_id, entry.id) {
                Ok(s) => s,
                Err(WorkflowError::Domain(DomainError::NotFound)) => {
                    return Err(DomainError::validation(format!("sheet not found: {}", entry.id)).into());
                }
                Err(e) => return Err(e),
            };
            if !entry.is_confirm && sheet.is_confirmed() {
                return Err(DomainError::invariant(format!(
                    "cannot change confirmation True→False for sheet {}",
                    sheet.code()
                ))
                .into());
            }
            if entry.is_confirm && !to_confirm.contains(&entry.id) {
                to_confirm.push(entry.id);
            }
        }

        self.confirm_sheets(tenant_id, actor, &to_confirm)?;

        entries
            .iter()
            .map(|e| self.sheet_read_model(tenant_id, e.id))
            .collect()
    }

    /// Ledger first, then each sheet, then each linked order.
    fn confirm_sheets(&self, tenant_id: TenantId, actor: Option<UserId>, ids: &[SheetId]) -> WorkflowResult<()> {
        let mut pending = Vec::new();
        for id in ids {
            let sheet = self.sheet(tenant_id, *id)?;
            if sheet.is_confirmed() {
                continue;
            }
            if sheet.is_deleted() {
                return Err(DomainError::invariant(format!("deleted sheet {} cannot be confirmed", sheet.code())).into());
            }
            self.ensure_order_open(tenant_id, &sheet)?;
            pending.push(sheet);
        }
        if pending.is_empty() {
            return Ok(());
        }

        let postings = pending.iter().map(Sheet::posting).collect::<Result<Vec<_>, _>>()?;
        let now = Utc::now();
        self.execute_on_ledger(
            tenant_id,
            LedgerCommand::PostSheets(PostSheets {
                tenant_id,
                postings,
                posted_by: actor,
                occurred_at: now,
            }),
        )?;

        for sheet in &pending {
            let sheet_id = *sheet.id();
            self.execute(
                tenant_id,
                sheet_id.0,
                SHEET_AGGREGATE,
                SheetCommand::SetConfirmation(SetConfirmation {
                    tenant_id,
                    sheet_id,
                    is_confirmed: true,
                    confirmed_by: actor,
                    occurred_at: now,
                }),
                |_, id| Sheet::empty(SheetId(id)),
            )?;

            if let Some(key) = sheet.order_key() {
                let order_id = order_id_for_key(tenant_id, key);
                self.execute(
                    tenant_id,
                    order_id.0,
                    ORDER_AGGREGATE,
                    OrderCommand::MarkSheetConfirmed(MarkSheetConfirmed {
                        tenant_id,
                        order_id,
                        sheet_code: sheet.code().to_string(),
                        occurred_at: now,
                    }),
                    |_, id| Order::empty(OrderId(id)),
                )?;
            }
        }
        Ok(())
    }

    /// Run the posting against the current ledger without appending anything.
    fn preflight_posting(&self, tenant_id: TenantId, posting: SheetPosting) -> WorkflowResult<()> {
        let ledger = self.ledger(tenant_id)?;
        ledger.handle(&LedgerCommand::PostSheets(PostSheets {
            tenant_id,
            postings: vec![posting],
            posted_by: None,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    fn ensure_order_open(&self, tenant_id: TenantId, sheet: &Sheet) -> WorkflowResult<()> {
        if let Some(key) = sheet.order_key() {
            let order = self.order(tenant_id, key)?;
            if order.status() == OrderStatus::Cancelled {
                return Err(DomainError::validation(format!("order cancelled: {key}")).into());
            }
        }
        Ok(())
    }

    /// Check that `key` may receive a sheet of `kind` with these lines.
    ///
    /// The order must exist, carry no sheet of this kind and not be cancelled. The sheet
    /// must have as many lines as the order, only variants the order ships, in exactly
    /// the ordered quantities.
    fn linkable_order(&self, tenant_id: TenantId, key: &str, kind: SheetKind, body: &SheetBody) -> WorkflowResult<OrderId> {
        let order = match self.order(tenant_id, key) {
            Ok(o) => o,
            Err(WorkflowError::Domain(DomainError::NotFound)) => {
                return Err(DomainError::validation(format!("order not found: {key}")).into());
            }
            Err(e) => return Err(e),
        };
        if order.sheet_of_kind(kind).is_some() {
            return Err(DomainError::validation(format!("order already has a sheet: {key}")).into());
        }
        if order.status() == OrderStatus::Cancelled {
            return Err(DomainError::validation(format!("order cancelled: {key}")).into());
        }

        let SheetBody::ImportExport { lines, .. } = body else {
            return Err(DomainError::validation("only import and export sheets link to orders").into());
        };
        let expected = stock_items(order.lines())?;
        if lines.len() != expected.line_count {
            return Err(DomainError::validation(format!(
                "sheet has {} lines but order {key} has {}",
                lines.len(),
                expected.line_count
            ))
            .into());
        }

        let mut listed: std::collections::BTreeMap<_, Quantity> = std::collections::BTreeMap::new();
        for line in lines {
            if expected.quantity_of(&line.variant_id).is_none() {
                return Err(DomainError::validation(format!(
                    "variant {} is not part of order {key}",
                    line.variant_id
                ))
                .into());
            }
            let entry = listed.entry(line.variant_id).or_insert(Quantity::ZERO);
            *entry = entry.checked_add(line.quantity)?;
        }
        for (variant_id, quantity) in &listed {
            let ordered = expected.quantity_of(variant_id).unwrap_or(Quantity::ZERO);
            if *quantity != ordered {
                return Err(DomainError::validation(format!(
                    "quantity of variant {variant_id} does not match order {key}: ordered {ordered}, on sheet {quantity}"
                ))
                .into());
            }
        }

        Ok(*order.id())
    }

    /// Attach variants to lines, check warehouses exist and capture check-sheet system
    /// quantities from the ledger.
    fn resolve_body(&self, tenant_id: TenantId, body: NewSheetBody) -> WorkflowResult<SheetBody> {
        Ok(match body {
            NewSheetBody::ImportExport {
                warehouse_id,
                order_key,
                lines,
            } => {
                self.warehouse(tenant_id, warehouse_id)?;
                SheetBody::ImportExport {
                    warehouse_id,
                    order_key: order_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
                    lines: self.resolve_lines(tenant_id, lines)?,
                }
            }
            NewSheetBody::Transfer {
                from_warehouse_id,
                to_warehouse_id,
                lines,
            } => {
                self.warehouse(tenant_id, from_warehouse_id)?;
                self.warehouse(tenant_id, to_warehouse_id)?;
                SheetBody::Transfer {
                    from_warehouse_id,
                    to_warehouse_id,
                    lines: self.resolve_lines(tenant_id, lines)?,
                }
            }
            NewSheetBody::Check { warehouse_id, lines } => {
                self.warehouse(tenant_id, warehouse_id)?;
                let ledger = self.ledger(tenant_id)?;
                let mut out = Vec::with_capacity(lines.len());
                for l in lines {
                    let batch = self.batch(tenant_id, l.batch_id)?;
                    let key = StockKey::new(warehouse_id, l.batch_id);
                    if !ledger.has_row(&key) {
                        return Err(DomainError::validation(format!(
                            "warehouse-batch not found: batch {} in warehouse {warehouse_id}",
                            l.batch_id
                        ))
                        .into());
                    }
                    out.push(CheckLine {
                        batch_id: l.batch_id,
                        variant_id: batch.variant_id().ok_or_else(DomainError::not_found)?,
                        quantity_system: ledger.balance(&key),
                        quantity_actual: l.quantity_actual,
                    });
                }
                SheetBody::Check {
                    warehouse_id,
                    lines: out,
                }
            }
        })
    }

    fn resolve_lines(&self, tenant_id: TenantId, lines: Vec<NewSheetLine>) -> WorkflowResult<Vec<SheetLine>> {
        lines
            .into_iter()
            .map(|l| {
                let batch = self.batch(tenant_id, l.batch_id)?;
                Ok(SheetLine {
                    batch_id: l.batch_id,
                    variant_id: batch.variant_id().ok_or_else(DomainError::not_found)?,
                    quantity: l.quantity,
                })
            })
            .collect()
    }

    fn sheet(&self, tenant_id: TenantId, sheet_id: SheetId) -> WorkflowResult<Sheet> {
        let sheet: Sheet = self.load(tenant_id, sheet_id.0, SHEET_AGGREGATE, |_, id| Sheet::empty(SheetId(id)))?;
        if !sheet.is_created() {
            return Err(DomainError::not_found().into());
        }
        Ok(sheet)
    }

    fn sheet_read_model(&self, tenant_id: TenantId, sheet_id: SheetId) -> WorkflowResult<SheetReadModel> {
        self.models
            .sheets
            .get(tenant_id, &sheet_id)
            .ok_or_else(|| DomainError::not_found().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_warehouses::{InventoryLedger, LEDGER_AGGREGATE, MovementLine, ledger_id};

    use crate::projections::InventoryFilter;
    use crate::workflow::test_support::{fixture, import, profile, q, workflow};

    #[test]
    fn import_then_export_moves_stock_and_logs_movements() {
        let wf = workflow();
        let f = fixture(&wf);

        import(&wf, &f, 10, true);
        let export = wf
            .create_sheet(
                f.tenant,
                Some(f.user),
                NewSheet {
                    kind: SheetKind::Export,
                    reason: "sale".into(),
                    note: None,
                    is_confirm: true,
                    body: NewSheetBody::ImportExport {
                        warehouse_id: f.warehouse,
                        order_key: None,
                        lines: vec![NewSheetLine { batch_id: f.batch, quantity: q(4) }],
                    },
                },
            )
            .unwrap();

        assert!(export.is_confirmed);
        assert_eq!(export.code, "EP000001");
        let key = StockKey::new(f.warehouse, f.batch);
        assert_eq!(wf.models().balances.quantity(f.tenant, &key), q(6));
        let log = wf
            .models()
            .movements
            .list(f.tenant, &Default::default(), Default::default());
        assert_eq!(log.total, 2);
        assert_eq!(log.items[0].quantity, q(-4));
    }

    #[test]
    fn overdrawing_export_leaves_no_trace() {
        let wf = workflow();
        let f = fixture(&wf);
        import(&wf, &f, 3, true);

        let err = wf
            .create_sheet(
                f.tenant,
                None,
                NewSheet {
                    kind: SheetKind::Export,
                    reason: "sale".into(),
                    note: None,
                    is_confirm: true,
                    body: NewSheetBody::ImportExport {
                        warehouse_id: f.warehouse,
                        order_key: None,
                        lines: vec![NewSheetLine { batch_id: f.batch, quantity: q(5) }],
                    },
                },
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::InvariantViolation(_))));

        let sheets = wf.models().sheets.list(f.tenant, &Default::default(), Default::default());
        assert_eq!(sheets.total, 1);
        assert_eq!(wf.models().balances.quantity(f.tenant, &StockKey::new(f.warehouse, f.batch)), q(3));
    }

    #[test]
    fn transfer_moves_stock_between_warehouses() {
        let wf = workflow();
        let f = fixture(&wf);
        let other = wf.create_warehouse(f.tenant, profile("Overflow")).unwrap();
        import(&wf, &f, 8, true);

        wf.create_sheet(
            f.tenant,
            None,
            NewSheet {
                kind: SheetKind::Transfer,
                reason: "rebalance".into(),
                note: None,
                is_confirm: true,
                body: NewSheetBody::Transfer {
                    from_warehouse_id: f.warehouse,
                    to_warehouse_id: other,
                    lines: vec![NewSheetLine { batch_id: f.batch, quantity: q(5) }],
                },
            },
        )
        .unwrap();

        let rows = wf.models().balances.list(f.tenant, &InventoryFilter::default());
        let by_wh: Vec<_> = rows.iter().map(|r| (r.warehouse_id, r.quantity)).collect();
        assert!(by_wh.contains(&(f.warehouse, q(3))));
        assert!(by_wh.contains(&(other, q(5))));
    }

    #[test]
    fn check_sheet_captures_system_quantity_and_applies_difference() {
        let wf = workflow();
        let f = fixture(&wf);

        let never_stocked = wf
            .create_sheet(
                f.tenant,
                None,
                NewSheet {
                    kind: SheetKind::Check,
                    reason: "stocktake".into(),
                    note: None,
                    is_confirm: false,
                    body: NewSheetBody::Check {
                        warehouse_id: f.warehouse,
                        lines: vec![NewCheckLine { batch_id: f.batch, quantity_actual: q(1) }],
                    },
                },
            )
            .unwrap_err();
        assert!(matches!(never_stocked, WorkflowError::Domain(DomainError::Validation(m)) if m.contains("warehouse-batch not found")));

        import(&wf, &f, 10, true);
        let check = wf
            .create_sheet(
                f.tenant,
                None,
                NewSheet {
                    kind: SheetKind::Check,
                    reason: "stocktake".into(),
                    note: None,
                    is_confirm: false,
                    body: NewSheetBody::Check {
                        warehouse_id: f.warehouse,
                        lines: vec![NewCheckLine { batch_id: f.batch, quantity_actual: "7.5".parse().unwrap() }],
                    },
                },
            )
            .unwrap();
        let SheetBody::Check { lines, .. } = &check.body else {
            panic!("check body expected");
        };
        assert_eq!(lines[0].quantity_system, q(10));

        wf.update_sheet(f.tenant, None, check.id, SheetChanges { is_confirm: Some(true), ..Default::default() })
            .unwrap();
        assert_eq!(
            wf.models().balances.quantity(f.tenant, &StockKey::new(f.warehouse, f.batch)),
            "7.5".parse().unwrap()
        );
    }

    #[test]
    fn confirmation_is_one_way_and_deleted_sheets_stay_unconfirmed() {
        let wf = workflow();
        let f = fixture(&wf);
        let id = import(&wf, &f, 2, true);

        let err = wf
            .update_sheet(f.tenant, None, id, SheetChanges { is_confirm: Some(false), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::InvariantViolation(_))));

        // Confirming again is a no-op.
        wf.update_sheet(f.tenant, None, id, SheetChanges { is_confirm: Some(true), ..Default::default() })
            .unwrap();
        assert_eq!(wf.models().balances.quantity(f.tenant, &StockKey::new(f.warehouse, f.batch)), q(2));

        let draft = import(&wf, &f, 5, false);
        let err = wf
            .update_sheet(
                f.tenant,
                None,
                draft,
                SheetChanges { is_deleted: Some(true), is_confirm: Some(true), ..Default::default() },
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::InvariantViolation(_))));
        assert!(!wf.models().sheets.get(f.tenant, &draft).unwrap().is_deleted);
    }

    #[test]
    fn bulk_confirm_is_all_or_nothing() {
        let wf = workflow();
        let f = fixture(&wf);
        let a = import(&wf, &f, 4, false);
        let export = wf
            .create_sheet(
                f.tenant,
                None,
                NewSheet {
                    kind: SheetKind::Export,
                    reason: "sale".into(),
                    note: None,
                    is_confirm: false,
                    body: NewSheetBody::ImportExport {
                        warehouse_id: f.warehouse,
                        order_key: None,
                        lines: vec![NewSheetLine { batch_id: f.batch, quantity: q(9) }],
                    },
                },
            )
            .unwrap();

        let err = wf
            .bulk_confirm(
                f.tenant,
                None,
                &[
                    BulkConfirmEntry { id: a, is_confirm: true },
                    BulkConfirmEntry { id: export.id, is_confirm: true },
                ],
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::InvariantViolation(_))));
        assert!(!wf.models().sheets.get(f.tenant, &a).unwrap().is_confirmed);

        let err = wf
            .bulk_confirm(f.tenant, None, &[BulkConfirmEntry { id: SheetId::generate(), is_confirm: true }])
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::Validation(m)) if m.starts_with("sheet not found")));

        let b = import(&wf, &f, 6, false);
        let confirmed = wf
            .bulk_confirm(
                f.tenant,
                None,
                &[
                    BulkConfirmEntry { id: a, is_confirm: true },
                    BulkConfirmEntry { id: b, is_confirm: true },
                    BulkConfirmEntry { id: export.id, is_confirm: true },
                ],
            )
            .unwrap();
        assert!(confirmed.iter().all(|s| s.is_confirmed));
        assert_eq!(wf.models().balances.quantity(f.tenant, &StockKey::new(f.warehouse, f.batch)), q(1));

        assert!(wf.bulk_confirm(f.tenant, None, &[]).is_err());
    }

    #[test]
    fn ledger_snapshot_follows_postings_made_behind_it() {
        let wf = workflow();
        let f = fixture(&wf);
        import(&wf, &f, 10, true);
        import(&wf, &f, 5, true);

        let id = ledger_id(f.tenant);
        let cached = wf.ledgers().get(&f.tenant).cloned().unwrap();
        assert_eq!(cached.version(), wf.dispatcher().store().load_stream(f.tenant, id).unwrap().len() as u64);

        wf.dispatcher()
            .dispatch(
                f.tenant,
                id,
                LEDGER_AGGREGATE,
                LedgerCommand::PostSheets(PostSheets {
                    tenant_id: f.tenant,
                    postings: vec![SheetPosting {
                        sheet_id: SheetId::generate(),
                        sheet_code: "EP000099".into(),
                        kind: SheetKind::Export,
                        reason: "manual".into(),
                        movements: vec![MovementLine {
                            warehouse_id: f.warehouse,
                            batch_id: f.batch,
                            variant_id: f.variant,
                            delta: q(-6),
                        }],
                    }],
                    posted_by: None,
                    occurred_at: Utc::now(),
                }),
                |_, id| InventoryLedger::empty(id),
            )
            .unwrap();

        let check = wf
            .create_sheet(
                f.tenant,
                None,
                NewSheet {
                    kind: SheetKind::Check,
                    reason: "stocktake".into(),
                    note: None,
                    is_confirm: false,
                    body: NewSheetBody::Check {
                        warehouse_id: f.warehouse,
                        lines: vec![NewCheckLine { batch_id: f.batch, quantity_actual: q(9) }],
                    },
                },
            )
            .unwrap();
        let SheetBody::Check { lines, .. } = &check.body else {
            panic!("check body expected");
        };
        assert_eq!(lines[0].quantity_system, q(9));
        assert_eq!(wf.ledgers().get(&f.tenant).map(|l| l.version()), Some(3));

        let fresh = wf
            .dispatcher()
            .load(f.tenant, id, LEDGER_AGGREGATE, |_, id| InventoryLedger::empty(id))
            .unwrap();
        assert_eq!(fresh.balance(&StockKey::new(f.warehouse, f.batch)), q(9));
    }
}
