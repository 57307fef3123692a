//! Warehouse sheets: the documents that move stock once confirmed.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateRoot, DomainError, Quantity, TenantId, UserId, typed_aggregate_id,
};
use stockledger_events::Event;
use stockledger_products::{BatchId, VariantId};

use crate::kind::{ChangeReason, SheetKind};
use crate::ledger::{MovementLine, SheetPosting};
use crate::warehouse::WarehouseId;

typed_aggregate_id!(
    /// Sheet identifier.
    SheetId
);

/// A batch and a positive quantity (import/export/transfer lines).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLine {
    pub batch_id: BatchId,
    pub variant_id: VariantId,
    pub quantity: Quantity,
}

/// Stock count line: the system quantity captured when the sheet was drafted and the
/// counted quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckLine {
    pub batch_id: BatchId,
    pub variant_id: VariantId,
    pub quantity_system: Quantity,
    pub quantity_actual: Quantity,
}

impl CheckLine {
    pub fn delta(&self) -> Result<Quantity, DomainError> {
        self.quantity_actual.checked_sub(self.quantity_system)
    }
}

/// Kind-specific content of a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SheetBody {
    ImportExport {
        warehouse_id: WarehouseId,
        order_key: Option<String>,
        lines: Vec<SheetLine>,
    },
    Transfer {
        from_warehouse_id: WarehouseId,
        to_warehouse_id: WarehouseId,
        lines: Vec<SheetLine>,
    },
    Check {
        warehouse_id: WarehouseId,
        lines: Vec<CheckLine>,
    },
}

impl SheetBody {
    fn fits(&self, kind: SheetKind) -> bool {
        matches!(
            (self, kind),
            (SheetBody::ImportExport { .. }, SheetKind::Import | SheetKind::Export)
                | (SheetBody::Transfer { .. }, SheetKind::Transfer)
                | (SheetBody::Check { .. }, SheetKind::Check)
        )
    }

    /// Every warehouse the sheet touches.
    pub fn warehouse_ids(&self) -> Vec<WarehouseId> {
        match self {
            SheetBody::ImportExport { warehouse_id, .. } | SheetBody::Check { warehouse_id, .. } => {
                vec![*warehouse_id]
            }
            SheetBody::Transfer {
                from_warehouse_id,
                to_warehouse_id,
                ..
            } => vec![*from_warehouse_id, *to_warehouse_id],
        }
    }

    pub fn batch_ids(&self) -> Vec<BatchId> {
        match self {
            SheetBody::ImportExport { lines, .. } | SheetBody::Transfer { lines, .. } => {
                lines.iter().map(|l| l.batch_id).collect()
            }
            SheetBody::Check { lines, .. } => lines.iter().map(|l| l.batch_id).collect(),
        }
    }

    pub fn order_key(&self) -> Option<&str> {
        match self {
            SheetBody::ImportExport { order_key, .. } => order_key.as_deref(),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        let batches = self.batch_ids();
        if batches.is_empty() {
            return Err(DomainError::validation("sheet must have at least one line"));
        }
        let mut seen = HashSet::new();
        if !batches.iter().all(|b| seen.insert(*b)) {
            return Err(DomainError::validation("a batch may appear only once per sheet"));
        }

        let one = Quantity::from_i64(1)?;
        match self {
            SheetBody::ImportExport { lines, order_key, .. } => {
                if order_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                    return Err(DomainError::validation("order key cannot be blank"));
                }
                if lines.iter().any(|l| l.quantity < one) {
                    return Err(DomainError::validation("line quantity must be at least 1"));
                }
            }
            SheetBody::Transfer {
                from_warehouse_id,
                to_warehouse_id,
                lines,
            } => {
                if from_warehouse_id == to_warehouse_id {
                    return Err(DomainError::validation(
                        "transfer source and destination must differ",
                    ));
                }
                if lines.iter().any(|l| l.quantity < one) {
                    return Err(DomainError::validation("line quantity must be at least 1"));
                }
            }
            SheetBody::Check { lines, .. } => {
                if lines
                    .iter()
                    .any(|l| l.quantity_actual.is_negative() || l.quantity_system.is_negative())
                {
                    return Err(DomainError::validation("counted quantities cannot be negative"));
                }
            }
        }
        Ok(())
    }
}

/// Aggregate root: Sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    id: SheetId,
    tenant_id: Option<TenantId>,
    kind: SheetKind,
    code: String,
    reason: Option<ChangeReason>,
    note: Option<String>,
    body: Option<SheetBody>,
    is_deleted: bool,
    is_confirmed: bool,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    confirmed_by: Option<UserId>,
    confirmed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Sheet {
    pub fn empty(id: SheetId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: SheetKind::Import,
            code: String::new(),
            reason: None,
            note: None,
            body: None,
            is_deleted: false,
            is_confirmed: false,
            created_by: None,
            created_at: None,
            confirmed_by: None,
            confirmed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kind(&self) -> SheetKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn reason(&self) -> Option<&ChangeReason> {
        self.reason.as_ref()
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn body(&self) -> Option<&SheetBody> {
        self.body.as_ref()
    }

    pub fn order_key(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.order_key())
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn is_confirmed(&self) -> bool {
        self.is_confirmed
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn confirmed_by(&self) -> Option<UserId> {
        self.confirmed_by
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    /// Signed ledger movements this sheet produces on confirmation.
    ///
    /// Import adds, export subtracts, transfer subtracts at the source and adds at the
    /// destination, check applies `actual - system` (rows without a difference are skipped).
    pub fn movements(&self) -> Result<Vec<MovementLine>, DomainError> {
        let body = self.body.as_ref().ok_or_else(DomainError::not_found)?;

        let lines = match body {
            SheetBody::ImportExport {
                warehouse_id, lines, ..
            } => {
                let export = self.kind == SheetKind::Export;
                lines
                    .iter()
                    .map(|l| MovementLine {
                        warehouse_id: *warehouse_id,
                        batch_id: l.batch_id,
                        variant_id: l.variant_id,
                        delta: if export { -l.quantity } else { l.quantity },
                    })
                    .collect()
            }
            SheetBody::Transfer {
                from_warehouse_id,
                to_warehouse_id,
                lines,
            } => lines
                .iter()
                .flat_map(|l| {
                    [
                        MovementLine {
                            warehouse_id: *from_warehouse_id,
                            batch_id: l.batch_id,
                            variant_id: l.variant_id,
                            delta: -l.quantity,
                        },
                        MovementLine {
                            warehouse_id: *to_warehouse_id,
                            batch_id: l.batch_id,
                            variant_id: l.variant_id,
                            delta: l.quantity,
                        },
                    ]
                })
                .collect(),
            SheetBody::Check { warehouse_id, lines } => {
                let mut out = Vec::new();
                for l in lines {
                    let delta = l.delta()?;
                    if !delta.is_zero() {
                        out.push(MovementLine {
                            warehouse_id: *warehouse_id,
                            batch_id: l.batch_id,
                            variant_id: l.variant_id,
                            delta,
                        });
                    }
                }
                out
            }
        };

        Ok(lines)
    }

    /// Ledger posting for this sheet.
    pub fn posting(&self) -> Result<SheetPosting, DomainError> {
        Ok(SheetPosting {
            sheet_id: self.id,
            sheet_code: self.code.clone(),
            kind: self.kind,
            reason: self.reason.as_ref().map(|r| r.name.clone()).unwrap_or_default(),
            movements: self.movements()?,
        })
    }
}

impl AggregateRoot for Sheet {
    type Id = SheetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSheet {
    pub tenant_id: TenantId,
    pub sheet_id: SheetId,
    pub kind: SheetKind,
    pub code: String,
    pub reason: ChangeReason,
    pub note: Option<String>,
    pub body: SheetBody,
    pub created_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Edits of a draft or confirmed sheet; `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSheet {
    pub tenant_id: TenantId,
    pub sheet_id: SheetId,
    pub note: Option<String>,
    pub reason: Option<ChangeReason>,
    pub is_deleted: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

/// Requested confirmation state. Confirmation is one-way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetConfirmation {
    pub tenant_id: TenantId,
    pub sheet_id: SheetId,
    pub is_confirmed: bool,
    pub confirmed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetCommand {
    CreateSheet(CreateSheet),
    UpdateSheet(UpdateSheet),
    SetConfirmation(SetConfirmation),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetCreated {
    pub tenant_id: TenantId,
    pub sheet_id: SheetId,
    pub kind: SheetKind,
    pub code: String,
    pub reason: ChangeReason,
    pub note: Option<String>,
    pub body: SheetBody,
    pub created_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Full editable state after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetUpdated {
    pub tenant_id: TenantId,
    pub sheet_id: SheetId,
    pub note: Option<String>,
    pub reason: ChangeReason,
    pub is_deleted: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetConfirmed {
    pub tenant_id: TenantId,
    pub sheet_id: SheetId,
    pub kind: SheetKind,
    pub code: String,
    pub confirmed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetEvent {
    SheetCreated(SheetCreated),
    SheetUpdated(SheetUpdated),
    SheetConfirmed(SheetConfirmed),
}

impl SheetEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            SheetEvent::SheetCreated(e) => e.tenant_id,
            SheetEvent::SheetUpdated(e) => e.tenant_id,
            SheetEvent::SheetConfirmed(e) => e.tenant_id,
        }
    }

    pub fn sheet_id(&self) -> SheetId {
        match self {
            SheetEvent::SheetCreated(e) => e.sheet_id,
            SheetEvent::SheetUpdated(e) => e.sheet_id,
            SheetEvent::SheetConfirmed(e) => e.sheet_id,
        }
    }
}

impl Event for SheetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SheetEvent::SheetCreated(_) => "warehouses.sheet.created",
            SheetEvent::SheetUpdated(_) => "warehouses.sheet.updated",
            SheetEvent::SheetConfirmed(_) => "warehouses.sheet.confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SheetEvent::SheetCreated(e) => e.occurred_at,
            SheetEvent::SheetUpdated(e) => e.occurred_at,
            SheetEvent::SheetConfirmed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sheet {
    type Command = SheetCommand;
    type Event = SheetEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SheetEvent::SheetCreated(e) => {
                self.id = e.sheet_id;
                self.tenant_id = Some(e.tenant_id);
                self.kind = e.kind;
                self.code = e.code.clone();
                self.reason = Some(e.reason.clone());
                self.note = e.note.clone();
                self.body = Some(e.body.clone());
                self.created_by = e.created_by;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            SheetEvent::SheetUpdated(e) => {
                self.note = e.note.clone();
                self.reason = Some(e.reason.clone());
                self.is_deleted = e.is_deleted;
            }
            SheetEvent::SheetConfirmed(e) => {
                self.is_confirmed = true;
                self.confirmed_by = e.confirmed_by;
                self.confirmed_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SheetCommand::CreateSheet(cmd) => self.handle_create(cmd),
            SheetCommand::UpdateSheet(cmd) => self.handle_update(cmd),
            SheetCommand::SetConfirmation(cmd) => self.handle_confirmation(cmd),
        }
    }
}

impl Sheet {
    fn ensure_existing(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateSheet) -> Result<Vec<SheetEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sheet already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("sheet code cannot be empty"));
        }
        if !cmd.body.fits(cmd.kind) {
            return Err(DomainError::validation(format!(
                "sheet content does not match kind {}",
                cmd.kind
            )));
        }
        if cmd.reason.kind != cmd.kind {
            return Err(DomainError::validation(format!(
                "change reason belongs to {} sheets",
                cmd.reason.kind
            )));
        }
        cmd.body.validate()?;

        Ok(vec![SheetEvent::SheetCreated(SheetCreated {
            tenant_id: cmd.tenant_id,
            sheet_id: cmd.sheet_id,
            kind: cmd.kind,
            code: cmd.code.clone(),
            reason: cmd.reason.clone(),
            note: cmd.note.clone(),
            body: cmd.body.clone(),
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateSheet) -> Result<Vec<SheetEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id)?;

        let current_reason = self.reason.clone().ok_or_else(DomainError::not_found)?;
        let reason = cmd.reason.clone().unwrap_or(current_reason);
        if reason.kind != self.kind {
            return Err(DomainError::validation(format!(
                "change reason belongs to {} sheets",
                reason.kind
            )));
        }
        let note = cmd.note.clone().or_else(|| self.note.clone());
        let is_deleted = cmd.is_deleted.unwrap_or(self.is_deleted);

        if Some(&reason) == self.reason.as_ref() && note == self.note && is_deleted == self.is_deleted {
            return Ok(vec![]);
        }

        Ok(vec![SheetEvent::SheetUpdated(SheetUpdated {
            tenant_id: cmd.tenant_id,
            sheet_id: cmd.sheet_id,
            note,
            reason,
            is_deleted,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirmation(&self, cmd: &SetConfirmation) -> Result<Vec<SheetEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id)?;

        match (self.is_confirmed, cmd.is_confirmed) {
            (true, false) => Err(DomainError::invariant(
                "cannot change confirmation True→False",
            )),
            (true, true) | (false, false) => Ok(vec![]),
            (false, true) => {
                if self.is_deleted {
                    return Err(DomainError::invariant("deleted sheet cannot be confirmed"));
                }
                Ok(vec![SheetEvent::SheetConfirmed(SheetConfirmed {
                    tenant_id: cmd.tenant_id,
                    sheet_id: cmd.sheet_id,
                    kind: self.kind,
                    code: self.code.clone(),
                    confirmed_by: cmd.confirmed_by,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(v: &str) -> Quantity {
        v.parse().unwrap()
    }

    fn line(quantity: &str) -> SheetLine {
        SheetLine {
            batch_id: BatchId::generate(),
            variant_id: VariantId::generate(),
            quantity: q(quantity),
        }
    }

    fn create(kind: SheetKind, body: SheetBody) -> CreateSheet {
        CreateSheet {
            tenant_id: TenantId::new(),
            sheet_id: SheetId::generate(),
            kind,
            code: format!("{}000001", kind.code()),
            reason: ChangeReason::new(kind, "routine").unwrap(),
            note: None,
            body,
            created_by: Some(UserId::new()),
            occurred_at: Utc::now(),
        }
    }

    fn build(cmd: &CreateSheet) -> Sheet {
        let mut sheet = Sheet::empty(cmd.sheet_id);
        for e in sheet.handle(&SheetCommand::CreateSheet(cmd.clone())).unwrap() {
            sheet.apply(&e);
        }
        sheet
    }

    fn confirm(sheet: &Sheet, tenant_id: TenantId, value: bool) -> Result<Vec<SheetEvent>, DomainError> {
        sheet.handle(&SheetCommand::SetConfirmation(SetConfirmation {
            tenant_id,
            sheet_id: *sheet.id(),
            is_confirmed: value,
            confirmed_by: None,
            occurred_at: Utc::now(),
        }))
    }

    #[test]
    fn export_lines_become_negative_movements() {
        let warehouse_id = WarehouseId::generate();
        let cmd = create(
            SheetKind::Export,
            SheetBody::ImportExport {
                warehouse_id,
                order_key: None,
                lines: vec![line("3"), line("1.5")],
            },
        );
        let sheet = build(&cmd);

        let deltas: Vec<_> = sheet.movements().unwrap().into_iter().map(|m| m.delta).collect();
        assert_eq!(deltas, vec![q("-3"), q("-1.5")]);
    }

    #[test]
    fn transfer_moves_from_source_to_destination() {
        let from = WarehouseId::generate();
        let to = WarehouseId::generate();
        let cmd = create(
            SheetKind::Transfer,
            SheetBody::Transfer {
                from_warehouse_id: from,
                to_warehouse_id: to,
                lines: vec![line("4")],
            },
        );

        let movements = build(&cmd).movements().unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!((movements[0].warehouse_id, movements[0].delta), (from, q("-4")));
        assert_eq!((movements[1].warehouse_id, movements[1].delta), (to, q("4")));
    }

    #[test]
    fn transfer_to_the_same_warehouse_is_rejected() {
        let w = WarehouseId::generate();
        let cmd = create(
            SheetKind::Transfer,
            SheetBody::Transfer {
                from_warehouse_id: w,
                to_warehouse_id: w,
                lines: vec![line("1")],
            },
        );
        assert!(matches!(
            Sheet::empty(cmd.sheet_id).handle(&SheetCommand::CreateSheet(cmd)),
            Err(DomainError::Validation(msg)) if msg.contains("differ")
        ));
    }

    #[test]
    fn check_applies_exact_differences_and_skips_matches() {
        let batch_a = BatchId::generate();
        let batch_b = BatchId::generate();
        let cmd = create(
            SheetKind::Check,
            SheetBody::Check {
                warehouse_id: WarehouseId::generate(),
                lines: vec![
                    CheckLine {
                        batch_id: batch_a,
                        variant_id: VariantId::generate(),
                        quantity_system: q("10"),
                        quantity_actual: q("7.25"),
                    },
                    CheckLine {
                        batch_id: batch_b,
                        variant_id: VariantId::generate(),
                        quantity_system: q("5"),
                        quantity_actual: q("5"),
                    },
                ],
            },
        );

        let movements = build(&cmd).movements().unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].batch_id, batch_a);
        assert_eq!(movements[0].delta, q("-2.75"));
    }

    #[test]
    fn line_validation() {
        let warehouse_id = WarehouseId::generate();
        let empty = create(
            SheetKind::Import,
            SheetBody::ImportExport {
                warehouse_id,
                order_key: None,
                lines: vec![],
            },
        );
        assert!(Sheet::empty(empty.sheet_id).handle(&SheetCommand::CreateSheet(empty)).is_err());

        let small = create(
            SheetKind::Import,
            SheetBody::ImportExport {
                warehouse_id,
                order_key: None,
                lines: vec![line("0.5")],
            },
        );
        assert!(Sheet::empty(small.sheet_id).handle(&SheetCommand::CreateSheet(small)).is_err());

        let dup = line("1");
        let twice = create(
            SheetKind::Import,
            SheetBody::ImportExport {
                warehouse_id,
                order_key: None,
                lines: vec![dup.clone(), dup],
            },
        );
        assert!(matches!(
            Sheet::empty(twice.sheet_id).handle(&SheetCommand::CreateSheet(twice)),
            Err(DomainError::Validation(msg)) if msg.contains("once")
        ));
    }

    #[test]
    fn body_and_reason_must_match_kind() {
        let mut cmd = create(
            SheetKind::Check,
            SheetBody::ImportExport {
                warehouse_id: WarehouseId::generate(),
                order_key: None,
                lines: vec![line("1")],
            },
        );
        assert!(Sheet::empty(cmd.sheet_id).handle(&SheetCommand::CreateSheet(cmd.clone())).is_err());

        cmd.kind = SheetKind::Import;
        cmd.reason = ChangeReason::new(SheetKind::Export, "sale").unwrap();
        assert!(matches!(
            Sheet::empty(cmd.sheet_id).handle(&SheetCommand::CreateSheet(cmd)),
            Err(DomainError::Validation(msg)) if msg.contains("reason")
        ));
    }

    #[test]
    fn confirmation_is_one_way() {
        let cmd = create(
            SheetKind::Import,
            SheetBody::ImportExport {
                warehouse_id: WarehouseId::generate(),
                order_key: None,
                lines: vec![line("2")],
            },
        );
        let mut sheet = build(&cmd);

        assert!(confirm(&sheet, cmd.tenant_id, false).unwrap().is_empty());

        for e in confirm(&sheet, cmd.tenant_id, true).unwrap() {
            sheet.apply(&e);
        }
        assert!(sheet.is_confirmed());
        assert!(sheet.confirmed_at().is_some());

        assert!(confirm(&sheet, cmd.tenant_id, true).unwrap().is_empty());
        assert!(matches!(
            confirm(&sheet, cmd.tenant_id, false),
            Err(DomainError::InvariantViolation(msg)) if msg.contains("True→False")
        ));
    }

    #[test]
    fn deleted_sheet_cannot_be_confirmed() {
        let cmd = create(
            SheetKind::Import,
            SheetBody::ImportExport {
                warehouse_id: WarehouseId::generate(),
                order_key: None,
                lines: vec![line("2")],
            },
        );
        let mut sheet = build(&cmd);
        let events = sheet
            .handle(&SheetCommand::UpdateSheet(UpdateSheet {
                tenant_id: cmd.tenant_id,
                sheet_id: cmd.sheet_id,
                note: Some("duplicate".to_string()),
                reason: None,
                is_deleted: Some(true),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            sheet.apply(e);
        }

        assert!(sheet.is_deleted());
        assert_eq!(sheet.note(), Some("duplicate"));
        assert!(confirm(&sheet, cmd.tenant_id, true).is_err());
    }

    #[test]
    fn other_tenants_cannot_touch_a_sheet() {
        let cmd = create(
            SheetKind::Import,
            SheetBody::ImportExport {
                warehouse_id: WarehouseId::generate(),
                order_key: None,
                lines: vec![line("2")],
            },
        );
        let sheet = build(&cmd);
        assert!(matches!(
            confirm(&sheet, TenantId::new(), true),
            Err(DomainError::InvariantViolation(msg)) if msg.contains("tenant")
        ));
    }

    #[test]
    fn posting_carries_code_and_reason() {
        let cmd = create(
            SheetKind::Import,
            SheetBody::ImportExport {
                warehouse_id: WarehouseId::generate(),
                order_key: Some("OD000001".to_string()),
                lines: vec![line("2")],
            },
        );
        let sheet = build(&cmd);
        let posting = sheet.posting().unwrap();

        assert_eq!(posting.sheet_code, "IP000001");
        assert_eq!(posting.reason, "routine");
        assert_eq!(sheet.order_key(), Some("OD000001"));
    }
}
