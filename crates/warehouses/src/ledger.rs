//! Inventory ledger: per-(warehouse, batch) balances mutated only by posting movements.
//!
//! One ledger stream per tenant. A single `PostSheets` command may carry several
//! sheets; it produces one `MovementsPosted` event or nothing at all, so a batch of
//! confirmations either lands completely or leaves no trace.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Quantity, TenantId, UserId};
use stockledger_events::Event;
use stockledger_products::{BatchId, VariantId};

use crate::kind::SheetKind;
use crate::sheet::SheetId;
use crate::warehouse::WarehouseId;

/// Stream id of a tenant's ledger.
pub fn ledger_id(tenant_id: TenantId) -> AggregateId {
    AggregateId::derived(tenant_id, "warehouses.ledger")
}

/// Ledger row key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub warehouse_id: WarehouseId,
    pub batch_id: BatchId,
}

impl StockKey {
    pub fn new(warehouse_id: WarehouseId, batch_id: BatchId) -> Self {
        Self {
            warehouse_id,
            batch_id,
        }
    }
}

/// A requested signed change of one ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementLine {
    pub warehouse_id: WarehouseId,
    pub batch_id: BatchId,
    pub variant_id: VariantId,
    pub delta: Quantity,
}

impl MovementLine {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.warehouse_id, self.batch_id)
    }
}

/// Movements of one confirmed sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetPosting {
    pub sheet_id: SheetId,
    pub sheet_code: String,
    pub kind: SheetKind,
    pub reason: String,
    pub movements: Vec<MovementLine>,
}

/// Aggregate root: InventoryLedger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLedger {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    balances: BTreeMap<StockKey, Quantity>,
    posted_codes: HashSet<String>,
    version: u64,
}

impl InventoryLedger {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            balances: BTreeMap::new(),
            posted_codes: HashSet::new(),
            version: 0,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Current quantity of a row; zero when the row does not exist.
    pub fn balance(&self, key: &StockKey) -> Quantity {
        self.balances.get(key).copied().unwrap_or(Quantity::ZERO)
    }

    /// Whether the row was ever created (a row stays after reaching zero).
    pub fn has_row(&self, key: &StockKey) -> bool {
        self.balances.contains_key(key)
    }

    pub fn is_posted(&self, sheet_code: &str) -> bool {
        self.posted_codes.contains(sheet_code)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&StockKey, &Quantity)> {
        self.balances.iter()
    }
}

impl AggregateRoot for InventoryLedger {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSheets {
    pub tenant_id: TenantId,
    pub postings: Vec<SheetPosting>,
    pub posted_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    PostSheets(PostSheets),
}

/// One applied movement and the row balance right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMovement {
    pub warehouse_id: WarehouseId,
    pub batch_id: BatchId,
    pub variant_id: VariantId,
    pub delta: Quantity,
    pub balance_after: Quantity,
}

impl PostedMovement {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.warehouse_id, self.batch_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedSheet {
    pub sheet_id: SheetId,
    pub sheet_code: String,
    pub kind: SheetKind,
    pub reason: String,
    pub movements: Vec<PostedMovement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementsPosted {
    pub tenant_id: TenantId,
    pub ledger_id: AggregateId,
    pub sheets: Vec<PostedSheet>,
    pub posted_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    MovementsPosted(MovementsPosted),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::MovementsPosted(_) => "warehouses.ledger.movements_posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::MovementsPosted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryLedger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::MovementsPosted(e) => {
                self.tenant_id.get_or_insert(e.tenant_id);
                for sheet in &e.sheets {
                    self.posted_codes.insert(sheet.sheet_code.clone());
                    for m in &sheet.movements {
                        self.balances.insert(m.key(), m.balance_after);
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::PostSheets(cmd) => self.handle_post(cmd),
        }
    }
}

impl InventoryLedger {
    fn handle_post(&self, cmd: &PostSheets) -> Result<Vec<LedgerEvent>, DomainError> {
        if let Some(t) = self.tenant_id {
            if t != cmd.tenant_id {
                return Err(DomainError::invariant("tenant mismatch"));
            }
        }

        let mut seen_codes = HashSet::new();
        for posting in &cmd.postings {
            if posting.sheet_code.trim().is_empty() {
                return Err(DomainError::validation("sheet code cannot be empty"));
            }
            if !seen_codes.insert(posting.sheet_code.as_str()) {
                return Err(DomainError::validation(format!(
                    "sheet {} posted twice in one command",
                    posting.sheet_code
                )));
            }
        }

        // Rows touched by this command, on top of the committed balances.
        let mut working: HashMap<StockKey, Quantity> = HashMap::new();
        let mut sheets = Vec::new();

        for posting in cmd.postings.iter().filter(|p| !self.is_posted(&p.sheet_code)) {
            let mut movements = Vec::with_capacity(posting.movements.len());

            for line in &posting.movements {
                if line.delta.is_zero() {
                    return Err(DomainError::validation("movement delta cannot be zero"));
                }

                let key = line.key();
                let current = working
                    .get(&key)
                    .copied()
                    .unwrap_or_else(|| self.balance(&key));
                let next = current.checked_add(line.delta)?;

                if next.is_negative() {
                    return Err(DomainError::invariant(format!(
                        "insufficient stock for batch {} in warehouse {} (available {}, requested {})",
                        line.batch_id,
                        line.warehouse_id,
                        current,
                        line.delta.abs()
                    )));
                }

                working.insert(key, next);
                movements.push(PostedMovement {
                    warehouse_id: line.warehouse_id,
                    batch_id: line.batch_id,
                    variant_id: line.variant_id,
                    delta: line.delta,
                    balance_after: next,
                });
            }

            sheets.push(PostedSheet {
                sheet_id: posting.sheet_id,
                sheet_code: posting.sheet_code.clone(),
                kind: posting.kind,
                reason: posting.reason.clone(),
                movements,
            });
        }

        if sheets.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![LedgerEvent::MovementsPosted(MovementsPosted {
            tenant_id: cmd.tenant_id,
            ledger_id: self.id,
            sheets,
            posted_by: cmd.posted_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
