//! Warehouse inventory domain (event-sourced).
//!
//! - [`warehouse`]: warehouse master data.
//! - [`sheet`]: import/export, transfer and check documents with a draft → confirmed lifecycle.
//! - [`ledger`]: the per-tenant quantity ledger; the only place stock balances change.
//! - [`sequence`]: human-readable document codes (`IP000001`).
//!
//! No IO here; orchestration across aggregates lives in `stockledger-infra`.

pub mod kind;
pub mod ledger;
pub mod sequence;
pub mod sheet;
pub mod warehouse;

pub use kind::{ChangeReason, SequenceType, SheetKind};
pub use ledger::{
    InventoryLedger, LedgerCommand, LedgerEvent, MovementLine, MovementsPosted, PostSheets,
    PostedMovement, PostedSheet, SheetPosting, StockKey, ledger_id,
};
pub use sequence::{CodeIssued, CodeSequence, IssueCode, SequenceCommand, SequenceEvent, format_code, sequence_id};
pub use sheet::{
    CheckLine, CreateSheet, SetConfirmation, Sheet, SheetBody, SheetCommand, SheetConfirmed,
    SheetCreated, SheetEvent, SheetId, SheetLine, SheetUpdated, UpdateSheet,
};
pub use warehouse::{
    CreateWarehouse, UpdateWarehouse, Warehouse, WarehouseChanges, WarehouseCommand,
    WarehouseCreated, WarehouseEvent, WarehouseId, WarehouseProfile, WarehouseUpdated,
};

pub const WAREHOUSE_AGGREGATE: &str = "warehouses.warehouse";
pub const SHEET_AGGREGATE: &str = "warehouses.sheet";
pub const LEDGER_AGGREGATE: &str = "warehouses.ledger";
pub const SEQUENCE_AGGREGATE: &str = "warehouses.sequence";
