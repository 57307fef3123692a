//! Use cases spanning several aggregates.
//!
//! Every write goes through the [`CommandDispatcher`] and the committed events are then
//! projected into [`ReadModels`] before the call returns. Writes are serialized by one
//! lock so projections observe each stream in sequence order.
//!
//! Sheet confirmation touches three streams in a fixed order: the tenant ledger, the
//! sheet, then the linked order. The ledger skips codes it already posted, so a retry
//! after a failure between those steps completes the remaining ones.
//!
//! Each tenant's ledger is kept in memory as a snapshot; reads and postings only replay
//! the ledger events committed after it.

mod catalog;
mod orders;
mod sheets;
mod warehouses;

pub use catalog::{NewBatch, NewProduct, NewVariant};
pub use orders::{NewOrder, NewOrderLine};
pub use sheets::{BulkConfirmEntry, NewCheckLine, NewSheet, NewSheetBody, NewSheetLine, SheetChanges};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockledger_core::{Aggregate, AggregateId, DomainError, TenantId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_warehouses::{
    CodeSequence, InventoryLedger, IssueCode, LEDGER_AGGREGATE, LedgerCommand, SEQUENCE_AGGREGATE,
    SequenceCommand, SequenceEvent, SequenceType, ledger_id, sequence_id,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::ReadModels;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Dispatch(DispatchError),
}

impl From<DispatchError> for WorkflowError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(e) => WorkflowError::Domain(e),
            other => WorkflowError::Dispatch(other),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

pub struct InventoryWorkflow<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    models: Arc<ReadModels>,
    write_lock: Mutex<()>,
    ledgers: Mutex<HashMap<TenantId, InventoryLedger>>,
}

impl<S, B> InventoryWorkflow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: CommandDispatcher<S, B>, models: Arc<ReadModels>) -> Self {
        Self {
            dispatcher,
            models,
            write_lock: Mutex::new(()),
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    pub fn models(&self) -> &ReadModels {
        &self.models
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    /// Replay the whole store into fresh read models.
    pub fn rebuild_read_models(&self) -> Result<(), String> {
        let _guard = self.lock();
        self.models.rebuild_from_store(self.dispatcher.store())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        match self.write_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Dispatch, then project what was committed.
    fn execute<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> WorkflowResult<Vec<StoredEvent>>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockledger_events::Event + Serialize + DeserializeOwned,
    {
        let committed = self
            .dispatcher
            .dispatch(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)?;
        self.models.project(self.dispatcher.store(), &committed);
        Ok(committed)
    }

    fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> WorkflowResult<A>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        Ok(self
            .dispatcher
            .load(tenant_id, aggregate_id, aggregate_type, make_aggregate)?)
    }

    fn ledgers(&self) -> MutexGuard<'_, HashMap<TenantId, InventoryLedger>> {
        match self.ledgers.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn ledger_snapshot(&self, tenant_id: TenantId) -> InventoryLedger {
        self.ledgers()
            .get(&tenant_id)
            .cloned()
            .unwrap_or_else(|| InventoryLedger::empty(ledger_id(tenant_id)))
    }

    /// The tenant's ledger: the cached snapshot advanced by whatever was committed since.
    fn ledger(&self, tenant_id: TenantId) -> WorkflowResult<InventoryLedger> {
        let snapshot = self.ledger_snapshot(tenant_id);
        let ledger = self
            .dispatcher
            .catch_up(tenant_id, ledger_id(tenant_id), LEDGER_AGGREGATE, snapshot)
            .inspect_err(|_| {
                self.ledgers().remove(&tenant_id);
            })?;
        self.ledgers().insert(tenant_id, ledger.clone());
        Ok(ledger)
    }

    /// Run a ledger command on the cached snapshot, then project what was committed.
    fn execute_on_ledger(&self, tenant_id: TenantId, command: LedgerCommand) -> WorkflowResult<Vec<StoredEvent>> {
        let snapshot = self.ledger_snapshot(tenant_id);
        let (committed, ledger) = self
            .dispatcher
            .dispatch_on(tenant_id, ledger_id(tenant_id), LEDGER_AGGREGATE, command, snapshot)
            .inspect_err(|_| {
                self.ledgers().remove(&tenant_id);
            })?;
        self.ledgers().insert(tenant_id, ledger);
        self.models.project(self.dispatcher.store(), &committed);
        Ok(committed)
    }

    /// Next document code of `sequence_type` (`IP000001`, `OD000001`, ...).
    fn issue_code(&self, tenant_id: TenantId, sequence_type: SequenceType) -> WorkflowResult<String> {
        let committed = self.execute(
            tenant_id,
            sequence_id(tenant_id, sequence_type),
            SEQUENCE_AGGREGATE,
            SequenceCommand::IssueCode(IssueCode {
                tenant_id,
                sequence_type,
                occurred_at: Utc::now(),
            }),
            |_, id| CodeSequence::empty(id),
        )?;

        committed
            .iter()
            .find_map(|stored| match serde_json::from_value(stored.payload.clone()) {
                Ok(SequenceEvent::CodeIssued(e)) => Some(e.code),
                Err(_) => None,
            })
            .ok_or_else(|| WorkflowError::Dispatch(DispatchError::Deserialize("code sequence issued no code".into())))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::Value as JsonValue;

    use stockledger_core::{Quantity, TenantId, UserId};
    use stockledger_events::{EventEnvelope, InMemoryEventBus};
    use stockledger_products::{BatchId, VariantId};
    use stockledger_warehouses::{SheetKind, WarehouseId, WarehouseProfile};

    use super::*;
    use crate::event_store::InMemoryEventStore;

    pub type TestWorkflow = InventoryWorkflow<InMemoryEventStore, InMemoryEventBus<EventEnvelope<JsonValue>>>;

    pub fn workflow() -> TestWorkflow {
        InventoryWorkflow::new(
            CommandDispatcher::new(InMemoryEventStore::new(), InMemoryEventBus::new()),
            Arc::new(ReadModels::in_memory()),
        )
    }

    pub fn q(v: i64) -> Quantity {
        Quantity::from_i64(v).unwrap()
    }

    pub fn profile(name: &str) -> WarehouseProfile {
        WarehouseProfile {
            name: name.into(),
            manager_name: None,
            manager_phone: None,
            note: None,
            is_default: false,
            is_sales: true,
        }
    }

    /// A tenant with one product, one simple variant, one batch of it and one warehouse.
    pub struct Fixture {
        pub tenant: TenantId,
        pub user: UserId,
        pub warehouse: WarehouseId,
        pub variant: VariantId,
        pub batch: BatchId,
    }

    pub fn fixture(wf: &TestWorkflow) -> Fixture {
        let tenant = TenantId::new();
        let product = wf
            .create_product(
                tenant,
                NewProduct {
                    name: "Green tea".into(),
                    sku: "GT".into(),
                    category: None,
                },
            )
            .unwrap();
        let variant = wf
            .create_variant(
                tenant,
                NewVariant {
                    product_id: product,
                    name: "Green tea 500g".into(),
                    sku: "GT-500".into(),
                    components: Vec::new(),
                },
            )
            .unwrap();
        let batch = wf
            .register_batch(
                tenant,
                NewBatch {
                    variant_id: variant,
                    name: "LOT-1".into(),
                    expire_date: None,
                },
            )
            .unwrap();
        let warehouse = wf.create_warehouse(tenant, profile("Main")).unwrap();
        Fixture {
            tenant,
            user: UserId::new(),
            warehouse,
            variant,
            batch,
        }
    }

    pub fn import(wf: &TestWorkflow, f: &Fixture, quantity: i64, is_confirm: bool) -> stockledger_warehouses::SheetId {
        wf.create_sheet(
            f.tenant,
            Some(f.user),
            NewSheet {
                kind: SheetKind::Import,
                reason: "supplier delivery".into(),
                note: None,
                is_confirm,
                body: NewSheetBody::ImportExport {
                    warehouse_id: f.warehouse,
                    order_key: None,
                    lines: vec![NewSheetLine {
                        batch_id: f.batch,
                        quantity: q(quantity),
                    }],
                },
            },
        )
        .unwrap()
        .id
    }
}
