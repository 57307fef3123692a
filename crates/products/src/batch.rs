use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateRoot, DomainError, TenantId, typed_aggregate_id};
use stockledger_events::Event;

use crate::require_text;
use crate::variant::VariantId;

typed_aggregate_id!(
    /// Stock-keeping batch (lot) of a simple variant.
    BatchId
);

/// Aggregate root: Batch. Ledger rows are keyed by `(warehouse, batch)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    id: BatchId,
    tenant_id: Option<TenantId>,
    variant_id: Option<VariantId>,
    name: String,
    expire_date: Option<NaiveDate>,
    version: u64,
    created: bool,
}

impl Batch {
    pub fn empty(id: BatchId) -> Self {
        Self {
            id,
            tenant_id: None,
            variant_id: None,
            name: String::new(),
            expire_date: None,
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

    pub fn variant_id(&self) -> Option<VariantId> {
        self.variant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expire_date(&self) -> Option<NaiveDate> {
        self.expire_date
    }
}

impl AggregateRoot for Batch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBatch {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub variant_id: VariantId,
    pub name: String,
    pub expire_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchCommand {
    RegisterBatch(RegisterBatch),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRegistered {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub variant_id: VariantId,
    pub name: String,
    pub expire_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchEvent {
    BatchRegistered(BatchRegistered),
}

impl Event for BatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BatchEvent::BatchRegistered(_) => "products.batch.registered",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BatchEvent::BatchRegistered(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Batch {
    type Command = BatchCommand;
    type Event = BatchEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BatchEvent::BatchRegistered(e) => {
                self.id = e.batch_id;
                self.tenant_id = Some(e.tenant_id);
                self.variant_id = Some(e.variant_id);
                self.name = e.name.clone();
                self.expire_date = e.expire_date;
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BatchCommand::RegisterBatch(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("batch already registered"));
                }
                require_text("name", &cmd.name)?;

                Ok(vec![BatchEvent::BatchRegistered(BatchRegistered {
                    tenant_id: cmd.tenant_id,
                    batch_id: cmd.batch_id,
                    variant_id: cmd.variant_id,
                    name: cmd.name.trim().to_string(),
                    expire_date: cmd.expire_date,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
