use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateRoot, DomainError, TenantId, typed_aggregate_id};
use stockledger_events::Event;

typed_aggregate_id!(
    /// Warehouse identifier.
    WarehouseId
);

/// Editable warehouse attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WarehouseProfile {
    pub name: String,
    pub manager_name: Option<String>,
    pub manager_phone: Option<String>,
    pub note: Option<String>,
    /// Default warehouse for new documents.
    pub is_default: bool,
    /// Stock here is sellable.
    pub is_sales: bool,
}

impl WarehouseProfile {
    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("warehouse name cannot be empty"));
        }
        if self.name.chars().count() > 255 {
            return Err(DomainError::validation("warehouse name longer than 255 characters"));
        }
        if let Some(phone) = &self.manager_phone {
            let ok = !phone.is_empty()
                && phone.len() <= 20
                && phone.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-'));
            if !ok {
                return Err(DomainError::validation("invalid manager phone number"));
            }
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WarehouseChanges {
    pub name: Option<String>,
    pub manager_name: Option<String>,
    pub manager_phone: Option<String>,
    pub note: Option<String>,
    pub is_default: Option<bool>,
    pub is_sales: Option<bool>,
}

/// Aggregate root: Warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warehouse {
    id: WarehouseId,
    tenant_id: Option<TenantId>,
    profile: WarehouseProfile,
    version: u64,
    created: bool,
}

impl Warehouse {
    pub fn empty(id: WarehouseId) -> Self {
        Self {
            id,
            tenant_id: None,
            profile: WarehouseProfile::default(),
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

    pub fn profile(&self) -> &WarehouseProfile {
        &self.profile
    }
}

impl AggregateRoot for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWarehouse {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub profile: WarehouseProfile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWarehouse {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub changes: WarehouseChanges,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseCommand {
    CreateWarehouse(CreateWarehouse),
    UpdateWarehouse(UpdateWarehouse),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseCreated {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub profile: WarehouseProfile,
    pub occurred_at: DateTime<Utc>,
}

/// Carries the full profile after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseUpdated {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub profile: WarehouseProfile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseEvent {
    WarehouseCreated(WarehouseCreated),
    WarehouseUpdated(WarehouseUpdated),
}

impl WarehouseEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            WarehouseEvent::WarehouseCreated(e) => e.tenant_id,
            WarehouseEvent::WarehouseUpdated(e) => e.tenant_id,
        }
    }
}

impl Event for WarehouseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WarehouseEvent::WarehouseCreated(_) => "warehouses.warehouse.created",
            WarehouseEvent::WarehouseUpdated(_) => "warehouses.warehouse.updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WarehouseEvent::WarehouseCreated(e) => e.occurred_at,
            WarehouseEvent::WarehouseUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Warehouse {
    type Command = WarehouseCommand;
    type Event = WarehouseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WarehouseEvent::WarehouseCreated(e) => {
                self.id = e.warehouse_id;
                self.tenant_id = Some(e.tenant_id);
                self.profile = e.profile.clone();
                self.created = true;
            }
            WarehouseEvent::WarehouseUpdated(e) => {
                self.profile = e.profile.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WarehouseCommand::CreateWarehouse(cmd) => self.handle_create(cmd),
            WarehouseCommand::UpdateWarehouse(cmd) => self.handle_update(cmd),
        }
    }
}

impl Warehouse {
    fn handle_create(&self, cmd: &CreateWarehouse) -> Result<Vec<WarehouseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("warehouse already exists"));
        }
        cmd.profile.validate()?;

        Ok(vec![WarehouseEvent::WarehouseCreated(WarehouseCreated {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            profile: cmd.profile.clone().normalized(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateWarehouse) -> Result<Vec<WarehouseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }

        let c = &cmd.changes;
        let mut next = self.profile.clone();
        if let Some(name) = &c.name {
            next.name = name.clone();
        }
        if let Some(v) = &c.manager_name {
            next.manager_name = Some(v.clone());
        }
        if let Some(v) = &c.manager_phone {
            next.manager_phone = Some(v.clone());
        }
        if let Some(v) = &c.note {
            next.note = Some(v.clone());
        }
        if let Some(v) = c.is_default {
            next.is_default = v;
        }
        if let Some(v) = c.is_sales {
            next.is_sales = v;
        }
        next.validate()?;
        let next = next.normalized();

        if next == self.profile {
            return Ok(vec![]);
        }

        Ok(vec![WarehouseEvent::WarehouseUpdated(WarehouseUpdated {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            profile: next,
            occurred_at: cmd.occurred_at,
        })])
    }
}
