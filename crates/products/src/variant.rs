use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateRoot, DomainError, Quantity, TenantId, typed_aggregate_id};
use stockledger_events::Event;

use crate::product::ProductId;
use crate::require_text;

typed_aggregate_id!(
    /// Sellable product variant identifier.
    VariantId
);

/// One component of a combo variant: `quantity` units of `variant_id` per combo unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboComponent {
    pub variant_id: VariantId,
    pub quantity: Quantity,
}

/// Simple variants are stocked in batches; combos are bundles of simple variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariantKind {
    #[default]
    Simple,
    Combo { components: Vec<ComboComponent> },
}

impl VariantKind {
    pub fn is_combo(&self) -> bool {
        matches!(self, VariantKind::Combo { .. })
    }

    pub fn components(&self) -> &[ComboComponent] {
        match self {
            VariantKind::Simple => &[],
            VariantKind::Combo { components } => components,
        }
    }
}

/// Aggregate root: Variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    id: VariantId,
    tenant_id: Option<TenantId>,
    product_id: Option<ProductId>,
    name: String,
    sku: String,
    kind: VariantKind,
    version: u64,
    created: bool,
}

impl Variant {
    pub fn empty(id: VariantId) -> Self {
        Self {
            id,
            tenant_id: None,
            product_id: None,
            name: String::new(),
            sku: String::new(),
            kind: VariantKind::Simple,
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

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn kind(&self) -> &VariantKind {
        &self.kind
    }
}

impl AggregateRoot for Variant {
    type Id = VariantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVariant {
    pub tenant_id: TenantId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub kind: VariantKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantCommand {
    CreateVariant(CreateVariant),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCreated {
    pub tenant_id: TenantId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub kind: VariantKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantEvent {
    VariantCreated(VariantCreated),
}

impl Event for VariantEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VariantEvent::VariantCreated(_) => "products.variant.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VariantEvent::VariantCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Variant {
    type Command = VariantCommand;
    type Event = VariantEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VariantEvent::VariantCreated(e) => {
                self.id = e.variant_id;
                self.tenant_id = Some(e.tenant_id);
                self.product_id = Some(e.product_id);
                self.name = e.name.clone();
                self.sku = e.sku.clone();
                self.kind = e.kind.clone();
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VariantCommand::CreateVariant(cmd) => self.handle_create(cmd),
        }
    }
}

impl Variant {
    fn handle_create(&self, cmd: &CreateVariant) -> Result<Vec<VariantEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("variant already exists"));
        }
        require_text("name", &cmd.name)?;
        require_text("sku", &cmd.sku)?;

        if let VariantKind::Combo { components } = &cmd.kind {
            if components.is_empty() {
                return Err(DomainError::validation("combo must have at least one component"));
            }
            for c in components {
                if c.variant_id == cmd.variant_id {
                    return Err(DomainError::validation("combo cannot contain itself"));
                }
                if !c.quantity.is_positive() {
                    return Err(DomainError::validation("combo component quantity must be positive"));
                }
            }
        }

        Ok(vec![VariantEvent::VariantCreated(VariantCreated {
            tenant_id: cmd.tenant_id,
            variant_id: cmd.variant_id,
            product_id: cmd.product_id,
            name: cmd.name.trim().to_string(),
            sku: cmd.sku.trim().to_string(),
            kind: cmd.kind.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(kind: VariantKind) -> CreateVariant {
        CreateVariant {
            tenant_id: TenantId::new(),
            variant_id: VariantId::generate(),
            product_id: ProductId::generate(),
            name: "Green Tea 500ml".to_string(),
            sku: "TEA-01-500".to_string(),
            kind,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn simple_variant_is_created() {
        let c = cmd(VariantKind::Simple);
        let mut variant = Variant::empty(c.variant_id);
        for e in variant.handle(&VariantCommand::CreateVariant(c.clone())).unwrap() {
            variant.apply(&e);
        }
        assert!(variant.is_created());
        assert_eq!(variant.product_id(), Some(c.product_id));
        assert!(!variant.kind().is_combo());
    }

    #[test]
    fn combo_rules() {
        let empty = cmd(VariantKind::Combo { components: vec![] });
        assert!(matches!(
            Variant::empty(empty.variant_id).handle(&VariantCommand::CreateVariant(empty)),
            Err(DomainError::Validation(msg)) if msg.contains("at least one")
        ));

        let mut selfish = cmd(VariantKind::Simple);
        selfish.kind = VariantKind::Combo {
            components: vec![ComboComponent {
                variant_id: selfish.variant_id,
                quantity: Quantity::from_i64(2).unwrap(),
            }],
        };
        assert!(matches!(
            Variant::empty(selfish.variant_id).handle(&VariantCommand::CreateVariant(selfish)),
            Err(DomainError::Validation(msg)) if msg.contains("itself")
        ));
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let kind = VariantKind::Combo {
            components: vec![ComboComponent {
                variant_id: VariantId::generate(),
                quantity: Quantity::from_i64(2).unwrap(),
            }],
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "combo");
        assert_eq!(json["components"][0]["quantity"], "2");
    }
}
