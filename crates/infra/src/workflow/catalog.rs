use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::instrument;

use stockledger_core::{DomainError, TenantId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_products::{
    BATCH_AGGREGATE, Batch, BatchCommand, BatchId, ComboComponent, CreateProduct, CreateVariant, PRODUCT_AGGREGATE,
    Product, ProductCommand, ProductId, RegisterBatch, RenameProduct, VARIANT_AGGREGATE, Variant, VariantCommand,
    VariantId, VariantKind,
};

use super::{InventoryWorkflow, WorkflowResult};
use crate::event_store::EventStore;

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// A variant; non-empty `components` makes it a combo.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVariant {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub components: Vec<ComboComponent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBatch {
    pub variant_id: VariantId,
    pub name: String,
    #[serde(default)]
    pub expire_date: Option<NaiveDate>,
}

impl<S, B> InventoryWorkflow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id), err)]
    pub fn create_product(&self, tenant_id: TenantId, input: NewProduct) -> WorkflowResult<ProductId> {
        let _guard = self.lock();
        let product_id = ProductId::generate();
        self.execute(
            tenant_id,
            product_id.0,
            PRODUCT_AGGREGATE,
            ProductCommand::CreateProduct(CreateProduct {
                tenant_id,
                product_id,
                name: input.name,
                sku: input.sku,
                category: input.category,
                occurred_at: Utc::now(),
            }),
            |_, id| Product::empty(ProductId(id)),
        )?;
        Ok(product_id)
    }

    pub fn rename_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        name: String,
        category: Option<String>,
    ) -> WorkflowResult<()> {
        let _guard = self.lock();
        self.execute(
            tenant_id,
            product_id.0,
            PRODUCT_AGGREGATE,
            ProductCommand::RenameProduct(RenameProduct {
                tenant_id,
                product_id,
                name,
                category,
                occurred_at: Utc::now(),
            }),
            |_, id| Product::empty(ProductId(id)),
        )?;
        Ok(())
    }

    /// Combo components must be existing simple variants.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id), err)]
    pub fn create_variant(&self, tenant_id: TenantId, input: NewVariant) -> WorkflowResult<VariantId> {
        let _guard = self.lock();

        let product: Product = self.load(tenant_id, input.product_id.0, PRODUCT_AGGREGATE, |_, id| {
            Product::empty(ProductId(id))
        })?;
        if !product.is_created() {
            return Err(DomainError::validation(format!("product {} not found", input.product_id)).into());
        }
        for c in &input.components {
            let component = self.variant(tenant_id, c.variant_id)?;
            if component.kind().is_combo() {
                return Err(DomainError::validation(format!(
                    "combo component {} must be a simple variant",
                    c.variant_id
                ))
                .into());
            }
        }

        let variant_id = VariantId::generate();
        let kind = if input.components.is_empty() {
            VariantKind::Simple
        } else {
            VariantKind::Combo {
                components: input.components,
            }
        };
        self.execute(
            tenant_id,
            variant_id.0,
            VARIANT_AGGREGATE,
            VariantCommand::CreateVariant(CreateVariant {
                tenant_id,
                variant_id,
                product_id: input.product_id,
                name: input.name,
                sku: input.sku,
                kind,
                occurred_at: Utc::now(),
            }),
            |_, id| Variant::empty(VariantId(id)),
        )?;
        Ok(variant_id)
    }

    /// Batches hold stock of simple variants only.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id), err)]
    pub fn register_batch(&self, tenant_id: TenantId, input: NewBatch) -> WorkflowResult<BatchId> {
        let _guard = self.lock();

        let variant = self.variant(tenant_id, input.variant_id)?;
        if variant.kind().is_combo() {
            return Err(DomainError::validation("combo variants hold no stock of their own").into());
        }

        let batch_id = BatchId::generate();
        self.execute(
            tenant_id,
            batch_id.0,
            BATCH_AGGREGATE,
            BatchCommand::RegisterBatch(RegisterBatch {
                tenant_id,
                batch_id,
                variant_id: input.variant_id,
                name: input.name,
                expire_date: input.expire_date,
                occurred_at: Utc::now(),
            }),
            |_, id| Batch::empty(BatchId(id)),
        )?;
        Ok(batch_id)
    }

    /// Strong read of a variant; missing variants are a validation error.
    pub(super) fn variant(&self, tenant_id: TenantId, variant_id: VariantId) -> WorkflowResult<Variant> {
        let variant: Variant = self.load(tenant_id, variant_id.0, VARIANT_AGGREGATE, |_, id| {
            Variant::empty(VariantId(id))
        })?;
        if !variant.is_created() {
            return Err(DomainError::validation(format!("variant {variant_id} not found")).into());
        }
        Ok(variant)
    }

    pub(super) fn batch(&self, tenant_id: TenantId, batch_id: BatchId) -> WorkflowResult<Batch> {
        let batch: Batch = self.load(tenant_id, batch_id.0, BATCH_AGGREGATE, |_, id| Batch::empty(BatchId(id)))?;
        if !batch.is_created() {
            return Err(DomainError::validation(format!("batch {batch_id} not found")).into());
        }
        Ok(batch)
    }
}
