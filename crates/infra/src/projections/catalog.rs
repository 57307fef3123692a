use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::TenantId;
use stockledger_events::{
    CursorDecision, EventEnvelope, Projection, ProjectionError, StreamCursors, ensure_same_tenant,
};
use stockledger_products::{
    BATCH_AGGREGATE, BatchEvent, BatchId, PRODUCT_AGGREGATE, ProductEvent, ProductId, VARIANT_AGGREGATE,
    VariantEvent, VariantId, VariantKind,
};

use crate::projections::{decode, ensure_stream};
use crate::read_model::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantReadModel {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub kind: VariantKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReadModel {
    pub id: BatchId,
    pub variant_id: VariantId,
    pub name: String,
    pub expire_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Products, variants and batches: the lookups the warehouse workflow and report need.
#[derive(Debug, Default)]
pub struct CatalogProjection {
    products: InMemoryTenantStore<ProductId, ProductReadModel>,
    variants: InMemoryTenantStore<VariantId, VariantReadModel>,
    batches: InMemoryTenantStore<BatchId, BatchReadModel>,
    cursors: StreamCursors,
}

impl CatalogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product(&self, tenant_id: TenantId, id: &ProductId) -> Option<ProductReadModel> {
        self.products.get(tenant_id, id)
    }

    pub fn variant(&self, tenant_id: TenantId, id: &VariantId) -> Option<VariantReadModel> {
        self.variants.get(tenant_id, id)
    }

    pub fn batch(&self, tenant_id: TenantId, id: &BatchId) -> Option<BatchReadModel> {
        self.batches.get(tenant_id, id)
    }

    pub fn products(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        let mut out = self.products.list(tenant_id);
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        out
    }

    /// Variants sorted by name, optionally narrowed to one product.
    pub fn variants(&self, tenant_id: TenantId, product_id: Option<ProductId>) -> Vec<VariantReadModel> {
        let mut out: Vec<_> = self
            .variants
            .list(tenant_id)
            .into_iter()
            .filter(|v| product_id.is_none_or(|p| v.product_id == p))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        out
    }

    pub fn batches_of(&self, tenant_id: TenantId, variant_id: VariantId) -> Vec<BatchReadModel> {
        let mut out: Vec<_> = self
            .batches
            .list(tenant_id)
            .into_iter()
            .filter(|b| b.variant_id == variant_id)
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        out
    }

    fn apply_product(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ev: ProductEvent = decode(env)?;
        ensure_same_tenant(env, ev.tenant_id())?;
        let tenant_id = env.tenant_id();

        match ev {
            ProductEvent::ProductCreated(e) => {
                ensure_stream(env, e.product_id.0)?;
                self.products.upsert(
                    tenant_id,
                    e.product_id,
                    ProductReadModel {
                        id: e.product_id,
                        name: e.name,
                        sku: e.sku,
                        category: e.category,
                        created_at: e.occurred_at,
                    },
                );
            }
            ProductEvent::ProductRenamed(e) => {
                ensure_stream(env, e.product_id.0)?;
                if let Some(mut rm) = self.products.get(tenant_id, &e.product_id) {
                    rm.name = e.name;
                    rm.category = e.category;
                    self.products.upsert(tenant_id, e.product_id, rm);
                }
            }
        }
        Ok(())
    }

    fn apply_variant(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let VariantEvent::VariantCreated(e) = decode(env)?;
        ensure_same_tenant(env, e.tenant_id)?;
        ensure_stream(env, e.variant_id.0)?;

        self.variants.upsert(
            env.tenant_id(),
            e.variant_id,
            VariantReadModel {
                id: e.variant_id,
                product_id: e.product_id,
                name: e.name,
                sku: e.sku,
                kind: e.kind,
                created_at: e.occurred_at,
            },
        );
        Ok(())
    }

    fn apply_batch(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let BatchEvent::BatchRegistered(e) = decode(env)?;
        ensure_same_tenant(env, e.tenant_id)?;
        ensure_stream(env, e.batch_id.0)?;

        self.batches.upsert(
            env.tenant_id(),
            e.batch_id,
            BatchReadModel {
                id: e.batch_id,
                variant_id: e.variant_id,
                name: e.name,
                expire_date: e.expire_date,
                created_at: e.occurred_at,
            },
        );
        Ok(())
    }
}

impl Projection for CatalogProjection {
    fn name(&self) -> &'static str {
        "catalog"
    }

    fn consumes(&self, aggregate_type: &str) -> bool {
        matches!(aggregate_type, PRODUCT_AGGREGATE | VARIANT_AGGREGATE | BATCH_AGGREGATE)
    }

    fn apply_envelope(&self, env: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if self.cursors.check(env)? == CursorDecision::Skip {
            return Ok(());
        }

        match env.aggregate_type() {
            PRODUCT_AGGREGATE => self.apply_product(env)?,
            VARIANT_AGGREGATE => self.apply_variant(env)?,
            BATCH_AGGREGATE => self.apply_batch(env)?,
            _ => return Ok(()),
        }

        self.cursors.advance(env)
    }

    fn reset(&self) {
        self.products.clear_all();
        self.variants.clear_all();
        self.batches.clear_all();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_products::{ProductCreated, VariantCreated};
    use uuid::Uuid;

    fn envelope<E: Serialize>(tenant_id: TenantId, id: stockledger_core::AggregateId, ty: &str, seq: u64, ev: &E) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), tenant_id, id, ty, seq, serde_json::to_value(ev).unwrap())
    }

    #[test]
    fn products_and_variants_are_listed_per_tenant() {
        let catalog = CatalogProjection::new();
        let t = TenantId::new();
        let product_id = ProductId::generate();
        let variant_id = VariantId::generate();

        catalog
            .apply_envelope(&envelope(
                t,
                product_id.0,
                PRODUCT_AGGREGATE,
                1,
                &ProductEvent::ProductCreated(ProductCreated {
                    tenant_id: t,
                    product_id,
                    name: "Green tea".into(),
                    sku: "GT".into(),
                    category: None,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        catalog
            .apply_envelope(&envelope(
                t,
                variant_id.0,
                VARIANT_AGGREGATE,
                1,
                &VariantEvent::VariantCreated(VariantCreated {
                    tenant_id: t,
                    variant_id,
                    product_id,
                    name: "Green tea 500g".into(),
                    sku: "GT-500".into(),
                    kind: VariantKind::Simple,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert_eq!(catalog.products(t).len(), 1);
        assert_eq!(catalog.variants(t, Some(product_id))[0].sku, "GT-500");
        assert!(catalog.variants(TenantId::new(), None).is_empty());
    }

    #[test]
    fn payload_tenant_must_match_envelope() {
        let catalog = CatalogProjection::new();
        let product_id = ProductId::generate();
        let ev = ProductEvent::ProductCreated(ProductCreated {
            tenant_id: TenantId::new(),
            product_id,
            name: "x".into(),
            sku: "x".into(),
            category: None,
            occurred_at: Utc::now(),
        });

        let err = catalog
            .apply_envelope(&envelope(TenantId::new(), product_id.0, PRODUCT_AGGREGATE, 1, &ev))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::TenantIsolation(_)));
    }
}
