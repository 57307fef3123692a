//! Catalog module: products, their sellable variants, and stock batches.
//!
//! Pure domain logic; warehouses and orders refer to [`VariantId`] and [`BatchId`].

pub mod batch;
pub mod product;
pub mod variant;

pub use batch::{Batch, BatchCommand, BatchEvent, BatchId, BatchRegistered, RegisterBatch};
pub use product::{
    CreateProduct, Product, ProductCommand, ProductCreated, ProductEvent, ProductId, ProductRenamed,
    RenameProduct,
};
pub use variant::{
    ComboComponent, CreateVariant, Variant, VariantCommand, VariantCreated, VariantEvent, VariantId,
    VariantKind,
};

/// Aggregate type names used as stream labels.
pub const PRODUCT_AGGREGATE: &str = "products.product";
pub const VARIANT_AGGREGATE: &str = "products.variant";
pub const BATCH_AGGREGATE: &str = "products.batch";

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), stockledger_core::DomainError> {
    if value.trim().is_empty() {
        return Err(stockledger_core::DomainError::validation(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(())
}
