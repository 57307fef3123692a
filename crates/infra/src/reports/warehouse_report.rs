//! Stock movement report for a date range: opening stock, imports, exports and closing
//! stock per (warehouse, batch), grouped product → variant → batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use stockledger_core::{DomainError, Quantity, TenantId};
use stockledger_products::{BatchId, ProductId, VariantId};
use stockledger_warehouses::{StockKey, WarehouseId};

use crate::projections::ReadModels;
use crate::projections::text_matches;

#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    /// Empty means every warehouse.
    pub warehouse_ids: Vec<WarehouseId>,
    pub date_from: Option<NaiveDate>,
    /// Defaults to today.
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub first_inventory: Quantity,
    pub c_import: Quantity,
    /// Sum of outgoing movements (zero or negative).
    pub c_export: Quantity,
    pub last_inventory: Quantity,
}

impl ReportTotals {
    fn add(&mut self, other: &ReportTotals) -> Result<(), DomainError> {
        self.first_inventory = self.first_inventory.checked_add(other.first_inventory)?;
        self.c_import = self.c_import.checked_add(other.c_import)?;
        self.c_export = self.c_export.checked_add(other.c_export)?;
        self.last_inventory = self.last_inventory.checked_add(other.last_inventory)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReportRow {
    pub batch_id: BatchId,
    pub batch_name: String,
    pub expire_date: Option<NaiveDate>,
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    #[serde(flatten)]
    pub totals: ReportTotals,
    /// First and last movement day inside the window.
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantReport {
    pub variant_id: VariantId,
    pub variant_name: String,
    pub variant_sku: String,
    #[serde(flatten)]
    pub totals: ReportTotals,
    pub batches: Vec<BatchReportRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReport {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub category: Option<String>,
    #[serde(flatten)]
    pub totals: ReportTotals,
    pub variants: Vec<VariantReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseReport {
    pub date_from: Option<NaiveDate>,
    pub date_to: NaiveDate,
    pub products: Vec<ProductReport>,
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

impl WarehouseReport {
    /// Build the report from the inventory history read model.
    ///
    /// The window is `[date_from, date_to + 1 day)`. Opening stock is the snapshot at or
    /// before `date_from` (0 without one); closing stock the last snapshot before the
    /// upper bound.
    pub fn build(
        models: &ReadModels,
        tenant_id: TenantId,
        query: &ReportQuery,
        today: NaiveDate,
    ) -> Result<Self, DomainError> {
        let date_to = query.date_to.unwrap_or(today);
        if let Some(from) = query.date_from
            && from > date_to
        {
            return Err(DomainError::validation("date_from must not be after date_to"));
        }
        let upper = date_to
            .checked_add_days(Days::new(1))
            .map(start_of)
            .ok_or_else(|| DomainError::validation("date_to is out of range"))?;
        let lower = query.date_from.map(start_of);

        let mut products: BTreeMap<ProductId, ProductReport> = BTreeMap::new();

        for (key, variant_id) in models.history.keys(tenant_id) {
            if !query.warehouse_ids.is_empty() && !query.warehouse_ids.contains(&key.warehouse_id) {
                continue;
            }
            let Some(last) = models.history.as_of(tenant_id, &key, upper, false) else {
                continue;
            };
            let Some(variant) = models.catalog.variant(tenant_id, &variant_id) else {
                continue;
            };
            let Some(product) = models.catalog.product(tenant_id, &variant.product_id) else {
                continue;
            };
            let batch = models.catalog.batch(tenant_id, &key.batch_id);
            let batch_name = batch.as_ref().map(|b| b.name.clone()).unwrap_or_default();

            if let Some(q) = query.search.as_deref()
                && !text_matches(q, &[&product.name, &product.sku, &variant.name, &variant.sku, &batch_name])
            {
                continue;
            }

            let row = batch_row(models, tenant_id, key, lower, upper, last.quantity, batch_name, batch.and_then(|b| b.expire_date))?;

            let product_entry = products.entry(product.id).or_insert_with(|| ProductReport {
                product_id: product.id,
                product_name: product.name.clone(),
                product_sku: product.sku.clone(),
                category: product.category.clone(),
                totals: ReportTotals::default(),
                variants: Vec::new(),
            });
            product_entry.totals.add(&row.totals)?;

            let variant_entry = match product_entry.variants.iter_mut().position(|v| v.variant_id == variant_id) {
                Some(i) => &mut product_entry.variants[i],
                None => {
                    product_entry.variants.push(VariantReport {
                        variant_id,
                        variant_name: variant.name.clone(),
                        variant_sku: variant.sku.clone(),
                        totals: ReportTotals::default(),
                        batches: Vec::new(),
                    });
                    let last = product_entry.variants.len() - 1;
                    &mut product_entry.variants[last]
                }
            };
            variant_entry.totals.add(&row.totals)?;
            variant_entry.batches.push(row);
        }

        let mut products: Vec<_> = products.into_values().collect();
        products.sort_by(|a, b| a.product_name.cmp(&b.product_name).then(a.product_id.cmp(&b.product_id)));
        for p in &mut products {
            p.variants.sort_by(|a, b| a.variant_name.cmp(&b.variant_name));
            for v in &mut p.variants {
                v.batches.sort_by(|a, b| {
                    a.warehouse_name
                        .cmp(&b.warehouse_name)
                        .then(a.batch_name.cmp(&b.batch_name))
                });
            }
        }

        Ok(Self {
            date_from: query.date_from,
            date_to,
            products,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn batch_row(
    models: &ReadModels,
    tenant_id: TenantId,
    key: StockKey,
    lower: Option<DateTime<Utc>>,
    upper: DateTime<Utc>,
    last_inventory: Quantity,
    batch_name: String,
    expire_date: Option<NaiveDate>,
) -> Result<BatchReportRow, DomainError> {
    let first_inventory = match lower {
        Some(from) => models.history.quantity_as_of(tenant_id, &key, from, true),
        None => Quantity::ZERO,
    };

    let mut totals = ReportTotals {
        first_inventory,
        last_inventory,
        ..ReportTotals::default()
    };
    let window = models.history.movements_between(tenant_id, &key, lower, upper);
    for m in &window {
        if m.delta.is_positive() {
            totals.c_import = totals.c_import.checked_add(m.delta)?;
        } else {
            totals.c_export = totals.c_export.checked_add(m.delta)?;
        }
    }

    Ok(BatchReportRow {
        batch_id: key.batch_id,
        batch_name,
        expire_date,
        warehouse_id: key.warehouse_id,
        warehouse_name: models.warehouses.name_of(tenant_id, &key.warehouse_id).unwrap_or_default(),
        totals,
        earliest: window.first().map(|m| m.at.date_naive()),
        latest: window.last().map(|m| m.at.date_naive()),
    })
}
