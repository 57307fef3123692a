//! Request bodies, query strings and the JSON-error extractors.

use std::str::FromStr;

use axum::extract::{FromRequest, FromRequestParts};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Deserialize;

use stockledger_core::DomainError;
use stockledger_infra::event_store::Pagination;
use stockledger_infra::projections::{InventoryFilter, MovementFilter, SheetFilter};
use stockledger_infra::reports::ReportQuery;
use stockledger_infra::workflow::{NewCheckLine, NewSheet, NewSheetBody, NewSheetLine};
use stockledger_products::{BatchId, ProductId, VariantId};
use stockledger_warehouses::{SheetKind, WarehouseId, WarehouseProfile};

use crate::app::errors::ApiError;

/// `Json` whose rejection is an [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejection is an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    Ok(raw.trim().parse()?)
}

fn parse_kind(raw: Option<&str>) -> Result<Option<SheetKind>, ApiError> {
    Ok(raw.filter(|k| !k.trim().is_empty()).map(SheetKind::from_str).transpose()?)
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

// -------------------------
// Requests
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    pub name: String,
    pub manager_name: Option<String>,
    pub manager_phone: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "yes")]
    pub is_sales: bool,
}

fn yes() -> bool {
    true
}

impl From<CreateWarehouseRequest> for WarehouseProfile {
    fn from(r: CreateWarehouseRequest) -> Self {
        WarehouseProfile {
            name: r.name,
            manager_name: r.manager_name,
            manager_phone: r.manager_phone,
            note: r.note,
            is_default: r.is_default,
            is_sales: r.is_sales,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameProductRequest {
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportExportSheetRequest {
    pub kind: SheetKind,
    pub reason: String,
    pub note: Option<String>,
    #[serde(default)]
    pub is_confirm: bool,
    pub warehouse_id: WarehouseId,
    pub order_key: Option<String>,
    pub lines: Vec<NewSheetLine>,
}

impl TryFrom<ImportExportSheetRequest> for NewSheet {
    type Error = ApiError;

    fn try_from(r: ImportExportSheetRequest) -> Result<Self, Self::Error> {
        if !r.kind.is_import_export() {
            return Err(ApiError::BadRequest("kind must be import or export".into()));
        }
        Ok(NewSheet {
            kind: r.kind,
            reason: r.reason,
            note: r.note,
            is_confirm: r.is_confirm,
            body: NewSheetBody::ImportExport {
                warehouse_id: r.warehouse_id,
                order_key: r.order_key,
                lines: r.lines,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TransferSheetRequest {
    pub reason: String,
    pub note: Option<String>,
    #[serde(default)]
    pub is_confirm: bool,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub lines: Vec<NewSheetLine>,
}

impl From<TransferSheetRequest> for NewSheet {
    fn from(r: TransferSheetRequest) -> Self {
        NewSheet {
            kind: SheetKind::Transfer,
            reason: r.reason,
            note: r.note,
            is_confirm: r.is_confirm,
            body: NewSheetBody::Transfer {
                from_warehouse_id: r.from_warehouse_id,
                to_warehouse_id: r.to_warehouse_id,
                lines: r.lines,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckSheetRequest {
    pub reason: String,
    pub note: Option<String>,
    #[serde(default)]
    pub is_confirm: bool,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<NewCheckLine>,
}

impl From<CheckSheetRequest> for NewSheet {
    fn from(r: CheckSheetRequest) -> Self {
        NewSheet {
            kind: SheetKind::Check,
            reason: r.reason,
            note: r.note,
            is_confirm: r.is_confirm,
            body: NewSheetBody::Check {
                warehouse_id: r.warehouse_id,
                lines: r.lines,
            },
        }
    }
}

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KindQuery {
    pub kind: Option<String>,
}

impl KindQuery {
    pub fn kind(&self) -> Result<Option<SheetKind>, ApiError> {
        parse_kind(self.kind.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VariantsQuery {
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SheetListQuery {
    pub kind: Option<String>,
    pub warehouse_id: Option<WarehouseId>,
    pub is_confirmed: Option<bool>,
    pub is_deleted: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SheetListQuery {
    pub fn filter(&self) -> Result<SheetFilter, ApiError> {
        Ok(SheetFilter {
            kind: parse_kind(self.kind.as_deref())?,
            warehouse_id: self.warehouse_id,
            is_confirmed: self.is_confirmed,
            is_deleted: self.is_deleted,
            search: self.search.clone(),
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    pub warehouse_id: Option<WarehouseId>,
    pub batch_id: Option<BatchId>,
    pub variant_id: Option<VariantId>,
    #[serde(default)]
    pub include_empty: bool,
}

impl From<InventoryQuery> for InventoryFilter {
    fn from(q: InventoryQuery) -> Self {
        InventoryFilter {
            warehouse_id: q.warehouse_id,
            batch_id: q.batch_id,
            variant_id: q.variant_id,
            include_empty: q.include_empty,
        }
    }
}

/// Movement log filters; `date_to` is an inclusive day.
#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub warehouse_id: Option<WarehouseId>,
    pub batch_id: Option<BatchId>,
    pub variant_id: Option<VariantId>,
    pub kind: Option<String>,
    pub sheet_code: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl MovementQuery {
    pub fn filter(&self) -> Result<MovementFilter, ApiError> {
        let date_to = match self.date_to {
            Some(day) => Some(
                day.checked_add_days(Days::new(1))
                    .map(start_of)
                    .ok_or_else(|| ApiError::BadRequest("date_to is out of range".into()))?,
            ),
            None => None,
        };
        Ok(MovementFilter {
            warehouse_id: self.warehouse_id,
            batch_id: self.batch_id,
            variant_id: self.variant_id,
            kind: parse_kind(self.kind.as_deref())?,
            sheet_code: self.sheet_code.clone(),
            date_from: self.date_from.map(start_of),
            date_to,
            search: self.search.clone(),
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

/// `warehouse_ids` is a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub warehouse_ids: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl ReportParams {
    pub fn query(&self) -> Result<ReportQuery, ApiError> {
        let warehouse_ids = self
            .warehouse_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(parse_id::<WarehouseId>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ReportQuery {
            warehouse_ids,
            date_from: self.date_from,
            date_to: self.date_to,
            search: self.search.clone(),
        })
    }
}
