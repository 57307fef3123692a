//! Read-only reports computed over the projections.

pub mod warehouse_report;

pub use warehouse_report::{BatchReportRow, ProductReport, ReportQuery, ReportTotals, VariantReport, WarehouseReport};
