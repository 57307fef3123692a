//! Orders, modelled as far as stock reservations need.
//!
//! An order reserves the stock items it will ship: draft orders in the
//! *non-confirmed* bucket, completed orders in the *confirmed* bucket. Every
//! event states the bucket changes it causes as explicit [`ReservationDelta`]s.

pub mod items;
pub mod order;

pub use items::{GiftItem, OrderLine, StockItems, stock_items};
pub use order::{
    AttachSheet, CancelOrder, CompleteOrder, LinkedSheet, LinkedSheetConfirmed, MarkSheetConfirmed,
    Order, OrderCancelled, OrderCommand, OrderCompleted, OrderEvent, OrderId, OrderPlaced,
    OrderStatus, PlaceOrder, ReservationDelta, SheetAttached, order_id_for_key,
};

pub const ORDER_AGGREGATE: &str = "orders.order";
