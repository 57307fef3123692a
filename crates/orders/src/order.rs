use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Quantity, TenantId, UserId,
    typed_aggregate_id,
};
use stockledger_events::Event;
use stockledger_products::VariantId;
use stockledger_warehouses::SheetKind;

use crate::items::{OrderLine, stock_items};

typed_aggregate_id!(
    /// Order identifier, derived from the order key (see [`order_id_for_key`]).
    OrderId
);

/// Orders are addressed by their human-readable key; the stream id follows from it.
pub fn order_id_for_key(tenant_id: TenantId, order_key: &str) -> OrderId {
    OrderId(AggregateId::derived(tenant_id, &format!("orders.order:{order_key}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Change of the two reservation buckets for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationDelta {
    pub variant_id: VariantId,
    pub confirmed: Quantity,
    pub non_confirmed: Quantity,
}

/// Warehouse sheet issued for this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedSheet {
    pub kind: SheetKind,
    pub code: String,
    pub confirmed: bool,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    tenant_id: Option<TenantId>,
    order_key: String,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    sheets: Vec<LinkedSheet>,
    completed_by: Option<UserId>,
    completed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            order_key: String::new(),
            status: OrderStatus::Draft,
            lines: Vec::new(),
            sheets: Vec::new(),
            completed_by: None,
            completed_at: None,
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

    pub fn order_key(&self) -> &str {
        &self.order_key
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn sheets(&self) -> &[LinkedSheet] {
        &self.sheets
    }

    pub fn completed_by(&self) -> Option<UserId> {
        self.completed_by
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn sheet_of_kind(&self, kind: SheetKind) -> Option<&LinkedSheet> {
        self.sheets.iter().find(|s| s.kind == kind)
    }

    /// Whether any linked import/export sheet was confirmed (stock already moved).
    pub fn has_confirmed_sheet(&self) -> bool {
        self.sheets
            .iter()
            .any(|s| s.confirmed && s.kind.is_import_export())
    }

    fn reservation(&self, confirmed_sign: i64, non_confirmed_sign: i64) -> Result<Vec<ReservationDelta>, DomainError> {
        reservation_for(&self.lines, confirmed_sign, non_confirmed_sign)
    }
}

fn reservation_for(
    lines: &[OrderLine],
    confirmed_sign: i64,
    non_confirmed_sign: i64,
) -> Result<Vec<ReservationDelta>, DomainError> {
    let scale = |q: Quantity, sign: i64| match sign {
        0 => Quantity::ZERO,
        s if s < 0 => -q,
        _ => q,
    };

    Ok(stock_items(lines)?
        .items
        .into_iter()
        .map(|(variant_id, q)| ReservationDelta {
            variant_id,
            confirmed: scale(q, confirmed_sign),
            non_confirmed: scale(q, non_confirmed_sign),
        })
        .collect())
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_key: String,
    /// `Draft` or `Completed`.
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub placed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub completed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachSheet {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub kind: SheetKind,
    pub sheet_code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSheetConfirmed {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub sheet_code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    CompleteOrder(CompleteOrder),
    CancelOrder(CancelOrder),
    AttachSheet(AttachSheet),
    MarkSheetConfirmed(MarkSheetConfirmed),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_key: String,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub reservation: Vec<ReservationDelta>,
    pub placed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_key: String,
    pub reservation: Vec<ReservationDelta>,
    pub completed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_key: String,
    pub previous_status: OrderStatus,
    /// Empty when the stock already left through a confirmed sheet.
    pub reservation: Vec<ReservationDelta>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetAttached {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_key: String,
    pub kind: SheetKind,
    pub sheet_code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedSheetConfirmed {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_key: String,
    pub sheet_code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderCompleted(OrderCompleted),
    OrderCancelled(OrderCancelled),
    SheetAttached(SheetAttached),
    LinkedSheetConfirmed(LinkedSheetConfirmed),
}

impl OrderEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            OrderEvent::OrderPlaced(e) => e.tenant_id,
            OrderEvent::OrderCompleted(e) => e.tenant_id,
            OrderEvent::OrderCancelled(e) => e.tenant_id,
            OrderEvent::SheetAttached(e) => e.tenant_id,
            OrderEvent::LinkedSheetConfirmed(e) => e.tenant_id,
        }
    }

    pub fn order_key(&self) -> &str {
        match self {
            OrderEvent::OrderPlaced(e) => &e.order_key,
            OrderEvent::OrderCompleted(e) => &e.order_key,
            OrderEvent::OrderCancelled(e) => &e.order_key,
            OrderEvent::SheetAttached(e) => &e.order_key,
            OrderEvent::LinkedSheetConfirmed(e) => &e.order_key,
        }
    }

    /// Reservation changes carried by the event (empty for sheet bookkeeping).
    pub fn reservation(&self) -> &[ReservationDelta] {
        match self {
            OrderEvent::OrderPlaced(e) => &e.reservation,
            OrderEvent::OrderCompleted(e) => &e.reservation,
            OrderEvent::OrderCancelled(e) => &e.reservation,
            OrderEvent::SheetAttached(_) | OrderEvent::LinkedSheetConfirmed(_) => &[],
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderCompleted(_) => "orders.order.completed",
            OrderEvent::OrderCancelled(_) => "orders.order.cancelled",
            OrderEvent::SheetAttached(_) => "orders.order.sheet_attached",
            OrderEvent::LinkedSheetConfirmed(_) => "orders.order.sheet_confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderCompleted(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
            OrderEvent::SheetAttached(e) => e.occurred_at,
            OrderEvent::LinkedSheetConfirmed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.order_key = e.order_key.clone();
                self.status = e.status;
                self.lines = e.lines.clone();
                if e.status == OrderStatus::Completed {
                    self.completed_by = e.placed_by;
                    self.completed_at = Some(e.occurred_at);
                }
                self.created = true;
            }
            OrderEvent::OrderCompleted(e) => {
                self.status = OrderStatus::Completed;
                self.completed_by = e.completed_by;
                self.completed_at = Some(e.occurred_at);
            }
            OrderEvent::OrderCancelled(_) => {
                self.status = OrderStatus::Cancelled;
            }
            OrderEvent::SheetAttached(e) => {
                self.sheets.push(LinkedSheet {
                    kind: e.kind,
                    code: e.sheet_code.clone(),
                    confirmed: false,
                });
            }
            OrderEvent::LinkedSheetConfirmed(e) => {
                if let Some(s) = self.sheets.iter_mut().find(|s| s.code == e.sheet_code) {
                    s.confirmed = true;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::CompleteOrder(cmd) => self.handle_complete(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::AttachSheet(cmd) => self.handle_attach(cmd),
            OrderCommand::MarkSheetConfirmed(cmd) => self.handle_mark_confirmed(cmd),
        }
    }
}

impl Order {
    fn ensure_existing(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!("order {} already exists", cmd.order_key)));
        }
        if cmd.order_key.trim().is_empty() {
            return Err(DomainError::validation("order key cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }
        for line in &cmd.lines {
            line.validate()?;
        }

        let reservation = match cmd.status {
            OrderStatus::Draft => reservation_for(&cmd.lines, 0, 1)?,
            OrderStatus::Completed => reservation_for(&cmd.lines, 1, 0)?,
            OrderStatus::Cancelled => {
                return Err(DomainError::validation("new orders are draft or completed"));
            }
        };

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_key: cmd.order_key.clone(),
            status: cmd.status,
            lines: cmd.lines.clone(),
            reservation,
            placed_by: cmd.placed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id)?;
        if self.status != OrderStatus::Draft {
            return Err(DomainError::invariant(format!(
                "cannot complete a {} order",
                self.status.as_str()
            )));
        }

        Ok(vec![OrderEvent::OrderCompleted(OrderCompleted {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_key: self.order_key.clone(),
            reservation: self.reservation(1, -1)?,
            completed_by: cmd.completed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id)?;

        let reservation = match self.status {
            OrderStatus::Draft => self.reservation(0, -1)?,
            OrderStatus::Completed if self.has_confirmed_sheet() => vec![],
            OrderStatus::Completed => self.reservation(-1, 0)?,
            OrderStatus::Cancelled => {
                return Err(DomainError::invariant("order is already cancelled"));
            }
        };

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_key: self.order_key.clone(),
            previous_status: self.status,
            reservation,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach(&self, cmd: &AttachSheet) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id)?;
        if !cmd.kind.is_import_export() {
            return Err(DomainError::validation("only import/export sheets link to orders"));
        }
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invariant(format!("order {} is cancelled", self.order_key)));
        }
        if let Some(existing) = self.sheet_of_kind(cmd.kind) {
            if existing.code == cmd.sheet_code {
                return Ok(vec![]);
            }
            return Err(DomainError::conflict(format!(
                "order {} already has a sheet",
                self.order_key
            )));
        }

        Ok(vec![OrderEvent::SheetAttached(SheetAttached {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_key: self.order_key.clone(),
            kind: cmd.kind,
            sheet_code: cmd.sheet_code.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_confirmed(&self, cmd: &MarkSheetConfirmed) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id)?;

        let sheet = self
            .sheets
            .iter()
            .find(|s| s.code == cmd.sheet_code)
            .ok_or_else(|| DomainError::validation(format!(
                "sheet {} is not linked to order {}",
                cmd.sheet_code, self.order_key
            )))?;
        if sheet.confirmed {
            return Ok(vec![]);
        }
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invariant(format!("order {} is cancelled", self.order_key)));
        }

        Ok(vec![OrderEvent::LinkedSheetConfirmed(LinkedSheetConfirmed {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_key: self.order_key.clone(),
            sheet_code: cmd.sheet_code.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::GiftItem;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use stockledger_products::ComboComponent;

    fn q(v: i64) -> Quantity {
        Quantity::from_i64(v).unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn simple(variant_id: VariantId, quantity: i64) -> OrderLine {
        OrderLine {
            variant_id,
            quantity: q(quantity),
            components: vec![],
            gifts: vec![],
        }
    }

    fn placed(status: OrderStatus, lines: Vec<OrderLine>) -> (TenantId, Order, OrderPlaced) {
        let tenant_id = TenantId::new();
        let order_id = order_id_for_key(tenant_id, "OD000001");
        let mut order = Order::empty(order_id);
        let events = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                tenant_id,
                order_id,
                order_key: "OD000001".to_string(),
                status,
                lines,
                placed_by: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            order.apply(e);
        }
        let OrderEvent::OrderPlaced(p) = events[0].clone() else {
            panic!("expected OrderPlaced");
        };
        (tenant_id, order, p)
    }

    fn run(order: &mut Order, cmd: OrderCommand) -> Result<Vec<OrderEvent>, DomainError> {
        let events = order.handle(&cmd)?;
        for e in &events {
            order.apply(e);
        }
        Ok(events)
    }

    fn complete(tenant_id: TenantId, order: &Order) -> OrderCommand {
        OrderCommand::CompleteOrder(CompleteOrder {
            tenant_id,
            order_id: *order.id(),
            completed_by: Some(UserId::new()),
            occurred_at: test_time(),
        })
    }

    fn cancel(tenant_id: TenantId, order: &Order) -> OrderCommand {
        OrderCommand::CancelOrder(CancelOrder {
            tenant_id,
            order_id: *order.id(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn draft_order_reserves_non_confirmed() {
        let tea = VariantId::generate();
        let (_, _, placed) = placed(OrderStatus::Draft, vec![simple(tea, 3)]);

        assert_eq!(
            placed.reservation,
            vec![ReservationDelta {
                variant_id: tea,
                confirmed: Quantity::ZERO,
                non_confirmed: q(3),
            }]
        );
    }

    #[test]
    fn completed_order_reserves_confirmed_and_records_completion() {
        let tea = VariantId::generate();
        let (_, order, placed) = placed(OrderStatus::Completed, vec![simple(tea, 2)]);

        assert_eq!(placed.reservation[0].confirmed, q(2));
        assert_eq!(placed.reservation[0].non_confirmed, Quantity::ZERO);
        assert!(order.completed_at().is_some());
    }

    #[test]
    fn completing_moves_between_buckets() {
        let tea = VariantId::generate();
        let (tenant_id, mut order, _) = placed(OrderStatus::Draft, vec![simple(tea, 5)]);

        let cmd = complete(tenant_id, &order);
        let events = run(&mut order, cmd).unwrap();
        assert_eq!(
            events[0].reservation(),
            &[ReservationDelta {
                variant_id: tea,
                confirmed: q(5),
                non_confirmed: q(-5),
            }]
        );
        assert_eq!(order.status(), OrderStatus::Completed);

        let again = complete(tenant_id, &order);
        assert!(matches!(run(&mut order, again), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn cancelling_a_draft_releases_non_confirmed() {
        let tea = VariantId::generate();
        let (tenant_id, mut order, _) = placed(OrderStatus::Draft, vec![simple(tea, 4)]);

        let cmd = cancel(tenant_id, &order);
        let events = run(&mut order, cmd).unwrap();
        assert_eq!(events[0].reservation()[0].non_confirmed, q(-4));
        assert_eq!(events[0].reservation()[0].confirmed, Quantity::ZERO);

        let again = cancel(tenant_id, &order);
        assert!(run(&mut order, again).is_err());
    }

    #[test]
    fn cancelling_a_completed_order_depends_on_confirmed_sheets() {
        let tea = VariantId::generate();

        let (tenant_id, mut order, _) = placed(OrderStatus::Completed, vec![simple(tea, 4)]);
        let cmd = cancel(tenant_id, &order);
        let events = run(&mut order, cmd).unwrap();
        assert_eq!(events[0].reservation()[0].confirmed, q(-4));

        let (tenant_id, mut order, _) = placed(OrderStatus::Completed, vec![simple(tea, 4)]);
        let order_id = *order.id();
        run(
            &mut order,
            OrderCommand::AttachSheet(AttachSheet {
                tenant_id,
                order_id,
                kind: SheetKind::Export,
                sheet_code: "EP000001".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        run(
            &mut order,
            OrderCommand::MarkSheetConfirmed(MarkSheetConfirmed {
                tenant_id,
                order_id,
                sheet_code: "EP000001".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let cmd = cancel(tenant_id, &order);
        let events = run(&mut order, cmd).unwrap();
        assert!(events[0].reservation().is_empty());
    }

    #[test]
    fn one_sheet_per_kind() {
        let (tenant_id, mut order, _) = placed(OrderStatus::Draft, vec![simple(VariantId::generate(), 1)]);
        let attach = |code: &str, kind| {
            OrderCommand::AttachSheet(AttachSheet {
                tenant_id,
                order_id: order_id_for_key(tenant_id, "OD000001"),
                kind,
                sheet_code: code.to_string(),
                occurred_at: test_time(),
            })
        };

        run(&mut order, attach("EP000001", SheetKind::Export)).unwrap();
        assert!(run(&mut order, attach("EP000001", SheetKind::Export)).unwrap().is_empty());
        assert!(matches!(
            run(&mut order, attach("EP000002", SheetKind::Export)),
            Err(DomainError::Conflict(msg)) if msg.contains("already has a sheet")
        ));
        run(&mut order, attach("IP000001", SheetKind::Import)).unwrap();
        assert!(run(&mut order, attach("TF000001", SheetKind::Transfer)).is_err());
    }

    #[test]
    fn cancelled_orders_accept_no_sheets() {
        let (tenant_id, mut order, _) = placed(OrderStatus::Draft, vec![simple(VariantId::generate(), 1)]);
        let cmd = cancel(tenant_id, &order);
        run(&mut order, cmd).unwrap();

        let order_id = *order.id();
        let err = run(
            &mut order,
            OrderCommand::AttachSheet(AttachSheet {
                tenant_id,
                order_id,
                kind: SheetKind::Export,
                sheet_code: "EP000001".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("cancelled")));
    }

    #[test]
    fn combo_and_gift_lines_reserve_their_stock_items() {
        let tea = VariantId::generate();
        let cup = VariantId::generate();
        let combo = OrderLine {
            variant_id: VariantId::generate(),
            quantity: q(2),
            components: vec![ComboComponent {
                variant_id: tea,
                quantity: q(3),
            }],
            gifts: vec![GiftItem {
                variant_id: cup,
                quantity: q(1),
            }],
        };
        let (_, _, placed) = placed(OrderStatus::Draft, vec![combo]);

        let by_variant: HashMap<_, _> = placed
            .reservation
            .iter()
            .map(|r| (r.variant_id, r.non_confirmed))
            .collect();
        assert_eq!(by_variant[&tea], q(6));
        assert_eq!(by_variant[&cup], q(1));
        assert_eq!(by_variant.len(), 2);
    }

    #[test]
    fn placing_requires_lines() {
        let tenant_id = TenantId::new();
        let order_id = order_id_for_key(tenant_id, "OD000009");
        let err = Order::empty(order_id)
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                tenant_id,
                order_id,
                order_key: "OD000009".to_string(),
                status: OrderStatus::Draft,
                lines: vec![],
                placed_by: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        /// Whatever path an order takes, the buckets it touched net out to zero once it
        /// is cancelled (unless stock already shipped through a confirmed sheet).
        #[test]
        fn cancelled_orders_leave_no_reservation(qty in 1i64..1000, complete_first in any::<bool>()) {
            let tea = VariantId::generate();
            let (tenant_id, mut order, placed) = placed(OrderStatus::Draft, vec![simple(tea, qty)]);

            let mut confirmed = placed.reservation[0].confirmed;
            let mut non_confirmed = placed.reservation[0].non_confirmed;

            if complete_first {
                let cmd = complete(tenant_id, &order);
                for e in run(&mut order, cmd).unwrap() {
                    for r in e.reservation() {
                        confirmed = confirmed.checked_add(r.confirmed).unwrap();
                        non_confirmed = non_confirmed.checked_add(r.non_confirmed).unwrap();
                    }
                }
            }

            let cmd = cancel(tenant_id, &order);
            for e in run(&mut order, cmd).unwrap() {
                for r in e.reservation() {
                    confirmed = confirmed.checked_add(r.confirmed).unwrap();
                    non_confirmed = non_confirmed.checked_add(r.non_confirmed).unwrap();
                }
            }

            prop_assert!(confirmed.is_zero());
            prop_assert!(non_confirmed.is_zero());
        }
    }
}
