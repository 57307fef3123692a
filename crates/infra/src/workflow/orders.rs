use chrono::Utc;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use stockledger_core::{Aggregate, DomainError, Quantity, TenantId, UserId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_orders::{
    CancelOrder, CompleteOrder, GiftItem, ORDER_AGGREGATE, Order, OrderCommand, OrderId, OrderLine, OrderStatus,
    PlaceOrder, order_id_for_key,
};
use stockledger_products::VariantId;
use stockledger_warehouses::SequenceType;

use super::{InventoryWorkflow, WorkflowResult};
use crate::event_store::EventStore;
use crate::projections::OrderReadModel;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderLine {
    pub variant_id: VariantId,
    pub quantity: Quantity,
    #[serde(default)]
    pub gifts: Vec<GiftItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    #[serde(default = "draft")]
    pub status: OrderStatus,
    pub lines: Vec<NewOrderLine>,
}

fn draft() -> OrderStatus {
    OrderStatus::Draft
}

impl<S, B> InventoryWorkflow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Place an order under a fresh `OD` key. Combo lines take their recipe from the
    /// catalog at placement time.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id), err)]
    pub fn place_order(
        &self,
        tenant_id: TenantId,
        actor: Option<UserId>,
        input: NewOrder,
    ) -> WorkflowResult<OrderReadModel> {
        let _guard = self.lock();

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in input.lines {
            let variant = self.variant(tenant_id, line.variant_id)?;
            for gift in &line.gifts {
                self.variant(tenant_id, gift.variant_id)?;
            }
            lines.push(OrderLine {
                variant_id: line.variant_id,
                quantity: line.quantity,
                components: variant.kind().components().to_vec(),
                gifts: line.gifts,
            });
        }

        let mut place = PlaceOrder {
            tenant_id,
            order_id: OrderId::generate(),
            order_key: "OD000000".into(),
            status: input.status,
            lines,
            placed_by: actor,
            occurred_at: Utc::now(),
        };
        Order::empty(place.order_id).handle(&OrderCommand::PlaceOrder(place.clone()))?;

        place.order_key = self.issue_code(tenant_id, SequenceType::Order)?;
        place.order_id = order_id_for_key(tenant_id, &place.order_key);
        let key = place.order_key.clone();
        self.execute(
            tenant_id,
            place.order_id.0,
            ORDER_AGGREGATE,
            OrderCommand::PlaceOrder(place),
            |_, id| Order::empty(OrderId(id)),
        )?;
        info!(order_key = %key, "order placed");

        self.order_read_model(tenant_id, &key)
    }

    /// Draft to completed: the reservation moves from the unconfirmed to the confirmed bucket.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn complete_order(
        &self,
        tenant_id: TenantId,
        actor: Option<UserId>,
        order_key: &str,
    ) -> WorkflowResult<OrderReadModel> {
        let _guard = self.lock();
        let order_id = order_id_for_key(tenant_id, order_key);
        self.execute(
            tenant_id,
            order_id.0,
            ORDER_AGGREGATE,
            OrderCommand::CompleteOrder(CompleteOrder {
                tenant_id,
                order_id,
                completed_by: actor,
                occurred_at: Utc::now(),
            }),
            |_, id| Order::empty(OrderId(id)),
        )?;
        self.order_read_model(tenant_id, order_key)
    }

    /// Cancelling releases whatever the order still reserves.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn cancel_order(&self, tenant_id: TenantId, order_key: &str) -> WorkflowResult<OrderReadModel> {
        let _guard = self.lock();
        let order_id = order_id_for_key(tenant_id, order_key);
        self.execute(
            tenant_id,
            order_id.0,
            ORDER_AGGREGATE,
            OrderCommand::CancelOrder(CancelOrder {
                tenant_id,
                order_id,
                occurred_at: Utc::now(),
            }),
            |_, id| Order::empty(OrderId(id)),
        )?;
        self.order_read_model(tenant_id, order_key)
    }

    pub(super) fn order(&self, tenant_id: TenantId, order_key: &str) -> WorkflowResult<Order> {
        let order: Order = self.load(
            tenant_id,
            order_id_for_key(tenant_id, order_key).0,
            ORDER_AGGREGATE,
            |_, id| Order::empty(OrderId(id)),
        )?;
        if !order.is_created() {
            return Err(DomainError::not_found().into());
        }
        Ok(order)
    }

    fn order_read_model(&self, tenant_id: TenantId, order_key: &str) -> WorkflowResult<OrderReadModel> {
        self.models
            .orders
            .get(tenant_id, order_key)
            .ok_or_else(|| DomainError::not_found().into())
    }
}
