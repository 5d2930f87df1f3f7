//! Order service: the persistence-facing API for order commands and reads.

use common::{AggregateId, UserId};
use event_store::EventStore;

use crate::aggregate::DomainEvent;
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    CancelOrder, CancelOrderItem, Order, OrderEvent, PlaceOrder, RequestReturn, UpdateItemStatus,
    UpdateOrderStatus, VoidOrder,
};

/// Service for managing orders.
///
/// Wraps the command handler so every mutation goes through load, decide
/// and a version-checked append. Knows nothing about inventory or carts;
/// side effects belong to the saga layer.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, buyer_id = %cmd.buyer_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<CommandResult<Order>, DomainError> {
        let PlaceOrder {
            order_id,
            buyer_id,
            order_type,
            items,
            return_of,
        } = cmd;

        let result = self
            .handler
            .execute(order_id, |order| {
                order.place(order_id, buyer_id, order_type, items, return_of)
            })
            .await?;

        metrics::counter!("orders_placed_total", "order_type" => format!("{order_type:?}"))
            .increment(1);
        tracing::info!(total = %result.aggregate.total(), "order placed");
        Ok(result)
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn update_status(
        &self,
        cmd: UpdateOrderStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute_existing(cmd.order_id, |order| order.change_status(cmd.status))
            .await?;
        record_transitions(&result.events);
        Ok(result)
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, product_id = %cmd.product_id))]
    pub async fn update_item_status(
        &self,
        cmd: UpdateItemStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_existing(cmd.order_id, |order| {
                order.change_item_status(cmd.seller_id, &cmd.product_id, cmd.status)
            })
            .await
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn cancel_order(
        &self,
        cmd: CancelOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute_existing(cmd.order_id, |order| order.cancel())
            .await?;
        record_transitions(&result.events);
        Ok(result)
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, product_id = %cmd.product_id))]
    pub async fn cancel_item(
        &self,
        cmd: CancelOrderItem,
    ) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute_existing(cmd.order_id, |order| {
                order.cancel_item(&cmd.product_id, cmd.reason)
            })
            .await?;
        record_transitions(&result.events);
        Ok(result)
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn void_order(&self, cmd: VoidOrder) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute_existing(cmd.order_id, |order| order.void(cmd.reason.as_str()))
            .await?;
        record_transitions(&result.events);
        Ok(result)
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, product_id = %cmd.product_id))]
    pub async fn request_return(
        &self,
        cmd: RequestReturn,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_existing(cmd.order_id, |order| {
                order.request_return(
                    cmd.buyer_id,
                    &cmd.product_id,
                    cmd.return_order_id,
                    cmd.return_type,
                )
            })
            .await
    }

    /// Loads an order by ID, `None` if it doesn't exist.
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// Loads an order by ID, failing with a not-found error if absent.
    pub async fn require_order(&self, order_id: AggregateId) -> Result<Order, DomainError> {
        self.get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::AggregateNotFound {
                aggregate_type: "Order",
                aggregate_id: order_id.to_string(),
            })
    }

    /// Every order, oldest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        self.list_matching(|_| true).await
    }

    /// Orders placed by one buyer, oldest first.
    pub async fn list_orders_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Order>, DomainError> {
        self.list_matching(|placed_by| placed_by == buyer_id).await
    }

    async fn list_matching(
        &self,
        buyer_filter: impl Fn(UserId) -> bool,
    ) -> Result<Vec<Order>, DomainError> {
        let placements = self.handler.store().get_events_by_type("OrderPlaced").await?;

        let mut orders = Vec::new();
        for envelope in placements {
            let OrderEvent::OrderPlaced(data) = envelope.decode::<OrderEvent>()? else {
                continue;
            };
            if !buyer_filter(data.buyer_id) {
                continue;
            }
            if let Some(order) = self.get_order(data.order_id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}

fn record_transitions(events: &[OrderEvent]) {
    for event in events {
        match event {
            OrderEvent::StatusChanged(data) => {
                metrics::counter!("order_status_transitions_total", "to" => data.to.as_str())
                    .increment(1);
            }
            OrderEvent::ItemCancelled(_) => {
                metrics::counter!("order_items_cancelled_total").increment(1);
            }
            OrderEvent::OrderCancelled(_) | OrderEvent::OrderVoided(_) => {
                metrics::counter!("orders_cancelled_total", "event" => event.event_type())
                    .increment(1);
            }
            _ => {}
        }
    }
}
