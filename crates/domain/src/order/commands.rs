//! Order commands.

use common::{AggregateId, UserId};

use crate::command::Command;

use super::{
    CancelReason, ItemStatus, Order, OrderItem, OrderStatus, OrderType, ProductId, ReturnType,
};

/// Command to persist a newly assembled order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
    pub buyer_id: UserId,
    pub order_type: OrderType,
    pub items: Vec<OrderItem>,
    pub return_of: Option<AggregateId>,
}

impl PlaceOrder {
    /// A delivery order with a generated ID.
    pub fn delivery(buyer_id: UserId, items: Vec<OrderItem>) -> Self {
        Self {
            order_id: AggregateId::new(),
            buyer_id,
            order_type: OrderType::Delivery,
            items,
            return_of: None,
        }
    }

    /// A refund or replace order for a single item of `original`.
    pub fn return_of(
        order_id: AggregateId,
        buyer_id: UserId,
        original: AggregateId,
        return_type: ReturnType,
        item: OrderItem,
    ) -> Self {
        Self {
            order_id,
            buyer_id,
            order_type: return_type.order_type(),
            items: vec![item],
            return_of: Some(original),
        }
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to move an order's header status.
#[derive(Debug, Clone)]
pub struct UpdateOrderStatus {
    pub order_id: AggregateId,
    pub status: OrderStatus,
}

impl UpdateOrderStatus {
    pub fn new(order_id: AggregateId, status: OrderStatus) -> Self {
        Self { order_id, status }
    }
}

impl Command for UpdateOrderStatus {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command from a seller to move one of their items.
#[derive(Debug, Clone)]
pub struct UpdateItemStatus {
    pub order_id: AggregateId,
    pub seller_id: UserId,
    pub product_id: ProductId,
    pub status: ItemStatus,
}

impl UpdateItemStatus {
    pub fn new(
        order_id: AggregateId,
        seller_id: UserId,
        product_id: impl Into<ProductId>,
        status: ItemStatus,
    ) -> Self {
        Self {
            order_id,
            seller_id,
            product_id: product_id.into(),
            status,
        }
    }
}

impl Command for UpdateItemStatus {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to cancel a whole order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
}

impl CancelOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to cancel a single item.
#[derive(Debug, Clone)]
pub struct CancelOrderItem {
    pub order_id: AggregateId,
    pub product_id: ProductId,
    pub reason: CancelReason,
}

impl CancelOrderItem {
    pub fn new(order_id: AggregateId, product_id: impl Into<ProductId>) -> Self {
        Self {
            order_id,
            product_id: product_id.into(),
            reason: CancelReason::Buyer,
        }
    }

    /// Cancellation issued in reaction to a seller rejecting the item.
    pub fn rejected(order_id: AggregateId, product_id: impl Into<ProductId>) -> Self {
        Self {
            order_id,
            product_id: product_id.into(),
            reason: CancelReason::SellerRejected,
        }
    }
}

impl Command for CancelOrderItem {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to mark an order dead after placement failed to reserve stock.
#[derive(Debug, Clone)]
pub struct VoidOrder {
    pub order_id: AggregateId,
    pub reason: String,
}

impl VoidOrder {
    pub fn new(order_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
        }
    }
}

impl Command for VoidOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command from a buyer to return one delivered item.
#[derive(Debug, Clone)]
pub struct RequestReturn {
    pub order_id: AggregateId,
    pub buyer_id: UserId,
    pub product_id: ProductId,
    pub return_order_id: AggregateId,
    pub return_type: ReturnType,
}

impl RequestReturn {
    pub fn new(
        order_id: AggregateId,
        buyer_id: UserId,
        product_id: impl Into<ProductId>,
        return_type: ReturnType,
    ) -> Self {
        Self {
            order_id,
            buyer_id,
            product_id: product_id.into(),
            return_order_id: AggregateId::new(),
            return_type,
        }
    }
}

impl Command for RequestReturn {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
