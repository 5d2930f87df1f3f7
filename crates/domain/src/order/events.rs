//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{
    ItemStatus, Money, OrderItem, OrderStatus, OrderType, ProductId, ReleasedItem, ReturnType,
};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was assembled and persisted with its full item list.
    OrderPlaced(OrderPlacedData),

    /// Header status moved.
    StatusChanged(StatusChangedData),

    /// A seller moved one of their items.
    ItemStatusChanged(ItemStatusChangedData),

    /// A seller rejected one of their items; a cancellation of that item follows.
    ItemRejected(ItemRejectedData),

    /// A single item was deactivated.
    ItemCancelled(ItemCancelledData),

    /// Whole order was canceled; `released` lists what was still active.
    OrderCancelled(OrderCancelledData),

    /// Placement could not reserve stock; the order is kept but dead.
    OrderVoided(OrderVoidedData),

    /// The buyer asked to return an item.
    ItemReturnRequested(ItemReturnRequestedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::StatusChanged(_) => "StatusChanged",
            OrderEvent::ItemStatusChanged(_) => "ItemStatusChanged",
            OrderEvent::ItemRejected(_) => "ItemRejected",
            OrderEvent::ItemCancelled(_) => "ItemCancelled",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::OrderVoided(_) => "OrderVoided",
            OrderEvent::ItemReturnRequested(_) => "ItemReturnRequested",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub buyer_id: UserId,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    /// Σ price×quantity at assembly time. Never recomputed.
    pub total: Money,
    /// Original order when this is a return order.
    pub return_of: Option<AggregateId>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStatusChangedData {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub from: ItemStatus,
    pub to: ItemStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRejectedData {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub rejected_at: DateTime<Utc>,
}

/// Who asked for an item to be canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    Buyer,
    SellerRejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCancelledData {
    pub product_id: ProductId,
    /// Original ordered quantity, handed back to inventory.
    pub quantity: u32,
    pub reason: CancelReason,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub released: Vec<ReleasedItem>,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderVoidedData {
    pub reason: String,
    pub voided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReturnRequestedData {
    pub product_id: ProductId,
    pub return_order_id: AggregateId,
    pub return_type: ReturnType,
    pub requested_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn order_placed(
        order_id: AggregateId,
        buyer_id: UserId,
        order_type: OrderType,
        items: Vec<OrderItem>,
        return_of: Option<AggregateId>,
    ) -> Self {
        let total = items.iter().map(OrderItem::total_price).sum();
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            buyer_id,
            order_type,
            status: OrderStatus::initial_for(order_type),
            items,
            total,
            return_of,
            placed_at: Utc::now(),
        })
    }

    pub fn status_changed(from: OrderStatus, to: OrderStatus) -> Self {
        OrderEvent::StatusChanged(StatusChangedData {
            from,
            to,
            changed_at: Utc::now(),
        })
    }

    pub fn item_status_changed(
        product_id: ProductId,
        seller_id: UserId,
        from: ItemStatus,
        to: ItemStatus,
    ) -> Self {
        OrderEvent::ItemStatusChanged(ItemStatusChangedData {
            product_id,
            seller_id,
            from,
            to,
            changed_at: Utc::now(),
        })
    }

    pub fn item_rejected(product_id: ProductId, seller_id: UserId) -> Self {
        OrderEvent::ItemRejected(ItemRejectedData {
            product_id,
            seller_id,
            rejected_at: Utc::now(),
        })
    }

    pub fn item_cancelled(product_id: ProductId, quantity: u32, reason: CancelReason) -> Self {
        OrderEvent::ItemCancelled(ItemCancelledData {
            product_id,
            quantity,
            reason,
            cancelled_at: Utc::now(),
        })
    }

    pub fn order_cancelled(released: Vec<ReleasedItem>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            released,
            cancelled_at: Utc::now(),
        })
    }

    pub fn order_voided(reason: impl Into<String>) -> Self {
        OrderEvent::OrderVoided(OrderVoidedData {
            reason: reason.into(),
            voided_at: Utc::now(),
        })
    }

    pub fn item_return_requested(
        product_id: ProductId,
        return_order_id: AggregateId,
        return_type: ReturnType,
    ) -> Self {
        OrderEvent::ItemReturnRequested(ItemReturnRequestedData {
            product_id,
            return_order_id,
            return_type,
            requested_at: Utc::now(),
        })
    }

    /// Stock this event hands back to inventory.
    pub fn released_stock(&self) -> Vec<ReleasedItem> {
        match self {
            OrderEvent::ItemCancelled(data) => vec![ReleasedItem {
                product_id: data.product_id.clone(),
                quantity: data.quantity,
            }],
            OrderEvent::OrderCancelled(data) => data.released.clone(),
            _ => Vec::new(),
        }
    }
}
