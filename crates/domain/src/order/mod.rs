//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::*;
pub use events::{
    CancelReason, ItemCancelledData, ItemRejectedData, ItemReturnRequestedData,
    ItemStatusChangedData, OrderCancelledData, OrderEvent, OrderPlacedData, OrderVoidedData,
    StatusChangedData,
};
pub use service::OrderService;
pub use state::{ItemStatus, OrderStatus, UnknownStatus};
pub use value_objects::{Money, OrderItem, OrderType, ProductId, ReleasedItem, ReturnType};

use common::{AggregateId, ErrorKind};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order has no items")]
    NoItems,

    #[error("Invalid quantity for {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId },

    #[error("Invalid price {price} for {product_id} (must be greater than 0)")]
    InvalidPrice { product_id: ProductId, price: i64 },

    #[error("Product {product_id} appears more than once")]
    DuplicateItem { product_id: ProductId },

    #[error("Order total is too large to represent")]
    TotalOverflow,

    #[error(transparent)]
    InvalidStatus(#[from] UnknownStatus),

    #[error("Order is {status}; no further transitions allowed")]
    Terminal { status: OrderStatus },

    #[error("Status {status} does not apply to {order_type:?} orders")]
    StatusNotApplicable {
        status: OrderStatus,
        order_type: OrderType,
    },

    #[error("Acceptance pending from seller")]
    AcceptancePending,

    #[error("Readiness pending from seller")]
    ReadinessPending,

    #[error("Item not found in order: {product_id}")]
    ItemNotFound { product_id: ProductId },

    #[error("Item not found for this seller: {product_id}")]
    ItemNotOwned { product_id: ProductId },

    #[error("Item {product_id} cannot move from {from} to {to}")]
    InvalidItemTransition {
        product_id: ProductId,
        from: ItemStatus,
        to: ItemStatus,
    },

    #[error("Item {product_id} is no longer active")]
    ItemInactive { product_id: ProductId },

    #[error("Order does not belong to this buyer")]
    NotOrderOwner,

    #[error("Only delivered orders can be returned (order is {status})")]
    NotDelivered { status: OrderStatus },

    #[error("Return already requested for {product_id} (return order {return_order_id})")]
    ReturnAlreadyRequested {
        product_id: ProductId,
        return_order_id: AggregateId,
    },
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Terminal { .. } | OrderError::NotOrderOwner => ErrorKind::Forbidden,
            OrderError::ItemNotFound { .. } | OrderError::ItemNotOwned { .. } => {
                ErrorKind::NotFound
            }
            OrderError::AlreadyPlaced => ErrorKind::Conflict,
            _ => ErrorKind::BadRequest,
        }
    }
}
