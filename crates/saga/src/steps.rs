//! Saga types and the steps they are made of.

use common::{AggregateId, UserId};
use domain::{OrderItem, ProductId, ReturnType};
use serde::{Deserialize, Serialize};

/// Saga type: assemble, persist, reserve stock, clear the cart.
pub const PLACE_ORDER: &str = "PlaceOrder";

/// Saga type: restock everything a whole-order cancellation released.
pub const CANCEL_ORDER: &str = "CancelOrder";

/// Saga type: restock a single canceled item.
pub const CANCEL_ORDER_ITEM: &str = "CancelOrderItem";

/// Saga type: open the refund or replace order for a returned item.
pub const RETURN_ITEM: &str = "ReturnItem";

pub const STEP_PERSIST_ORDER: &str = "persist_order";
pub const STEP_CLEAR_CART: &str = "clear_cart";
pub const STEP_VOID_ORDER: &str = "void_order";
pub const STEP_PLACE_RETURN_ORDER: &str = "place_return_order";

/// One unit of work in a saga.
///
/// Steps are planned up front and recorded in the saga's log, so a
/// suspended saga knows exactly what is left to do when it is resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SagaStep {
    /// Write the order to the journal. Always recorded as completed when
    /// the saga opens, since the order command commits first.
    PersistOrder,

    /// Take stock for one placed item.
    ReserveStock {
        product_id: ProductId,
        quantity: u32,
    },

    /// Hand stock back for one released or un-reserved item.
    Restock {
        product_id: ProductId,
        quantity: u32,
    },

    /// Drop the ordered lines from the buyer's cart.
    ClearCart {
        buyer_id: UserId,
        product_ids: Vec<ProductId>,
    },

    /// Mark an order whose reservation failed as dead.
    VoidOrder { reason: String },

    /// Create the refund or replace order for a returned item.
    PlaceReturnOrder {
        return_order_id: AggregateId,
        buyer_id: UserId,
        return_type: ReturnType,
        item: OrderItem,
    },
}

impl SagaStep {
    /// Name recorded in step events. Unique within one saga.
    pub fn name(&self) -> String {
        match self {
            SagaStep::PersistOrder => STEP_PERSIST_ORDER.to_string(),
            SagaStep::ReserveStock { product_id, .. } => format!("reserve_inventory:{product_id}"),
            SagaStep::Restock { product_id, .. } => format!("restock:{product_id}"),
            SagaStep::ClearCart { .. } => STEP_CLEAR_CART.to_string(),
            SagaStep::VoidOrder { .. } => STEP_VOID_ORDER.to_string(),
            SagaStep::PlaceReturnOrder { .. } => STEP_PLACE_RETURN_ORDER.to_string(),
        }
    }

    /// Failures of this step are undone by compensation rather than
    /// suspending the saga.
    pub fn is_compensable(&self) -> bool {
        matches!(self, SagaStep::ReserveStock { .. })
    }

    /// The compensating step for a completed step, if it has one.
    pub fn compensation(&self) -> Option<SagaStep> {
        match self {
            SagaStep::ReserveStock {
                product_id,
                quantity,
            } => Some(SagaStep::Restock {
                product_id: product_id.clone(),
                quantity: *quantity,
            }),
            _ => None,
        }
    }
}
