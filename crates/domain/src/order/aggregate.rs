//! Order aggregate implementation.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::Serialize;

use crate::aggregate::Aggregate;

use super::{
    CancelReason, ItemStatus, Money, OrderError, OrderEvent, OrderItem, OrderStatus, OrderType,
    ProductId, ReleasedItem, ReturnType,
    events::{OrderPlacedData, StatusChangedData},
};

/// Order aggregate root: the header plus its full item list, treated as one
/// unit of consistency.
///
/// Items keep their assembly order and are never removed. Cancellation only
/// clears `active`, so `total` stays the snapshot computed at placement;
/// [`Order::active_total`] gives the current value.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    buyer_id: Option<UserId>,
    order_type: OrderType,
    status: OrderStatus,
    items: Vec<OrderItem>,
    #[serde(skip)]
    index: HashMap<ProductId, usize>,
    total: Money,
    placed_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    returned_at: Option<DateTime<Utc>>,
    return_of: Option<AggregateId>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::StatusChanged(data) => self.apply_status_changed(data),
            OrderEvent::ItemStatusChanged(data) => {
                if let Some(item) = self.item_mut(&data.product_id) {
                    item.status = data.to;
                }
            }
            OrderEvent::ItemRejected(data) => {
                if let Some(item) = self.item_mut(&data.product_id) {
                    item.status = ItemStatus::Rejected;
                }
            }
            OrderEvent::ItemCancelled(data) => {
                if let Some(item) = self.item_mut(&data.product_id) {
                    item.active = false;
                }
            }
            OrderEvent::OrderCancelled(_) | OrderEvent::OrderVoided(_) => {
                for item in &mut self.items {
                    item.active = false;
                }
                self.status = OrderStatus::Canceled;
            }
            OrderEvent::ItemReturnRequested(data) => {
                if let Some(item) = self.item_mut(&data.product_id) {
                    item.return_order_id = Some(data.return_order_id);
                }
            }
        }
    }
}

// Query methods
impl Order {
    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// All items in assembly order, inactive ones included.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, product_id: &ProductId) -> Option<&OrderItem> {
        self.index.get(product_id).and_then(|&i| self.items.get(i))
    }

    pub fn active_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|item| item.active)
    }

    pub fn active_item_count(&self) -> usize {
        self.active_items().count()
    }

    /// Total as assembled. Not reduced by cancellations.
    pub fn total(&self) -> Money {
        self.total
    }

    /// Σ price×quantity over the items that are still active.
    pub fn active_total(&self) -> Money {
        self.active_items().map(OrderItem::total_price).sum()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    /// Original order, for refund and replace orders.
    pub fn return_of(&self) -> Option<AggregateId> {
        self.return_of
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods (return events)
impl Order {
    /// Places a new order with its full item list.
    pub fn place(
        &self,
        order_id: AggregateId,
        buyer_id: UserId,
        order_type: OrderType,
        items: Vec<OrderItem>,
        return_of: Option<AggregateId>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id.clone(),
                });
            }
            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id.clone(),
                    price: item.unit_price.cents(),
                });
            }
            if !seen.insert(item.product_id.clone()) {
                return Err(OrderError::DuplicateItem {
                    product_id: item.product_id.clone(),
                });
            }
        }

        let total = items.iter().try_fold(Money::zero(), |acc, item| {
            item.unit_price
                .checked_multiply(item.quantity)
                .and_then(|line| acc.checked_add(line))
        });
        if total.is_none() {
            return Err(OrderError::TotalOverflow);
        }

        Ok(vec![OrderEvent::order_placed(
            order_id, buyer_id, order_type, items, return_of,
        )])
    }

    /// Moves the header status.
    ///
    /// A terminal order refuses every target, `Canceled` included. Otherwise
    /// `Canceled` is delegated to [`Order::cancel`] so stock release is
    /// always recorded. Moving to the current status is a no-op.
    pub fn change_status(&self, target: OrderStatus) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::Terminal {
                status: self.status,
            });
        }
        if target == OrderStatus::Canceled {
            return self.cancel();
        }
        if !target.applies_to(self.order_type) {
            return Err(OrderError::StatusNotApplicable {
                status: target,
                order_type: self.order_type,
            });
        }
        if target == self.status {
            return Ok(vec![]);
        }

        match target {
            OrderStatus::Confirmed
                if self
                    .active_items()
                    .any(|item| item.status != ItemStatus::Accepted) =>
            {
                Err(OrderError::AcceptancePending)
            }
            OrderStatus::Processing
                if self
                    .active_items()
                    .any(|item| item.status != ItemStatus::Ready) =>
            {
                Err(OrderError::ReadinessPending)
            }
            _ => Ok(vec![OrderEvent::status_changed(self.status, target)]),
        }
    }

    /// Moves one item's status on behalf of its seller.
    ///
    /// A rejection is recorded as [`OrderEvent::ItemRejected`]; deactivating
    /// the item is left to a follow-up cancellation.
    pub fn change_item_status(
        &self,
        seller_id: UserId,
        product_id: &ProductId,
        target: ItemStatus,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let item = self.find_item(product_id)?;
        if item.seller_id != seller_id {
            return Err(OrderError::ItemNotOwned {
                product_id: product_id.clone(),
            });
        }
        if self.status.is_terminal() {
            return Err(OrderError::Terminal {
                status: self.status,
            });
        }
        if !item.active {
            return Err(OrderError::ItemInactive {
                product_id: product_id.clone(),
            });
        }
        if item.status == target {
            return Ok(vec![]);
        }
        if !item.status.can_transition_to(target) {
            return Err(OrderError::InvalidItemTransition {
                product_id: product_id.clone(),
                from: item.status,
                to: target,
            });
        }

        let event = if target == ItemStatus::Rejected {
            OrderEvent::item_rejected(product_id.clone(), seller_id)
        } else {
            OrderEvent::item_status_changed(product_id.clone(), seller_id, item.status, target)
        };
        Ok(vec![event])
    }

    /// Deactivates one item.
    ///
    /// An already inactive item produces no events. When the last active
    /// item goes, the header moves to `Canceled` in the same batch; that
    /// status change releases no stock of its own.
    pub fn cancel_item(
        &self,
        product_id: &ProductId,
        reason: CancelReason,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let item = self.find_item(product_id)?;
        if !item.active {
            return Ok(vec![]);
        }
        if self.status.is_terminal() {
            return Err(OrderError::Terminal {
                status: self.status,
            });
        }

        let mut events = vec![OrderEvent::item_cancelled(
            product_id.clone(),
            item.quantity,
            reason,
        )];
        if self.active_item_count() == 1 {
            events.push(OrderEvent::status_changed(
                self.status,
                OrderStatus::Canceled,
            ));
        }
        Ok(events)
    }

    /// Cancels the whole order, releasing the original quantity of every
    /// item that is still active. Canceling a canceled order is a no-op.
    pub fn cancel(&self) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status == OrderStatus::Canceled {
            return Ok(vec![]);
        }
        if self.status.is_terminal() {
            return Err(OrderError::Terminal {
                status: self.status,
            });
        }

        let released = self
            .active_items()
            .map(|item| ReleasedItem {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .collect();
        Ok(vec![OrderEvent::order_cancelled(released)])
    }

    /// Marks a freshly placed order dead after its stock could not be
    /// reserved. Releases nothing: the caller undoes its own reservations.
    pub fn void(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status == OrderStatus::Canceled {
            return Ok(vec![]);
        }
        if self.status.is_terminal() {
            return Err(OrderError::Terminal {
                status: self.status,
            });
        }
        Ok(vec![OrderEvent::order_voided(reason)])
    }

    /// Records a return request against a delivered item.
    pub fn request_return(
        &self,
        buyer_id: UserId,
        product_id: &ProductId,
        return_order_id: AggregateId,
        return_type: ReturnType,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.buyer_id != Some(buyer_id) {
            return Err(OrderError::NotOrderOwner);
        }
        let item = self.find_item(product_id)?;
        if self.status != OrderStatus::Delivered {
            return Err(OrderError::NotDelivered {
                status: self.status,
            });
        }
        if !item.active {
            return Err(OrderError::ItemInactive {
                product_id: product_id.clone(),
            });
        }
        if let Some(existing) = item.return_order_id {
            return Err(OrderError::ReturnAlreadyRequested {
                product_id: product_id.clone(),
                return_order_id: existing,
            });
        }

        Ok(vec![OrderEvent::item_return_requested(
            product_id.clone(),
            return_order_id,
            return_type,
        )])
    }

    fn find_item(&self, product_id: &ProductId) -> Result<&OrderItem, OrderError> {
        self.item(product_id).ok_or_else(|| OrderError::ItemNotFound {
            product_id: product_id.clone(),
        })
    }
}

// Apply event helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.buyer_id = Some(data.buyer_id);
        self.order_type = data.order_type;
        self.status = data.status;
        self.index = data
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.product_id.clone(), i))
            .collect();
        self.items = data.items;
        self.total = data.total;
        self.placed_at = Some(data.placed_at);
        self.return_of = data.return_of;
    }

    fn apply_status_changed(&mut self, data: StatusChangedData) {
        self.status = data.to;
        match data.to {
            OrderStatus::Delivered => self.delivered_at = Some(data.changed_at),
            OrderStatus::Refunded | OrderStatus::Replaced => {
                self.returned_at = Some(data.changed_at)
            }
            _ => {}
        }
    }

    fn item_mut(&mut self, product_id: &ProductId) -> Option<&mut OrderItem> {
        let i = *self.index.get(product_id)?;
        self.items.get_mut(i)
    }
}
