//! Reactions to order events.
//!
//! A seller rejecting an item is recorded as an `ItemRejected` fact on the
//! order. Cancelling the item is a separate command issued here, so the two
//! can be tested and retried on their own.

use common::AggregateId;
use domain::{CancelOrderItem, ItemStatus, Order};

/// Cancellations still owed by `order`: one per item a seller rejected that
/// is still active.
///
/// Reads the order rather than the events of the last write, so repeating a
/// rejection whose cancellation failed issues the cancellation again.
pub fn follow_up_commands(order_id: AggregateId, order: &Order) -> Vec<CancelOrderItem> {
    if order.is_terminal() {
        return Vec::new();
    }
    order
        .active_items()
        .filter(|item| item.status == ItemStatus::Rejected)
        .map(|item| CancelOrderItem::rejected(order_id, item.product_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;
    use domain::{Aggregate, CancelReason, Money, OrderEvent, OrderItem, OrderType, ProductId};

    struct Fixture {
        order_id: AggregateId,
        order: Order,
        seller_a: UserId,
        seller_b: UserId,
    }

    fn placed() -> Fixture {
        let order_id = AggregateId::new();
        let seller_a = UserId::new();
        let seller_b = UserId::new();
        let mut order = Order::default();
        let events = order
            .place(
                order_id,
                UserId::new(),
                OrderType::Delivery,
                vec![
                    OrderItem::new("p1", seller_a, "Lamp", 2, Money::from_dollars(50)),
                    OrderItem::new("p2", seller_b, "Mug", 1, Money::from_dollars(30)),
                ],
                None,
            )
            .unwrap();
        order.apply_events(events);
        Fixture {
            order_id,
            order,
            seller_a,
            seller_b,
        }
    }

    fn p(id: &str) -> ProductId {
        ProductId::new(id)
    }

    #[test]
    fn rejection_becomes_cancellation() {
        let mut f = placed();
        f.order
            .apply_events(vec![OrderEvent::item_rejected(p("p2"), f.seller_b)]);

        let commands = follow_up_commands(f.order_id, &f.order);

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].order_id, f.order_id);
        assert_eq!(commands[0].product_id, p("p2"));
        assert_eq!(commands[0].reason, CancelReason::SellerRejected);
    }

    #[test]
    fn rejection_still_owed_after_an_unrelated_write() {
        let mut f = placed();
        f.order
            .apply_events(vec![OrderEvent::item_rejected(p("p2"), f.seller_b)]);
        f.order.apply_events(vec![OrderEvent::item_status_changed(
            p("p1"),
            f.seller_a,
            ItemStatus::Requested,
            ItemStatus::Accepted,
        )]);

        let commands = follow_up_commands(f.order_id, &f.order);

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].product_id, p("p2"));
    }

    #[test]
    fn cancelled_rejection_needs_nothing() {
        let mut f = placed();
        f.order
            .apply_events(vec![OrderEvent::item_rejected(p("p2"), f.seller_b)]);
        let events = f
            .order
            .cancel_item(&p("p2"), CancelReason::SellerRejected)
            .unwrap();
        f.order.apply_events(events);

        assert!(follow_up_commands(f.order_id, &f.order).is_empty());
    }

    #[test]
    fn other_statuses_need_nothing() {
        let mut f = placed();
        f.order.apply_events(vec![OrderEvent::item_status_changed(
            p("p1"),
            f.seller_a,
            ItemStatus::Requested,
            ItemStatus::Accepted,
        )]);

        assert!(follow_up_commands(f.order_id, &f.order).is_empty());
    }
}
