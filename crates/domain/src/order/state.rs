//! Order and item state machines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value_objects::OrderType;

/// A status string outside the accepted set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized status: {0}")]
pub struct UnknownStatus(pub String);

/// Lowercases and drops separators so `ReadyForDelivery`,
/// `ready_for_delivery` and `ready-for-delivery` parse the same.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Header status of an order.
///
/// Delivery orders:
/// ```text
/// Placed ──► Confirmed ──► Processing ──► ReadyForDelivery ──► Delivered
///    │           │             │                 │
///    └───────────┴─────────────┴─────────────────┴──► Canceled
/// ```
///
/// Return orders (`Refund` / `Replace`):
/// ```text
/// ReturnRequested ──► ReturnApproved ──► PickedUp ──► Refunded | Replaced
/// ```
/// plus `Canceled` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Placed,
    Confirmed,
    Processing,
    ReadyForDelivery,
    Delivered,
    Canceled,
    ReturnRequested,
    ReturnApproved,
    PickedUp,
    Refunded,
    Replaced,
}

impl OrderStatus {
    /// Status a freshly placed order of the given type starts in.
    pub fn initial_for(order_type: OrderType) -> Self {
        if order_type.is_return() {
            OrderStatus::ReturnRequested
        } else {
            OrderStatus::Placed
        }
    }

    /// No further transitions are allowed out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered
                | OrderStatus::Canceled
                | OrderStatus::Refunded
                | OrderStatus::Replaced
        )
    }

    /// Whether this status belongs to the status set of `order_type`.
    pub fn applies_to(&self, order_type: OrderType) -> bool {
        match self {
            OrderStatus::Canceled => true,
            OrderStatus::Placed
            | OrderStatus::Confirmed
            | OrderStatus::Processing
            | OrderStatus::ReadyForDelivery
            | OrderStatus::Delivered => !order_type.is_return(),
            OrderStatus::ReturnRequested
            | OrderStatus::ReturnApproved
            | OrderStatus::PickedUp
            | OrderStatus::Refunded
            | OrderStatus::Replaced => order_type.is_return(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::ReadyForDelivery => "ReadyForDelivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Canceled => "Canceled",
            OrderStatus::ReturnRequested => "ReturnRequested",
            OrderStatus::ReturnApproved => "ReturnApproved",
            OrderStatus::PickedUp => "PickedUp",
            OrderStatus::Refunded => "Refunded",
            OrderStatus::Replaced => "Replaced",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match normalize(s).as_str() {
            "placed" | "pending" => OrderStatus::Placed,
            "confirmed" => OrderStatus::Confirmed,
            "processing" => OrderStatus::Processing,
            "readyfordelivery" => OrderStatus::ReadyForDelivery,
            "delivered" => OrderStatus::Delivered,
            "canceled" | "cancelled" => OrderStatus::Canceled,
            "returnrequested" => OrderStatus::ReturnRequested,
            "returnapproved" => OrderStatus::ReturnApproved,
            "pickedup" => OrderStatus::PickedUp,
            "refunded" => OrderStatus::Refunded,
            "replaced" => OrderStatus::Replaced,
            _ => return Err(UnknownStatus(s.to_string())),
        };
        Ok(status)
    }
}

/// Per-item status, driven by the item's seller.
///
/// ```text
/// Requested ──► Accepted ──► Ready
///     │
///     └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemStatus {
    #[default]
    Requested,
    Accepted,
    Ready,
    Rejected,
}

impl ItemStatus {
    pub fn can_transition_to(&self, target: ItemStatus) -> bool {
        matches!(
            (self, target),
            (ItemStatus::Requested, ItemStatus::Accepted)
                | (ItemStatus::Requested, ItemStatus::Rejected)
                | (ItemStatus::Accepted, ItemStatus::Ready)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Requested => "Requested",
            ItemStatus::Accepted => "Accepted",
            ItemStatus::Ready => "Ready",
            ItemStatus::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "requested" => Ok(ItemStatus::Requested),
            "accepted" => Ok(ItemStatus::Accepted),
            "ready" => Ok(ItemStatus::Ready),
            "rejected" => Ok(ItemStatus::Rejected),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_and_separators() {
        assert_eq!("Pending".parse::<OrderStatus>(), Ok(OrderStatus::Placed));
        assert_eq!("cancelled".parse::<OrderStatus>(), Ok(OrderStatus::Canceled));
        assert_eq!("ready_for_delivery".parse::<OrderStatus>(), Ok(OrderStatus::ReadyForDelivery));
        assert_eq!("Ready-For-Delivery".parse::<OrderStatus>(), Ok(OrderStatus::ReadyForDelivery));
        assert!("Shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(OrderStatus::Replaced.is_terminal());
        assert!(!OrderStatus::Placed.is_terminal());
        assert!(!OrderStatus::PickedUp.is_terminal());
    }

    #[test]
    fn status_sets_are_per_order_type() {
        assert!(OrderStatus::Processing.applies_to(OrderType::Delivery));
        assert!(!OrderStatus::Processing.applies_to(OrderType::Refund));
        assert!(OrderStatus::PickedUp.applies_to(OrderType::Replace));
        assert!(!OrderStatus::Refunded.applies_to(OrderType::Delivery));
        assert!(OrderStatus::Canceled.applies_to(OrderType::Refund));
        assert_eq!(
            OrderStatus::initial_for(OrderType::Refund),
            OrderStatus::ReturnRequested
        );
    }

    #[test]
    fn item_transition_table() {
        use ItemStatus::*;
        assert!(Requested.can_transition_to(Accepted));
        assert!(Requested.can_transition_to(Rejected));
        assert!(Accepted.can_transition_to(Ready));
        assert!(!Accepted.can_transition_to(Rejected));
        assert!(!Ready.can_transition_to(Accepted));
        assert!(!Rejected.can_transition_to(Accepted));
        assert!(!Requested.can_transition_to(Ready));
    }

    #[test]
    fn item_status_parse() {
        assert_eq!("ACCEPTED".parse::<ItemStatus>(), Ok(ItemStatus::Accepted));
        assert!("shipped".parse::<ItemStatus>().is_err());
    }
}
