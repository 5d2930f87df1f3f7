//! Value objects for the order domain.

use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use super::state::ItemStatus;

/// Product identifier (SKU), shared with the catalog, cart and inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Money amount in cents.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars.saturating_mul(100))
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Price of `quantity` units at this unit price, saturating at the
    /// bounds of `i64`. Use [`Money::checked_multiply`] to detect overflow.
    pub fn multiply(&self, quantity: u32) -> Money {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }

    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Kind of order. Delivery orders come from a cart; refund and replace
/// orders are opened by a return request against a delivered order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[default]
    Delivery,
    Refund,
    Replace,
}

impl OrderType {
    pub fn is_return(&self) -> bool {
        matches!(self, OrderType::Refund | OrderType::Replace)
    }
}

/// What the buyer wants back for a returned item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnType {
    Refund,
    Replace,
}

impl ReturnType {
    /// Type of the order opened for this return.
    pub fn order_type(&self) -> OrderType {
        match self {
            ReturnType::Refund => OrderType::Refund,
            ReturnType::Replace => OrderType::Replace,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnType::Refund => "Refund",
            ReturnType::Replace => "Replace",
        }
    }
}

impl std::fmt::Display for ReturnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReturnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refund" => Ok(ReturnType::Refund),
            "replace" => Ok(ReturnType::Replace),
            _ => Err(s.to_string()),
        }
    }
}

/// A line of an order.
///
/// Name and unit price are snapshots taken when the order was assembled.
/// Items are never removed: cancellation only clears `active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub active: bool,
    pub status: ItemStatus,
    /// Return order opened for this item, if any.
    #[serde(default)]
    pub return_order_id: Option<AggregateId>,
}

impl OrderItem {
    /// Creates an active item in `Requested` status.
    pub fn new(
        product_id: impl Into<ProductId>,
        seller_id: UserId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            seller_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
            active: true,
            status: ItemStatus::Requested,
            return_order_id: None,
        }
    }

    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Stock handed back by a cancellation: the item's original quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}
