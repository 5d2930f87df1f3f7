//! Cart snapshot reader.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use domain::ProductId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Cart service unavailable: {0}")]
    Unavailable(String),
}

/// One line of a buyer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub product_name: String,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(
        product_id: impl Into<ProductId>,
        seller_id: UserId,
        product_name: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            seller_id,
            product_name: product_name.into(),
            quantity,
        }
    }
}

/// Snapshot of a buyer's cart at read time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Read access to carts, plus removal of lines consumed by an order.
#[async_trait]
pub trait CartReader: Send + Sync {
    /// The buyer's current cart, `None` if they have none.
    async fn get_cart(&self, buyer_id: UserId) -> Result<Option<Cart>, CartError>;

    /// Drops the lines for `product_ids`. Lines that are already gone are
    /// ignored, so retrying is safe.
    async fn remove_lines(&self, buyer_id: UserId, product_ids: &[ProductId])
    -> Result<(), CartError>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<UserId, Vec<CartLine>>,
    fail_on_remove: bool,
}

/// In-memory carts keyed by buyer. Adding a product already in the cart
/// replaces its line.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_line(&self, buyer_id: UserId, line: CartLine) {
        let mut state = self.state.write().await;
        let lines = state.carts.entry(buyer_id).or_default();
        lines.retain(|existing| existing.product_id != line.product_id);
        lines.push(line);
    }

    /// Makes `remove_lines` fail until switched off.
    pub async fn set_fail_on_remove(&self, fail: bool) {
        self.state.write().await.fail_on_remove = fail;
    }
}

#[async_trait]
impl CartReader for InMemoryCartStore {
    async fn get_cart(&self, buyer_id: UserId) -> Result<Option<Cart>, CartError> {
        let state = self.state.read().await;
        Ok(state.carts.get(&buyer_id).map(|lines| Cart {
            lines: lines.clone(),
        }))
    }

    async fn remove_lines(
        &self,
        buyer_id: UserId,
        product_ids: &[ProductId],
    ) -> Result<(), CartError> {
        let mut state = self.state.write().await;
        if state.fail_on_remove {
            return Err(CartError::Unavailable("remove rejected".to_string()));
        }
        if let Some(lines) = state.carts.get_mut(&buyer_id) {
            lines.retain(|line| !product_ids.contains(&line.product_id));
        }
        Ok(())
    }
}
