//! Catalog price lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ErrorKind;
use domain::{Money, ProductId};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::ProductNotFound(_) => ErrorKind::NotFound,
            CatalogError::Unavailable(_) => ErrorKind::Internal,
        }
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// The live unit price of a product.
    async fn get_product_price(&self, product_id: &ProductId) -> Result<Money, CatalogError>;
}

/// In-memory price list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    prices: Arc<RwLock<HashMap<ProductId, Money>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, product_id: impl Into<ProductId>, price: Money) {
        self.prices.write().await.insert(product_id.into(), price);
    }

    /// Delists a product so lookups for it fail.
    pub async fn remove_product(&self, product_id: &ProductId) {
        self.prices.write().await.remove(product_id);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product_price(&self, product_id: &ProductId) -> Result<Money, CatalogError> {
        self.prices
            .read()
            .await
            .get(product_id)
            .copied()
            .ok_or_else(|| CatalogError::ProductNotFound(product_id.clone()))
    }
}
