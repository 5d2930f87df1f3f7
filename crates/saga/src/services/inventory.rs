//! Inventory ledger: the only way stock changes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ErrorKind;
use domain::ProductId;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("No inventory record for product {0}")]
    ProductNotFound(ProductId),

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u64,
    },

    #[error("Inventory unavailable: {0}")]
    Unavailable(String),

    #[error("Inventory database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::ProductNotFound(_) => ErrorKind::NotFound,
            InventoryError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            InventoryError::Unavailable(_) | InventoryError::Database(_) => ErrorKind::Internal,
        }
    }
}

/// Stock counts per product.
///
/// `decrease` and `increase` are individually atomic and stock never goes
/// negative: a decrease that doesn't fit is rejected and changes nothing.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Takes `quantity` units. Returns the remaining stock.
    async fn decrease(&self, product_id: &ProductId, quantity: u32) -> Result<u64, InventoryError>;

    /// Returns `quantity` units. Returns the new stock.
    async fn increase(&self, product_id: &ProductId, quantity: u32) -> Result<u64, InventoryError>;

    async fn stock(&self, product_id: &ProductId) -> Result<u64, InventoryError>;

    /// Creates or overwrites a product's stock record.
    async fn set_stock(&self, product_id: &ProductId, stock: u64) -> Result<(), InventoryError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    stock: HashMap<ProductId, u64>,
    fail_on_increase: bool,
}

/// In-memory ledger. One write lock makes each check-and-update linear.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryLedger {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger seeded with the given stock counts.
    pub fn with_stock<P: Into<ProductId>>(entries: impl IntoIterator<Item = (P, u64)>) -> Self {
        let stock = entries
            .into_iter()
            .map(|(product_id, count)| (product_id.into(), count))
            .collect();
        Self {
            state: Arc::new(RwLock::new(InMemoryInventoryState {
                stock,
                fail_on_increase: false,
            })),
        }
    }

    /// Makes every `increase` fail until switched off.
    pub async fn set_fail_on_increase(&self, fail: bool) {
        self.state.write().await.fail_on_increase = fail;
    }
}

#[async_trait]
impl InventoryLedger for InMemoryInventoryLedger {
    async fn decrease(&self, product_id: &ProductId, quantity: u32) -> Result<u64, InventoryError> {
        let mut state = self.state.write().await;
        let stock = state
            .stock
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))?;

        let requested = u64::from(quantity);
        if *stock < requested {
            return Err(InventoryError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: *stock,
            });
        }
        *stock -= requested;
        Ok(*stock)
    }

    async fn increase(&self, product_id: &ProductId, quantity: u32) -> Result<u64, InventoryError> {
        let mut state = self.state.write().await;
        if state.fail_on_increase {
            return Err(InventoryError::Unavailable("restock rejected".to_string()));
        }
        let stock = state
            .stock
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))?;
        *stock += u64::from(quantity);
        Ok(*stock)
    }

    async fn stock(&self, product_id: &ProductId) -> Result<u64, InventoryError> {
        self.state
            .read()
            .await
            .stock
            .get(product_id)
            .copied()
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))
    }

    async fn set_stock(&self, product_id: &ProductId, stock: u64) -> Result<(), InventoryError> {
        self.state
            .write()
            .await
            .stock
            .insert(product_id.clone(), stock);
        Ok(())
    }
}

/// PostgreSQL ledger backed by the `inventory` table.
///
/// Each mutation is a single conditional `UPDATE`, so the row lock taken by
/// the database linearizes concurrent decreases on one product.
#[derive(Clone)]
pub struct PostgresInventoryLedger {
    pool: PgPool,
}

impl PostgresInventoryLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_stock(&self, product_id: &ProductId) -> Result<Option<i64>, InventoryError> {
        let stock = sqlx::query_scalar("SELECT stock FROM inventory WHERE product_id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(stock)
    }
}

fn to_count(stock: i64) -> u64 {
    u64::try_from(stock).unwrap_or_default()
}

#[async_trait]
impl InventoryLedger for PostgresInventoryLedger {
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn decrease(&self, product_id: &ProductId, quantity: u32) -> Result<u64, InventoryError> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE inventory SET stock = stock - $2, updated_at = NOW()
            WHERE product_id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(to_count(remaining));
        }

        match self.current_stock(product_id).await? {
            Some(available) => Err(InventoryError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: to_count(available),
            }),
            None => Err(InventoryError::ProductNotFound(product_id.clone())),
        }
    }

    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn increase(&self, product_id: &ProductId, quantity: u32) -> Result<u64, InventoryError> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE inventory SET stock = stock + $2, updated_at = NOW()
            WHERE product_id = $1
            RETURNING stock
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        stock
            .map(to_count)
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))
    }

    async fn stock(&self, product_id: &ProductId) -> Result<u64, InventoryError> {
        self.current_stock(product_id)
            .await?
            .map(to_count)
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))
    }

    async fn set_stock(&self, product_id: &ProductId, stock: u64) -> Result<(), InventoryError> {
        let stock = i64::try_from(stock)
            .map_err(|_| InventoryError::Unavailable(format!("stock {stock} out of range")))?;
        sqlx::query(
            r#"
            INSERT INTO inventory (product_id, stock, updated_at) VALUES ($1, $2, NOW())
            ON CONFLICT (product_id) DO UPDATE SET stock = EXCLUDED.stock, updated_at = NOW()
            "#,
        )
        .bind(product_id.as_str())
        .bind(stock)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
