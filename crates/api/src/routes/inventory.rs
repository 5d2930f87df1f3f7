//! Stock endpoints for reading and seeding the inventory ledger.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::ProductId;
use event_store::EventStore;
use saga::InventoryLedger;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SetStockRequest {
    pub stock: u64,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub product_id: String,
    pub stock: u64,
}

/// GET /inventory/{product_id}
#[tracing::instrument(skip(state))]
pub async fn get<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(product_id): Path<String>,
) -> Result<Json<StockResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let stock = state.inventory.stock(&ProductId::new(&product_id)).await?;
    Ok(Json(StockResponse { product_id, stock }))
}

/// PUT /inventory/{product_id}: create or overwrite a stock record.
#[tracing::instrument(skip(state, req), fields(stock = req.stock))]
pub async fn set<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(product_id): Path<String>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<StockResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    state
        .inventory
        .set_stock(&ProductId::new(&product_id), req.stock)
        .await?;
    Ok(Json(StockResponse {
        product_id,
        stock: req.stock,
    }))
}
