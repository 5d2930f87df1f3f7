//! Cart endpoints backing the in-memory cart collaborator.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::UserId;
use event_store::EventStore;
use saga::{Cart, CartLine, CartReader, InventoryLedger};
use serde::Deserialize;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AddLineRequest {
    pub product_id: String,
    pub seller_id: String,
    pub product_name: String,
    pub quantity: u32,
}

/// GET /carts/{buyer_id}
#[tracing::instrument(skip(state))]
pub async fn get<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(buyer_id): Path<String>,
) -> Result<Json<Cart>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let buyer: UserId = parse_id("buyer_id", &buyer_id)?;
    let cart = state
        .carts
        .get_cart(buyer)
        .await
        .map_err(saga::SagaError::from)?
        .unwrap_or_default();
    Ok(Json(cart))
}

/// POST /carts/{buyer_id}/lines: add or replace a cart line.
#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id))]
pub async fn add_line<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(buyer_id): Path<String>,
    Json(req): Json<AddLineRequest>,
) -> Result<StatusCode, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let buyer: UserId = parse_id("buyer_id", &buyer_id)?;
    let seller: UserId = parse_id("seller_id", &req.seller_id)?;
    if req.quantity == 0 {
        return Err(ApiError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    state
        .carts
        .add_line(
            buyer,
            CartLine::new(req.product_id, seller, req.product_name, req.quantity),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}
