//! Catalog price endpoint backing the in-memory catalog collaborator.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use domain::Money;
use event_store::EventStore;
use saga::InventoryLedger;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SetPriceRequest {
    pub price_cents: i64,
}

/// PUT /catalog/{product_id}/price
#[tracing::instrument(skip(state, req), fields(price_cents = req.price_cents))]
pub async fn set_price<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(product_id): Path<String>,
    Json(req): Json<SetPriceRequest>,
) -> Result<StatusCode, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let price = Money::from_cents(req.price_cents);
    if !price.is_positive() {
        return Err(ApiError::BadRequest(
            "price_cents must be greater than 0".to_string(),
        ));
    }

    state.catalog.set_price(product_id, price).await;
    Ok(StatusCode::NO_CONTENT)
}
