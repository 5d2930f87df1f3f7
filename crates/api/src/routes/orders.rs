//! Order endpoints: placement, status moves, cancellation and returns.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::UserId;
use domain::{
    Aggregate, ItemStatus, Order, OrderItem, OrderStatus, ProductId, ReleasedItem, ReturnType,
};
use event_store::EventStore;
use saga::{Cancellation, InventoryLedger, PlacedOrder, ReturnReceipt};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub buyer_id: String,
    /// One entry places a single-product order, several a batch order.
    pub product_ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub buyer_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct UpdateItemStatusRequest {
    pub seller_id: String,
    pub status: String,
}

#[derive(Deserialize)]
pub struct ReturnRequest {
    pub buyer_id: String,
    pub return_type: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: String,
    pub order_type: String,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    /// Total fixed at placement.
    pub total_cents: i64,
    /// Sum over items that are still active.
    pub active_total_cents: i64,
    pub placed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub return_of: Option<String>,
    pub version: i64,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub seller_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub active: bool,
    pub status: String,
    pub return_order_id: Option<String>,
}

#[derive(Serialize)]
pub struct PlacedOrderResponse {
    pub order: OrderResponse,
    pub saga_id: String,
    pub skipped: Vec<String>,
}

#[derive(Serialize)]
pub struct CancellationResponse {
    pub order: OrderResponse,
    pub released: Vec<ReleasedItem>,
    pub saga_id: Option<String>,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            seller_id: item.seller_id.to_string(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            active: item.active,
            status: item.status.to_string(),
            return_order_id: item.return_order_id.map(|id| id.to_string()),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            buyer_id: order
                .buyer_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            order_type: format!("{:?}", order.order_type()),
            status: order.status().to_string(),
            items: order.items().iter().map(OrderItemResponse::from).collect(),
            total_cents: order.total().cents(),
            active_total_cents: order.active_total().cents(),
            placed_at: order.placed_at(),
            delivered_at: order.delivered_at(),
            return_of: order.return_of().map(|id| id.to_string()),
            version: order.version().as_i64(),
        }
    }
}

impl From<PlacedOrder> for PlacedOrderResponse {
    fn from(placed: PlacedOrder) -> Self {
        Self {
            order: OrderResponse::from(&placed.order),
            saga_id: placed.saga_id.to_string(),
            skipped: placed.skipped.iter().map(ToString::to_string).collect(),
        }
    }
}

impl From<Cancellation> for CancellationResponse {
    fn from(cancellation: Cancellation) -> Self {
        Self {
            order: OrderResponse::from(&cancellation.order),
            released: cancellation.released,
            saga_id: cancellation.saga_id.map(|id| id.to_string()),
        }
    }
}

fn parse_order_status(value: &str) -> Result<OrderStatus, ApiError> {
    value
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))
}

fn parse_item_status(value: &str) -> Result<ItemStatus, ApiError> {
    value
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))
}

// -- Handlers --

/// POST /orders: place an order from the buyer's cart.
#[tracing::instrument(skip(state, req), fields(requested = req.product_ids.len()))]
pub async fn create<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrderResponse>), ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let buyer_id: UserId = parse_id("buyer_id", &req.buyer_id)?;
    let mut product_ids: Vec<ProductId> = req
        .product_ids
        .into_iter()
        .filter(|id| !id.trim().is_empty())
        .map(ProductId::new)
        .collect();

    let placed = match product_ids.len() {
        0 => return Err(ApiError::BadRequest("product_ids is empty".to_string())),
        1 => {
            let product_id = product_ids.remove(0);
            state
                .coordinator
                .create_single_order(buyer_id, product_id)
                .await?
        }
        _ => {
            state
                .coordinator
                .create_batch_order(buyer_id, product_ids)
                .await?
        }
    };

    Ok((StatusCode::CREATED, Json(placed.into())))
}

/// GET /orders: all orders, or one buyer's with `?buyer_id=`.
#[tracing::instrument(skip(state, query))]
pub async fn list<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let orders = match query.buyer_id {
        Some(buyer_id) => {
            let buyer_id: UserId = parse_id("buyer_id", &buyer_id)?;
            state.coordinator.list_orders_for_buyer(buyer_id).await?
        }
        None => state.coordinator.list_orders().await?,
    };

    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let order_id = parse_id("order id", &id)?;
    let order = state
        .coordinator
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/status: move the order header.
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_status<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let order_id = parse_id("order id", &id)?;
    let status = parse_order_status(&req.status)?;

    let order = state
        .coordinator
        .update_order_status(order_id, status)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/items/{product_id}/status: seller moves one item.
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_item_status<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path((id, product_id)): Path<(String, String)>,
    Json(req): Json<UpdateItemStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let order_id = parse_id("order id", &id)?;
    let seller_id: UserId = parse_id("seller_id", &req.seller_id)?;
    let status = parse_item_status(&req.status)?;

    let order = state
        .coordinator
        .update_item_status(order_id, seller_id, ProductId::new(product_id), status)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(id): Path<String>,
) -> Result<Json<CancellationResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let order_id = parse_id("order id", &id)?;
    let cancellation = state.coordinator.cancel_order(order_id).await?;
    Ok(Json(cancellation.into()))
}

/// POST /orders/{id}/items/{product_id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel_item<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path((id, product_id)): Path<(String, String)>,
) -> Result<Json<CancellationResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let order_id = parse_id("order id", &id)?;
    let cancellation = state
        .coordinator
        .cancel_order_item(order_id, ProductId::new(product_id))
        .await?;
    Ok(Json(cancellation.into()))
}

/// POST /orders/{id}/items/{product_id}/return: open a refund or replace
/// order for a delivered item.
#[tracing::instrument(skip(state, req), fields(return_type = %req.return_type))]
pub async fn request_return<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path((id, product_id)): Path<(String, String)>,
    Json(req): Json<ReturnRequest>,
) -> Result<(StatusCode, Json<ReturnReceipt>), ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let order_id = parse_id("order id", &id)?;
    let buyer_id: UserId = parse_id("buyer_id", &req.buyer_id)?;
    let return_type: ReturnType = req
        .return_type
        .parse()
        .map_err(|value| ApiError::BadRequest(format!("Unknown return type: {value}")))?;

    let receipt = state
        .coordinator
        .initiate_return(order_id, buyer_id, ProductId::new(product_id), return_type)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
