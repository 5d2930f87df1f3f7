//! HTTP API server for the order engine.
//!
//! Exposes the order coordinator over REST, with structured logging
//! (tracing) and Prometheus metrics. The journal and the inventory ledger
//! are generic so the same router serves the in-memory and PostgreSQL
//! backends.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{InMemoryCartStore, InMemoryCatalog, InventoryLedger, OrderCoordinator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
///
/// Carts and catalog are the in-memory collaborators; their handles are
/// kept here so they can be filled through the API.
pub struct AppState<S, I>
where
    S: EventStore,
    I: InventoryLedger,
{
    pub coordinator: OrderCoordinator<S, I, InMemoryCartStore, InMemoryCatalog>,
    pub inventory: I,
    pub carts: InMemoryCartStore,
    pub catalog: InMemoryCatalog,
}

/// Builds the application state around a journal and an inventory ledger.
pub fn create_state<S, I>(event_store: S, inventory: I) -> Arc<AppState<S, I>>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + Clone + 'static,
{
    let carts = InMemoryCartStore::new();
    let catalog = InMemoryCatalog::new();
    let coordinator =
        OrderCoordinator::new(event_store, inventory.clone(), carts.clone(), catalog.clone());

    Arc::new(AppState {
        coordinator,
        inventory,
        carts,
        catalog,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, I>(state: Arc<AppState<S, I>>, metrics_handle: PrometheusHandle) -> Router
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + Clone + 'static,
{
    use routes::{carts, catalog, health, inventory, metrics, orders, sagas};

    let metrics_router = Router::new()
        .route("/metrics", get(metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(health::check))
        .route(
            "/orders",
            post(orders::create::<S, I>).get(orders::list::<S, I>),
        )
        .route("/orders/{id}", get(orders::get::<S, I>))
        .route("/orders/{id}/status", put(orders::update_status::<S, I>))
        .route("/orders/{id}/cancel", post(orders::cancel::<S, I>))
        .route(
            "/orders/{id}/items/{product_id}/status",
            put(orders::update_item_status::<S, I>),
        )
        .route(
            "/orders/{id}/items/{product_id}/cancel",
            post(orders::cancel_item::<S, I>),
        )
        .route(
            "/orders/{id}/items/{product_id}/return",
            post(orders::request_return::<S, I>),
        )
        .route("/sagas/{id}", get(sagas::get::<S, I>))
        .route("/sagas/{id}/resume", post(sagas::resume::<S, I>))
        .route(
            "/inventory/{product_id}",
            get(inventory::get::<S, I>).put(inventory::set::<S, I>),
        )
        .route("/carts/{buyer_id}", get(carts::get::<S, I>))
        .route("/carts/{buyer_id}/lines", post(carts::add_line::<S, I>))
        .route(
            "/catalog/{product_id}/price",
            put(catalog::set_price::<S, I>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
