//! Order coordinator: the engine's public operations.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{
    Aggregate, CancelOrder, CancelOrderItem, CommandHandler, CommandResult, DomainError,
    DomainEvent, ItemStatus, Order, OrderError, OrderEvent, OrderItem, OrderService, OrderStatus,
    PlaceOrder, ProductId, ReleasedItem, RequestReturn, ReturnType, UpdateItemStatus,
    UpdateOrderStatus,
};
use event_store::{AppendOptions, EventEnvelope, EventStore};
use serde::Serialize;

use crate::aggregate::SagaInstance;
use crate::assembler::OrderAssembler;
use crate::error::{Result, SagaError};
use crate::events::SagaEvent;
use crate::policy;
use crate::services::{CartReader, Catalog, InventoryLedger};
use crate::steps::{self, STEP_PERSIST_ORDER, SagaStep};

/// A newly placed order and the saga that reserved its stock.
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub saga_id: AggregateId,
    /// Requested products left out because the catalog no longer lists them.
    pub skipped: Vec<ProductId>,
}

/// Outcome of a whole-order or single-item cancellation.
#[derive(Debug, Serialize)]
pub struct Cancellation {
    pub order: Order,
    /// Stock handed back to inventory. Empty for a no-op cancellation.
    pub released: Vec<ReleasedItem>,
    /// The restock saga, if anything was released.
    pub saga_id: Option<AggregateId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnReceipt {
    pub return_order_id: AggregateId,
    pub order_id: AggregateId,
    pub product_id: ProductId,
    pub return_type: ReturnType,
    pub requested_at: DateTime<Utc>,
    pub saga_id: AggregateId,
}

/// A saga being driven, with the IDs every step needs.
struct ActiveSaga {
    id: AggregateId,
    order_id: AggregateId,
    instance: SagaInstance,
}

/// A compensable step failed in the forward phase.
struct StepFailure {
    step: String,
    error: SagaError,
}

/// Runs every order operation as a command on the order aggregate followed
/// by a recorded saga for the side effects.
///
/// The order command commits first. Inventory, cart and return-order work
/// happens in saga steps logged to the journal, so a failure part way
/// through is visible, compensated where it can be, and resumable where it
/// cannot.
pub struct OrderCoordinator<S, I, C, P>
where
    S: EventStore,
    I: InventoryLedger,
    C: CartReader,
    P: Catalog,
{
    store: S,
    orders: OrderService<S>,
    sagas: CommandHandler<S, SagaInstance>,
    assembler: OrderAssembler<C, P>,
    inventory: I,
}

impl<S, I, C, P> OrderCoordinator<S, I, C, P>
where
    S: EventStore + Clone,
    I: InventoryLedger,
    C: CartReader,
    P: Catalog,
{
    pub fn new(store: S, inventory: I, cart: C, catalog: P) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            sagas: CommandHandler::new(store.clone()),
            store,
            assembler: OrderAssembler::new(cart, catalog),
            inventory,
        }
    }

    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    /// Orders one product from the buyer's cart.
    #[tracing::instrument(skip(self), fields(buyer_id = %buyer_id, product_id = %product_id))]
    pub async fn create_single_order(
        &self,
        buyer_id: UserId,
        product_id: ProductId,
    ) -> Result<PlacedOrder> {
        self.place(buyer_id, std::slice::from_ref(&product_id)).await
    }

    /// Orders several products from the buyer's cart as one order.
    #[tracing::instrument(skip(self, product_ids), fields(buyer_id = %buyer_id, requested = product_ids.len()))]
    pub async fn create_batch_order(
        &self,
        buyer_id: UserId,
        product_ids: Vec<ProductId>,
    ) -> Result<PlacedOrder> {
        self.place(buyer_id, &product_ids).await
    }

    async fn place(&self, buyer_id: UserId, product_ids: &[ProductId]) -> Result<PlacedOrder> {
        let assembled = self.assembler.assemble(buyer_id, product_ids).await?;

        let cmd = PlaceOrder::delivery(buyer_id, assembled.items);
        let order_id = cmd.order_id;
        let order = self.orders.place_order(cmd).await?.aggregate;

        let mut plan = vec![SagaStep::PersistOrder];
        plan.extend(order.items().iter().map(|item| SagaStep::ReserveStock {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
        }));
        plan.push(SagaStep::ClearCart {
            buyer_id,
            product_ids: order
                .items()
                .iter()
                .map(|item| item.product_id.clone())
                .collect(),
        });

        let mut saga = self.open_saga(order_id, steps::PLACE_ORDER, plan).await?;
        self.drive(&mut saga).await?;

        tracing::info!(%order_id, saga_id = %saga.id, total = %order.total(), "order placed");
        Ok(PlacedOrder {
            order,
            saga_id: saga.id,
            skipped: assembled.skipped,
        })
    }

    /// Moves the order header. Moving to `Canceled` cancels the order and
    /// restocks its active items.
    #[tracing::instrument(skip(self), fields(order_id = %order_id, status = %status))]
    pub async fn update_order_status(
        &self,
        order_id: AggregateId,
        status: OrderStatus,
    ) -> Result<Order> {
        let result = self
            .orders
            .update_status(UpdateOrderStatus::new(order_id, status))
            .await?;
        Ok(self.settle(order_id, steps::CANCEL_ORDER, result).await?.order)
    }

    /// Moves one item on behalf of its seller. A rejection cancels the item
    /// and restocks it before returning. Repeating a rejection whose
    /// cancellation failed runs that cancellation again.
    #[tracing::instrument(skip(self), fields(order_id = %order_id, product_id = %product_id, status = %status))]
    pub async fn update_item_status(
        &self,
        order_id: AggregateId,
        seller_id: UserId,
        product_id: ProductId,
        status: ItemStatus,
    ) -> Result<Order> {
        let result = self
            .orders
            .update_item_status(UpdateItemStatus::new(order_id, seller_id, product_id, status))
            .await?;

        let mut order = result.aggregate;
        for command in policy::follow_up_commands(order_id, &order) {
            tracing::info!(product_id = %command.product_id, "item rejected; cancelling");
            let cancelled = self.orders.cancel_item(command).await?;
            order = self
                .settle(order_id, steps::CANCEL_ORDER_ITEM, cancelled)
                .await?
                .order;
        }
        Ok(order)
    }

    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: AggregateId) -> Result<Cancellation> {
        let result = self.orders.cancel_order(CancelOrder::new(order_id)).await?;
        self.settle(order_id, steps::CANCEL_ORDER, result).await
    }

    #[tracing::instrument(skip(self), fields(order_id = %order_id, product_id = %product_id))]
    pub async fn cancel_order_item(
        &self,
        order_id: AggregateId,
        product_id: ProductId,
    ) -> Result<Cancellation> {
        let result = self
            .orders
            .cancel_item(CancelOrderItem::new(order_id, product_id))
            .await?;
        self.settle(order_id, steps::CANCEL_ORDER_ITEM, result).await
    }

    /// Records a return against a delivered item and opens the refund or
    /// replace order for it. Inventory is not touched.
    #[tracing::instrument(skip(self), fields(order_id = %order_id, product_id = %product_id))]
    pub async fn initiate_return(
        &self,
        order_id: AggregateId,
        buyer_id: UserId,
        product_id: ProductId,
        return_type: ReturnType,
    ) -> Result<ReturnReceipt> {
        let cmd = RequestReturn::new(order_id, buyer_id, product_id.clone(), return_type);
        let return_order_id = cmd.return_order_id;
        let result = self.orders.request_return(cmd).await?;

        let requested_at = result
            .events
            .iter()
            .find_map(|event| match event {
                OrderEvent::ItemReturnRequested(data) => Some(data.requested_at),
                _ => None,
            })
            .unwrap_or_else(Utc::now);
        let item = result
            .aggregate
            .item(&product_id)
            .map(|item| {
                OrderItem::new(
                    item.product_id.clone(),
                    item.seller_id,
                    item.product_name.clone(),
                    item.quantity,
                    item.unit_price,
                )
            })
            .ok_or_else(|| {
                DomainError::from(OrderError::ItemNotFound {
                    product_id: product_id.clone(),
                })
            })?;

        let plan = vec![SagaStep::PlaceReturnOrder {
            return_order_id,
            buyer_id,
            return_type,
            item,
        }];
        let mut saga = self.open_saga(order_id, steps::RETURN_ITEM, plan).await?;
        self.drive(&mut saga).await?;

        metrics::counter!("order_returns_total", "return_type" => return_type.as_str())
            .increment(1);
        Ok(ReturnReceipt {
            return_order_id,
            order_id,
            product_id,
            return_type,
            requested_at,
            saga_id: saga.id,
        })
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>> {
        Ok(self.orders.get_order(order_id).await?)
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.orders.list_orders().await?)
    }

    pub async fn list_orders_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Order>> {
        Ok(self.orders.list_orders_for_buyer(buyer_id).await?)
    }

    /// Loads a saga instance by ID from the journal.
    pub async fn get_saga(&self, saga_id: AggregateId) -> Result<Option<SagaInstance>> {
        Ok(self.sagas.load_existing(saga_id).await?)
    }

    /// Re-runs the pending steps of a suspended saga.
    ///
    /// Only steps not yet recorded as completed run again. A resumed
    /// compensation ends with the saga `Failed`; a resumed forward phase
    /// ends `Completed`.
    #[tracing::instrument(skip(self), fields(saga_id = %saga_id))]
    pub async fn resume_saga(&self, saga_id: AggregateId) -> Result<SagaInstance> {
        let instance = self
            .get_saga(saga_id)
            .await?
            .ok_or(SagaError::SagaNotFound(saga_id))?;
        if !instance.state().can_resume() {
            return Err(SagaError::NotResumable {
                saga_id,
                state: instance.state(),
            });
        }
        let order_id = instance
            .order_id()
            .ok_or(SagaError::SagaNotFound(saga_id))?;

        let mut saga = ActiveSaga {
            id: saga_id,
            order_id,
            instance,
        };
        self.record(&mut saga, vec![SagaEvent::saga_resumed()]).await?;
        tracing::info!(pending = saga.instance.pending_steps().len(), "saga resumed");

        self.drive(&mut saga).await?;
        Ok(saga.instance)
    }

    /// Restocks whatever the committed order events released.
    async fn settle(
        &self,
        order_id: AggregateId,
        saga_type: &'static str,
        result: CommandResult<Order>,
    ) -> Result<Cancellation> {
        let released: Vec<ReleasedItem> = result
            .events
            .iter()
            .flat_map(OrderEvent::released_stock)
            .collect();

        let saga_id = if released.is_empty() {
            None
        } else {
            let plan = released
                .iter()
                .map(|item| SagaStep::Restock {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                })
                .collect();
            let mut saga = self.open_saga(order_id, saga_type, plan).await?;
            self.drive(&mut saga).await?;
            Some(saga.id)
        };

        Ok(Cancellation {
            order: result.aggregate,
            released,
            saga_id,
        })
    }

    async fn open_saga(
        &self,
        order_id: AggregateId,
        saga_type: &'static str,
        plan: Vec<SagaStep>,
    ) -> Result<ActiveSaga> {
        let id = AggregateId::new();
        let persisted = plan.contains(&SagaStep::PersistOrder);

        let mut events = vec![
            SagaEvent::saga_started(id, order_id, saga_type),
            SagaEvent::steps_planned(plan),
        ];
        if persisted {
            events.push(SagaEvent::step_completed(STEP_PERSIST_ORDER));
        }

        let mut saga = ActiveSaga {
            id,
            order_id,
            instance: SagaInstance::default(),
        };
        self.record(&mut saga, events).await?;
        metrics::counter!("saga_executions_total", "saga_type" => saga_type).increment(1);
        tracing::debug!(saga_id = %id, saga_type, "saga opened");
        Ok(saga)
    }

    /// Runs the saga to an end state, or until a step suspends it.
    ///
    /// A failed reservation switches to compensation: completed
    /// reservations are restocked, the order is voided, and the
    /// reservation error is returned.
    async fn drive(&self, saga: &mut ActiveSaga) -> Result<()> {
        let started = Instant::now();
        let outcome = self.run_to_end(saga).await;
        let saga_type = saga.instance.saga_type().to_string();
        metrics::histogram!("saga_duration_seconds", "saga_type" => saga_type)
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn run_to_end(&self, saga: &mut ActiveSaga) -> Result<()> {
        if let Some(failure) = self.run_pending(saga).await? {
            let reason = failure.error.to_string();
            let mut plan = saga.instance.compensations_due();
            plan.push(SagaStep::VoidOrder {
                reason: reason.clone(),
            });
            self.record(
                saga,
                vec![SagaEvent::compensation_started(&failure.step, plan)],
            )
            .await?;

            self.run_pending(saga).await?;
            self.finish(saga, SagaEvent::saga_failed(reason)).await?;
            return Err(failure.error);
        }

        let last = if saga.instance.is_compensating() {
            let reason = saga
                .instance
                .failure_reason()
                .unwrap_or("compensated")
                .to_string();
            SagaEvent::saga_failed(reason)
        } else {
            SagaEvent::saga_completed()
        };
        self.finish(saga, last).await
    }

    async fn finish(&self, saga: &mut ActiveSaga, last: SagaEvent) -> Result<()> {
        let failed = matches!(last, SagaEvent::SagaFailed(_));
        self.record(saga, vec![last]).await?;

        let saga_type = saga.instance.saga_type().to_string();
        if failed {
            metrics::counter!("saga_failed", "saga_type" => saga_type).increment(1);
            tracing::warn!(saga_id = %saga.id, order_id = %saga.order_id, "saga failed");
        } else {
            metrics::counter!("saga_completed", "saga_type" => saga_type).increment(1);
            tracing::debug!(saga_id = %saga.id, "saga completed");
        }
        Ok(())
    }

    /// Runs the pending steps of the current phase in order.
    ///
    /// Returns `Ok(Some(_))` when a compensable forward step failed. Any
    /// other failure suspends the saga and surfaces as
    /// [`SagaError::SideEffectFailed`].
    async fn run_pending(&self, saga: &mut ActiveSaga) -> Result<Option<StepFailure>> {
        let compensating = saga.instance.is_compensating();

        for step in saga.instance.pending_steps() {
            let name = step.name();
            match self.perform(saga.order_id, &step).await {
                Ok(()) => {
                    let done = if compensating {
                        SagaEvent::compensation_step_completed(&name)
                    } else {
                        SagaEvent::step_completed(&name)
                    };
                    self.record(saga, vec![done]).await?;
                }
                Err(error) if !compensating && step.is_compensable() => {
                    self.record(saga, vec![SagaEvent::step_failed(&name, error.to_string())])
                        .await?;
                    tracing::warn!(
                        saga_id = %saga.id,
                        step = %name,
                        %error,
                        "step failed; compensating"
                    );
                    return Ok(Some(StepFailure { step: name, error }));
                }
                Err(error) => {
                    let reason = error.to_string();
                    let failed = if compensating {
                        SagaEvent::compensation_step_failed(&name, &reason)
                    } else {
                        SagaEvent::step_failed(&name, &reason)
                    };
                    self.record(saga, vec![failed, SagaEvent::saga_suspended(&name, &reason)])
                        .await?;

                    let saga_type = saga.instance.saga_type().to_string();
                    metrics::counter!("saga_suspended", "saga_type" => saga_type).increment(1);
                    tracing::error!(saga_id = %saga.id, step = %name, %reason, "saga suspended");
                    return Err(SagaError::SideEffectFailed {
                        saga_id: saga.id,
                        step: name,
                        reason,
                    });
                }
            }
        }

        Ok(None)
    }

    async fn perform(&self, order_id: AggregateId, step: &SagaStep) -> Result<()> {
        match step {
            SagaStep::PersistOrder => {}
            SagaStep::ReserveStock {
                product_id,
                quantity,
            } => {
                self.inventory.decrease(product_id, *quantity).await?;
            }
            SagaStep::Restock {
                product_id,
                quantity,
            } => {
                self.inventory.increase(product_id, *quantity).await?;
                metrics::counter!("inventory_restocked_units_total")
                    .increment(u64::from(*quantity));
            }
            SagaStep::ClearCart {
                buyer_id,
                product_ids,
            } => {
                self.assembler
                    .cart()
                    .remove_lines(*buyer_id, product_ids)
                    .await?;
            }
            SagaStep::VoidOrder { reason } => {
                self.orders
                    .void_order(domain::VoidOrder::new(order_id, reason.as_str()))
                    .await?;
            }
            SagaStep::PlaceReturnOrder {
                return_order_id,
                buyer_id,
                return_type,
                item,
            } => {
                let cmd = PlaceOrder::return_of(
                    *return_order_id,
                    *buyer_id,
                    order_id,
                    *return_type,
                    item.clone(),
                );
                match self.orders.place_order(cmd).await {
                    // Placed by an earlier attempt.
                    Ok(_) | Err(DomainError::Order(OrderError::AlreadyPlaced)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    /// Appends saga events with a version check and applies them.
    async fn record(&self, saga: &mut ActiveSaga, events: Vec<SagaEvent>) -> Result<()> {
        let expected = saga.instance.version();
        let mut version = expected;
        let mut envelopes = Vec::with_capacity(events.len());

        for event in &events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .event_type(event.event_type())
                .aggregate_id(saga.id)
                .aggregate_type(SagaInstance::aggregate_type())
                .version(version)
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        let new_version = self
            .store
            .append(envelopes, AppendOptions::expect_version(expected))
            .await?;

        saga.instance.apply_events(events);
        saga.instance.set_version(new_version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CartLine, InMemoryCartStore, InMemoryCatalog, InMemoryInventoryLedger};
    use crate::state::SagaState;
    use common::ErrorKind;
    use std::sync::{Arc, Mutex};

    use domain::Money;
    use event_store::{InMemoryEventStore, Version};

    type Coordinator = OrderCoordinator<
        InMemoryEventStore,
        InMemoryInventoryLedger,
        InMemoryCartStore,
        InMemoryCatalog,
    >;

    struct Fixture {
        coordinator: Coordinator,
        inventory: InMemoryInventoryLedger,
        carts: InMemoryCartStore,
        buyer: UserId,
        seller_a: UserId,
        seller_b: UserId,
    }

    /// Cart: p1 (seller A, qty 2, $50), p2 (seller B, qty 1, $30).
    /// Stock: p1 = 10, p2 = 5.
    async fn fixture() -> Fixture {
        let inventory = InMemoryInventoryLedger::with_stock([("p1", 10), ("p2", 5)]);
        let carts = InMemoryCartStore::new();
        let catalog = InMemoryCatalog::new();
        let buyer = UserId::new();
        let seller_a = UserId::new();
        let seller_b = UserId::new();

        carts
            .add_line(buyer, CartLine::new("p1", seller_a, "Lamp", 2))
            .await;
        carts
            .add_line(buyer, CartLine::new("p2", seller_b, "Mug", 1))
            .await;
        catalog.set_price("p1", Money::from_dollars(50)).await;
        catalog.set_price("p2", Money::from_dollars(30)).await;

        Fixture {
            coordinator: OrderCoordinator::new(
                InMemoryEventStore::new(),
                inventory.clone(),
                carts.clone(),
                catalog,
            ),
            inventory,
            carts,
            buyer,
            seller_a,
            seller_b,
        }
    }

    fn p(id: &str) -> ProductId {
        ProductId::new(id)
    }

    async fn stock(f: &Fixture, id: &str) -> u64 {
        f.inventory.stock(&p(id)).await.unwrap()
    }

    /// Commits a rival order event right before the first `ItemCancelled`
    /// append it forwards, so that append loses the version race.
    #[derive(Clone, Default)]
    struct RacingStore {
        inner: InMemoryEventStore,
        rival: Arc<Mutex<Option<OrderEvent>>>,
    }

    impl RacingStore {
        fn arm(&self, rival: OrderEvent) {
            *self.rival.lock().unwrap() = Some(rival);
        }
    }

    #[async_trait::async_trait]
    impl EventStore for RacingStore {
        async fn append(
            &self,
            events: Vec<EventEnvelope>,
            options: AppendOptions,
        ) -> event_store::Result<Version> {
            let cancels = events
                .first()
                .is_some_and(|envelope| envelope.event_type == "ItemCancelled");
            let rival = if cancels {
                self.rival.lock().unwrap().take()
            } else {
                None
            };
            if let (Some(rival), Some(first)) = (rival, events.first()) {
                let current = self
                    .inner
                    .get_aggregate_version(first.aggregate_id)
                    .await?
                    .unwrap_or_default();
                let envelope = EventEnvelope::builder()
                    .aggregate_id(first.aggregate_id)
                    .aggregate_type(Order::aggregate_type())
                    .event_type(rival.event_type())
                    .version(current.next())
                    .payload(&rival)?
                    .build()?;
                self.inner.append(vec![envelope], AppendOptions::new()).await?;
            }
            self.inner.append(events, options).await
        }

        async fn get_events_for_aggregate(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.get_events_for_aggregate(aggregate_id).await
        }

        async fn get_events_by_type(
            &self,
            event_type: &str,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.get_events_by_type(event_type).await
        }

        async fn get_aggregate_version(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Option<Version>> {
            self.inner.get_aggregate_version(aggregate_id).await
        }
    }

    #[tokio::test]
    async fn single_order_reserves_and_clears_one_line() {
        let f = fixture().await;

        let placed = f
            .coordinator
            .create_single_order(f.buyer, p("p1"))
            .await
            .unwrap();

        assert_eq!(placed.order.items().len(), 1);
        assert_eq!(placed.order.total(), Money::from_dollars(100));
        assert_eq!(stock(&f, "p1").await, 8);
        assert_eq!(stock(&f, "p2").await, 5);

        let cart = f.carts.get_cart(f.buyer).await.unwrap().unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].product_id, p("p2"));

        let saga = f.coordinator.get_saga(placed.saga_id).await.unwrap().unwrap();
        assert_eq!(saga.state(), SagaState::Completed);
        assert_eq!(
            saga.completed_steps(),
            &["persist_order", "reserve_inventory:p1", "clear_cart"]
        );
    }

    #[tokio::test]
    async fn insufficient_stock_compensates_and_voids() {
        let f = fixture().await;
        f.inventory.set_stock(&p("p2"), 0).await.unwrap();

        let err = f
            .coordinator
            .create_batch_order(f.buyer, vec![p("p1"), p("p2")])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(stock(&f, "p1").await, 10);
        assert_eq!(stock(&f, "p2").await, 0);

        let orders = f.coordinator.list_orders_for_buyer(f.buyer).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status(), OrderStatus::Canceled);
        assert_eq!(orders[0].active_item_count(), 0);

        // Cart untouched.
        let cart = f.carts.get_cart(f.buyer).await.unwrap().unwrap();
        assert_eq!(cart.lines.len(), 2);
    }

    #[tokio::test]
    async fn cart_failure_suspends_and_resume_finishes() {
        let f = fixture().await;
        f.carts.set_fail_on_remove(true).await;

        let err = f
            .coordinator
            .create_batch_order(f.buyer, vec![p("p1"), p("p2")])
            .await
            .unwrap_err();

        let SagaError::SideEffectFailed { saga_id, step, .. } = err else {
            panic!("expected SideEffectFailed, got {err:?}");
        };
        assert_eq!(step, "clear_cart");
        assert_eq!(stock(&f, "p1").await, 8);

        let saga = f.coordinator.get_saga(saga_id).await.unwrap().unwrap();
        assert_eq!(saga.state(), SagaState::Suspended);

        f.carts.set_fail_on_remove(false).await;
        let resumed = f.coordinator.resume_saga(saga_id).await.unwrap();

        assert_eq!(resumed.state(), SagaState::Completed);
        assert!(
            f.carts
                .get_cart(f.buyer)
                .await
                .unwrap()
                .unwrap()
                .is_empty()
        );
        // Reservations were not repeated.
        assert_eq!(stock(&f, "p1").await, 8);
        assert_eq!(stock(&f, "p2").await, 4);
    }

    #[tokio::test]
    async fn resume_rejects_finished_sagas() {
        let f = fixture().await;
        let placed = f
            .coordinator
            .create_single_order(f.buyer, p("p1"))
            .await
            .unwrap();

        let err = f.coordinator.resume_saga(placed.saga_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        let err = f
            .coordinator
            .resume_saga(AggregateId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn restock_failure_is_resumable() {
        let f = fixture().await;
        let placed = f
            .coordinator
            .create_batch_order(f.buyer, vec![p("p1"), p("p2")])
            .await
            .unwrap();
        let order_id = placed.order.id().unwrap();

        f.inventory.set_fail_on_increase(true).await;
        let err = f.coordinator.cancel_order(order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SideEffectFailed);

        // The cancellation itself committed.
        let order = f.coordinator.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Canceled);
        assert_eq!(stock(&f, "p1").await, 8);

        let SagaError::SideEffectFailed { saga_id, .. } = err else {
            unreachable!()
        };
        f.inventory.set_fail_on_increase(false).await;
        let saga = f.coordinator.resume_saga(saga_id).await.unwrap();

        assert_eq!(saga.state(), SagaState::Completed);
        assert_eq!(stock(&f, "p1").await, 10);
        assert_eq!(stock(&f, "p2").await, 5);
    }

    #[tokio::test]
    async fn rejection_cancels_and_restocks_the_item() {
        let f = fixture().await;
        let placed = f
            .coordinator
            .create_batch_order(f.buyer, vec![p("p1"), p("p2")])
            .await
            .unwrap();
        let order_id = placed.order.id().unwrap();

        let order = f
            .coordinator
            .update_item_status(order_id, f.seller_b, p("p2"), ItemStatus::Rejected)
            .await
            .unwrap();

        let p2 = order.item(&p("p2")).unwrap();
        assert!(!p2.active);
        assert_eq!(p2.status, ItemStatus::Rejected);
        assert_eq!(order.status(), OrderStatus::Placed);
        assert_eq!(order.total(), Money::from_dollars(130));
        assert_eq!(stock(&f, "p2").await, 5);
        assert_eq!(stock(&f, "p1").await, 8);
    }

    #[tokio::test]
    async fn repeated_rejection_finishes_an_interrupted_cancellation() {
        let f = fixture().await;
        let catalog = InMemoryCatalog::new();
        catalog.set_price("p1", Money::from_dollars(50)).await;
        catalog.set_price("p2", Money::from_dollars(30)).await;
        let store = RacingStore::default();
        let coordinator = OrderCoordinator::new(
            store.clone(),
            f.inventory.clone(),
            f.carts.clone(),
            catalog,
        );
        let placed = coordinator
            .create_batch_order(f.buyer, vec![p("p1"), p("p2")])
            .await
            .unwrap();
        let order_id = placed.order.id().unwrap();

        store.arm(OrderEvent::item_status_changed(
            p("p1"),
            f.seller_a,
            ItemStatus::Requested,
            ItemStatus::Accepted,
        ));
        let err = coordinator
            .update_item_status(order_id, f.seller_b, p("p2"), ItemStatus::Rejected)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        let order = coordinator.get_order(order_id).await.unwrap().unwrap();
        let p2 = order.item(&p("p2")).unwrap();
        assert!(p2.active);
        assert_eq!(p2.status, ItemStatus::Rejected);
        assert_eq!(stock(&f, "p2").await, 4);

        let order = coordinator
            .update_item_status(order_id, f.seller_b, p("p2"), ItemStatus::Rejected)
            .await
            .unwrap();

        assert!(!order.item(&p("p2")).unwrap().active);
        assert_eq!(order.item(&p("p1")).unwrap().status, ItemStatus::Accepted);
        assert_eq!(stock(&f, "p2").await, 5);

        let order = coordinator
            .update_order_status(order_id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn overflowing_total_is_rejected_before_any_write() {
        let inventory = InMemoryInventoryLedger::with_stock([("p1", 10)]);
        let carts = InMemoryCartStore::new();
        let catalog = InMemoryCatalog::new();
        let buyer = UserId::new();
        carts
            .add_line(buyer, CartLine::new("p1", UserId::new(), "Lamp", 2))
            .await;
        catalog
            .set_price("p1", Money::from_cents(i64::MAX / 2 + 1))
            .await;
        let coordinator =
            OrderCoordinator::new(InMemoryEventStore::new(), inventory.clone(), carts, catalog);

        let err = coordinator
            .create_single_order(buyer, p("p1"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(inventory.stock(&p("p1")).await.unwrap(), 10);
        assert!(coordinator.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn canceled_status_goes_through_cancellation() {
        let f = fixture().await;
        let placed = f
            .coordinator
            .create_batch_order(f.buyer, vec![p("p1"), p("p2")])
            .await
            .unwrap();
        let order_id = placed.order.id().unwrap();

        let order = f
            .coordinator
            .update_order_status(order_id, OrderStatus::Canceled)
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Canceled);
        assert_eq!(stock(&f, "p1").await, 10);
        assert_eq!(stock(&f, "p2").await, 5);
    }

    #[tokio::test]
    async fn return_opens_linked_return_order() {
        let f = fixture().await;
        let placed = f
            .coordinator
            .create_single_order(f.buyer, p("p1"))
            .await
            .unwrap();
        let order_id = placed.order.id().unwrap();

        for status in [ItemStatus::Accepted, ItemStatus::Ready] {
            f.coordinator
                .update_item_status(order_id, f.seller_a, p("p1"), status)
                .await
                .unwrap();
            let next = if status == ItemStatus::Accepted {
                OrderStatus::Confirmed
            } else {
                OrderStatus::Processing
            };
            f.coordinator
                .update_order_status(order_id, next)
                .await
                .unwrap();
        }
        for status in [OrderStatus::ReadyForDelivery, OrderStatus::Delivered] {
            f.coordinator
                .update_order_status(order_id, status)
                .await
                .unwrap();
        }

        let receipt = f
            .coordinator
            .initiate_return(order_id, f.buyer, p("p1"), ReturnType::Refund)
            .await
            .unwrap();

        let return_order = f
            .coordinator
            .get_order(receipt.return_order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(return_order.return_of(), Some(order_id));
        assert_eq!(return_order.status(), OrderStatus::ReturnRequested);
        assert_eq!(return_order.total(), Money::from_dollars(100));

        // Inventory and the original order's status are untouched.
        assert_eq!(stock(&f, "p1").await, 8);
        let original = f.coordinator.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(original.status(), OrderStatus::Delivered);
    }
}
