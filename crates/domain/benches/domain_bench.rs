use common::{AggregateId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, ItemStatus, Money, Order, OrderEvent, OrderItem, OrderService, OrderType,
    PlaceOrder, UpdateItemStatus,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};

fn make_envelope(aggregate_id: AggregateId, version: i64, event: &OrderEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Order")
        .event_type(domain::DomainEvent::event_type(event))
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

fn items(seller: UserId, count: usize) -> Vec<OrderItem> {
    (0..count)
        .map(|i| {
            OrderItem::new(
                format!("SKU-{i:03}").as_str(),
                seller,
                format!("Product {i}"),
                1,
                Money::from_cents(100 * (i as i64 + 1)),
            )
        })
        .collect()
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(InMemoryEventStore::new());
    let seller = UserId::new();

    c.bench_function("domain/place_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cmd = PlaceOrder::delivery(UserId::new(), items(seller, 5));
                service.place_order(cmd).await.unwrap();
            });
        });
    });
}

fn bench_item_status_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(InMemoryEventStore::new());
    let seller = UserId::new();

    c.bench_function("domain/place_accept_ready", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cmd = PlaceOrder::delivery(UserId::new(), items(seller, 1));
                let order_id = cmd.order_id;
                service.place_order(cmd).await.unwrap();
                for status in [ItemStatus::Accepted, ItemStatus::Ready] {
                    service
                        .update_item_status(UpdateItemStatus::new(
                            order_id, seller, "SKU-000", status,
                        ))
                        .await
                        .unwrap();
                }
            });
        });
    });
}

fn bench_reconstruction(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let order_id = AggregateId::new();
    let seller = UserId::new();
    let line_items = items(seller, 50);

    // 1 placement + 50 acceptances
    rt.block_on(async {
        let placed = OrderEvent::order_placed(
            order_id,
            UserId::new(),
            OrderType::Delivery,
            line_items.clone(),
            None,
        );
        let mut events = vec![make_envelope(order_id, 1, &placed)];
        for (v, item) in (2..).zip(&line_items) {
            let accepted = OrderEvent::item_status_changed(
                item.product_id.clone(),
                seller,
                ItemStatus::Requested,
                ItemStatus::Accepted,
            );
            events.push(make_envelope(order_id, v, &accepted));
        }
        store.append(events, AppendOptions::new()).await.unwrap();
    });

    c.bench_function("domain/reconstruct_51_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_events_for_aggregate(order_id).await.unwrap();
                let mut order = Order::default();
                for envelope in &events {
                    let event: OrderEvent =
                        serde_json::from_value(envelope.payload.clone()).unwrap();
                    order.apply(event);
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_place_order,
    bench_item_status_cycle,
    bench_reconstruction,
);
criterion_main!(benches);
