use std::hint::black_box;

use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use events::{
    EventEnvelope, OrderCreated, OrderId, OrderItem, OrderReadyForDelivery, PropagationContext,
    SagaEvent,
};

fn items(n: i64) -> Vec<OrderItem> {
    (1..=n)
        .map(|id| {
            OrderItem::new(id, 2)
                .with_name(format!("Product {id}"))
                .with_unit_price_cents(999)
        })
        .collect()
}

fn order_created(n: i64) -> EventEnvelope {
    EventEnvelope::new(
        SagaEvent::OrderCreated(OrderCreated {
            order_id: OrderId::new(1),
            customer_id: "cust-1".to_string(),
            status: "pending".to_string(),
            created_at: Utc::now(),
            items: items(n),
        }),
        PropagationContext::new_root(),
    )
}

fn bench_encode_order_created(c: &mut Criterion) {
    let envelope = order_created(3);

    c.bench_function("codec/encode_order_created", |b| {
        b.iter(|| black_box(envelope.to_wire()));
    });
}

fn bench_decode_order_created(c: &mut Criterion) {
    let wire = order_created(3).to_wire();

    c.bench_function("codec/decode_order_created", |b| {
        b.iter(|| EventEnvelope::from_wire(black_box(&wire)).unwrap());
    });
}

fn bench_decode_large_order(c: &mut Criterion) {
    let wire = order_created(50).to_wire();

    c.bench_function("codec/decode_order_created_50_items", |b| {
        b.iter(|| EventEnvelope::from_wire(black_box(&wire)).unwrap());
    });
}

fn bench_round_trip_ready_for_delivery(c: &mut Criterion) {
    let envelope = EventEnvelope::new(
        SagaEvent::OrderReadyForDelivery(OrderReadyForDelivery {
            order_id: OrderId::new(7),
            items: items(5),
            delivery_address: "12 Elm Street".to_string(),
            customer_id: "cust-1".to_string(),
        }),
        PropagationContext::new_root(),
    );

    c.bench_function("codec/round_trip_ready_for_delivery", |b| {
        b.iter(|| {
            let wire = envelope.to_wire();
            EventEnvelope::from_wire(&wire).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_encode_order_created,
    bench_decode_order_created,
    bench_decode_large_order,
    bench_round_trip_ready_for_delivery,
);
criterion_main!(benches);
