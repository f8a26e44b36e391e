use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bus::{Disposition, EventHandler, HandlerError, InMemoryBus, MessageBus, Publisher, QueueSpec};
use events::{
    DeliveryCompleted, DeliveryStarted, EventEnvelope, KitchenAccepted, OrderId,
    PropagationContext, SagaEvent, WireMessage,
};
use tokio::sync::Mutex;

const ORDER_QUEUE: &str = "order_service_events";

fn accepted(id: i64) -> EventEnvelope {
    EventEnvelope::new(
        SagaEvent::KitchenAccepted(KitchenAccepted {
            order_id: OrderId::new(id),
        }),
        PropagationContext::new_root(),
    )
}

async fn bus_with_order_queue() -> InMemoryBus {
    let bus = InMemoryBus::new();
    bus.declare_queue(&QueueSpec::order_service()).await.unwrap();
    bus
}

/// Records every order id it sees and answers with a fixed outcome.
struct Recorder {
    seen: Mutex<Vec<OrderId>>,
    outcome: Result<Vec<EventEnvelope>, HandlerError>,
}

impl Recorder {
    fn new(outcome: Result<Vec<EventEnvelope>, HandlerError>) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            outcome,
        }
    }

    async fn seen(&self) -> Vec<OrderId> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl EventHandler for Recorder {
    async fn handle(&self, envelope: EventEnvelope) -> Result<Vec<EventEnvelope>, HandlerError> {
        self.seen.lock().await.push(envelope.event.order_id());
        self.outcome.clone()
    }
}

#[tokio::test]
async fn test_successful_handling_acks() {
    let bus = bus_with_order_queue().await;
    bus.publish(&accepted(1)).await.unwrap();

    let handler = Recorder::new(Ok(vec![]));
    let disposition = bus.deliver_next(ORDER_QUEUE, &handler).await;

    assert_eq!(disposition, Some(Disposition::Ack));
    assert_eq!(bus.pending_count(ORDER_QUEUE).await, 0);
    assert_eq!(handler.seen().await, vec![OrderId::new(1)]);
}

#[tokio::test]
async fn test_deliveries_are_fifo() {
    let bus = bus_with_order_queue().await;
    for id in 1..=3 {
        bus.publish(&accepted(id)).await.unwrap();
    }

    let handler = Recorder::new(Ok(vec![]));
    assert_eq!(bus.drain(ORDER_QUEUE, &handler, 10).await, 3);
    assert_eq!(
        handler.seen().await,
        vec![OrderId::new(1), OrderId::new(2), OrderId::new(3)]
    );
}

#[tokio::test]
async fn test_transient_failure_requeues_at_head() {
    let bus = bus_with_order_queue().await;
    bus.publish(&accepted(1)).await.unwrap();
    bus.publish(&accepted(2)).await.unwrap();

    let failing = Recorder::new(Err(HandlerError::Transient("db down".to_string())));
    assert_eq!(
        bus.deliver_next(ORDER_QUEUE, &failing).await,
        Some(Disposition::Requeue)
    );
    assert_eq!(bus.pending_count(ORDER_QUEUE).await, 2);

    let healthy = Recorder::new(Ok(vec![]));
    bus.deliver_next(ORDER_QUEUE, &healthy).await;
    assert_eq!(healthy.seen().await, vec![OrderId::new(1)]);
}

#[tokio::test]
async fn test_permanent_failure_discards() {
    let bus = bus_with_order_queue().await;
    bus.publish(&accepted(5)).await.unwrap();

    let handler = Recorder::new(Err(HandlerError::Permanent("order 5 not found".to_string())));
    assert_eq!(
        bus.deliver_next(ORDER_QUEUE, &handler).await,
        Some(Disposition::Discard)
    );

    assert_eq!(bus.pending_count(ORDER_QUEUE).await, 0);
    let dead = bus.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].0, ORDER_QUEUE);
    assert_eq!(dead[0].1.message_id, "kitchen.accepted.5");
}

#[tokio::test]
async fn test_undecodable_message_is_discarded_without_calling_handler() {
    let bus = bus_with_order_queue().await;
    bus.publish_raw(WireMessage {
        routing_key: "kitchen.accepted".to_string(),
        message_id: "kitchen.accepted.1".to_string(),
        body: vec![0xff, 0xff, 0xff],
        headers: BTreeMap::new(),
    })
    .await
    .unwrap();

    let handler = Recorder::new(Ok(vec![]));
    assert_eq!(
        bus.deliver_next(ORDER_QUEUE, &handler).await,
        Some(Disposition::Discard)
    );
    assert!(handler.seen().await.is_empty());
    assert_eq!(bus.dead_letters().await.len(), 1);
}

#[tokio::test]
async fn test_outbound_events_are_published_and_routed() {
    let bus = bus_with_order_queue().await;
    bus.declare_queue(&QueueSpec::inventory_service())
        .await
        .unwrap();
    bus.publish(&accepted(9)).await.unwrap();

    let completed = EventEnvelope::new(
        SagaEvent::DeliveryCompleted(DeliveryCompleted {
            order_id: OrderId::new(9),
        }),
        PropagationContext::new_root(),
    );
    let handler = Recorder::new(Ok(vec![completed]));
    bus.deliver_next(ORDER_QUEUE, &handler).await;

    assert_eq!(
        bus.published_routing_keys().await,
        vec!["kitchen.accepted", "delivery.completed"]
    );
    // delivery.completed is bound by both the order and inventory queues
    assert_eq!(bus.pending_count(ORDER_QUEUE).await, 1);
    assert_eq!(bus.pending_count("inventory_service_events").await, 1);
}

#[tokio::test]
async fn test_publish_failure_requeues_inbound() {
    let bus = bus_with_order_queue().await;
    bus.publish(&accepted(3)).await.unwrap();
    bus.set_fail_on_publish(true).await;

    let started = EventEnvelope::new(
        SagaEvent::DeliveryStarted(DeliveryStarted {
            order_id: OrderId::new(3),
        }),
        PropagationContext::new_root(),
    );
    let handler = Recorder::new(Ok(vec![started]));
    assert_eq!(
        bus.deliver_next(ORDER_QUEUE, &handler).await,
        Some(Disposition::Requeue)
    );
    assert_eq!(bus.pending_count(ORDER_QUEUE).await, 1);

    bus.set_fail_on_publish(false).await;
    assert_eq!(
        bus.deliver_next(ORDER_QUEUE, &handler).await,
        Some(Disposition::Ack)
    );
}

#[tokio::test]
async fn test_empty_queue_delivers_nothing() {
    let bus = bus_with_order_queue().await;
    let handler = Recorder::new(Ok(vec![]));
    assert_eq!(bus.deliver_next(ORDER_QUEUE, &handler).await, None);
    assert_eq!(bus.deliver_next("no_such_queue", &handler).await, None);
}

struct Counter(AtomicUsize);

#[async_trait]
impl EventHandler for Counter {
    async fn handle(&self, _envelope: EventEnvelope) -> Result<Vec<EventEnvelope>, HandlerError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(vec![])
    }
}

#[tokio::test]
async fn test_consume_loop_processes_until_closed() {
    let bus = bus_with_order_queue().await;
    let counter = Arc::new(Counter(AtomicUsize::new(0)));

    let consumer = {
        let bus = bus.clone();
        let handler: Arc<dyn EventHandler> = counter.clone();
        tokio::spawn(async move { bus.consume(&QueueSpec::order_service(), handler).await })
    };

    for id in 1..=4 {
        bus.publish(&accepted(id)).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while counter.0.load(Ordering::SeqCst) < 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    bus.close().await;
    let result = tokio::time::timeout(Duration::from_secs(5), consumer)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
