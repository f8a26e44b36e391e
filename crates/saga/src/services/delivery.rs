//! Delivery service handler.

use std::sync::Arc;

use async_trait::async_trait;
use bus::{EventHandler, HandlerError, Publisher};
use events::{DeliveryCompleted, DeliveryStarted, EventEnvelope, SagaEvent};
use tracing::info;

use crate::error::{Result, SagaError};
use crate::simulation::{SimulatedDelay, Workers};

const SERVICE: &str = "delivery";

/// Assigns a driver to orders ready for delivery and delivers them.
///
/// Nothing is published before the trigger is acknowledged. A detached task
/// publishes `delivery.started` after the assignment delay and
/// `delivery.completed` after the transit delay.
pub struct DeliveryService {
    publisher: Arc<dyn Publisher>,
    assign: SimulatedDelay,
    transit: SimulatedDelay,
    workers: Workers,
}

impl DeliveryService {
    pub fn new(publisher: Arc<dyn Publisher>, assign: SimulatedDelay, transit: SimulatedDelay) -> Self {
        Self {
            publisher,
            assign,
            transit,
            workers: Workers::new(SERVICE),
        }
    }

    /// Gets the delivery tasks.
    pub fn workers(&self) -> &Workers {
        &self.workers
    }

    /// Applies one inbound event and returns the events to publish.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %envelope.event.order_id(), kind = %envelope.kind())
    )]
    pub async fn react(&self, envelope: &EventEnvelope) -> Result<Vec<EventEnvelope>> {
        let SagaEvent::OrderReadyForDelivery(ready) = &envelope.event else {
            return Err(SagaError::UnexpectedEvent {
                service: SERVICE,
                kind: envelope.kind(),
            });
        };

        let order_id = ready.order_id;
        let started = EventEnvelope::caused_by(
            SagaEvent::DeliveryStarted(DeliveryStarted { order_id }),
            envelope,
        );
        let completed = EventEnvelope::caused_by(
            SagaEvent::DeliveryCompleted(DeliveryCompleted { order_id }),
            envelope,
        );
        let publisher = Arc::clone(&self.publisher);
        let (assign, transit) = (self.assign, self.transit);

        self.workers
            .start(order_id, envelope.context.trace_id(), async move {
                assign.wait().await;
                publisher.publish(&started).await?;
                info!("Driver assigned, delivery started");

                transit.wait().await;
                publisher.publish(&completed).await?;
                info!("Order delivered");
                Ok(())
            })
            .await;

        info!(
            customer_id = %ready.customer_id,
            address = %ready.delivery_address,
            "Delivery scheduled"
        );
        Ok(vec![])
    }
}

#[async_trait]
impl EventHandler for DeliveryService {
    async fn handle(
        &self,
        envelope: EventEnvelope,
    ) -> std::result::Result<Vec<EventEnvelope>, HandlerError> {
        Ok(self.react(&envelope).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::InMemoryBus;
    use common::{OrderId, OrderItem};
    use events::{OrderReadyForDelivery, PropagationContext};

    fn ready(id: i64) -> EventEnvelope {
        EventEnvelope::new(
            SagaEvent::OrderReadyForDelivery(OrderReadyForDelivery {
                order_id: OrderId::new(id),
                items: vec![OrderItem::new(1, 2)],
                delivery_address: "12 Elm Street".to_string(),
                customer_id: "cust-1".to_string(),
            }),
            PropagationContext::new_root(),
        )
    }

    fn service(bus: &InMemoryBus) -> DeliveryService {
        DeliveryService::new(
            Arc::new(bus.clone()),
            SimulatedDelay::none(),
            SimulatedDelay::none(),
        )
    }

    #[tokio::test]
    async fn test_started_precedes_completed() {
        let bus = InMemoryBus::new();
        let delivery = service(&bus);
        let inbound = ready(3);

        let outbound = delivery.react(&inbound).await.unwrap();
        delivery.workers().wait_idle().await;

        assert!(outbound.is_empty());
        assert_eq!(
            bus.published_routing_keys().await,
            vec!["delivery.started", "delivery.completed"]
        );
        for message in bus.published().await {
            assert_eq!(message.message_id, format!("{}.3", message.routing_key));
            let envelope = EventEnvelope::from_wire(&message).unwrap();
            assert_eq!(envelope.context.trace_id(), inbound.context.trace_id());
        }
    }

    #[tokio::test]
    async fn test_redelivered_trigger_while_in_flight_is_ignored() {
        let bus = InMemoryBus::new();
        let delivery = DeliveryService::new(
            Arc::new(bus.clone()),
            SimulatedDelay::from_millis(50, 50),
            SimulatedDelay::none(),
        );

        delivery.react(&ready(5)).await.unwrap();
        delivery.react(&ready(5)).await.unwrap();
        delivery.workers().wait_idle().await;

        assert_eq!(
            bus.published_routing_keys().await,
            vec!["delivery.started", "delivery.completed"]
        );
    }

    #[tokio::test]
    async fn test_failed_start_skips_completion() {
        let bus = InMemoryBus::new();
        bus.set_fail_on_publish(true).await;
        let delivery = service(&bus);

        delivery.react(&ready(4)).await.unwrap();
        delivery.workers().wait_idle().await;

        assert!(bus.published().await.is_empty());
    }
}
