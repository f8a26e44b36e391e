//! Inventory service handler.

use async_trait::async_trait;
use bus::{EventHandler, HandlerError};
use domain::ReservationEngine;
use events::{EventEnvelope, InventoryReserved, SagaEvent};
use tracing::{info, warn};

use crate::error::{Result, SagaError};

const SERVICE: &str = "inventory";

/// Reserves stock for new orders and confirms it once they are delivered.
pub struct InventoryService<E: ReservationEngine> {
    engine: E,
}

impl<E: ReservationEngine> InventoryService<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Applies one inbound event and returns the events to publish.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %envelope.event.order_id(), kind = %envelope.kind())
    )]
    pub async fn react(&self, envelope: &EventEnvelope) -> Result<Vec<EventEnvelope>> {
        match &envelope.event {
            SagaEvent::OrderCreated(created) => {
                let outcome = self
                    .engine
                    .check_and_reserve(created.order_id, &created.items)
                    .await?;

                let label = if outcome.is_accepted() {
                    info!("Inventory reserved");
                    "accepted"
                } else {
                    warn!(reason = outcome.message(), "Inventory reservation rejected");
                    "rejected"
                };
                metrics::counter!("inventory_reservations_total", "outcome" => label).increment(1);

                let reserved = SagaEvent::InventoryReserved(InventoryReserved {
                    order_id: created.order_id,
                    success: outcome.is_accepted(),
                    message: outcome.message().to_string(),
                    items: created.items.clone(),
                });
                Ok(vec![EventEnvelope::caused_by(reserved, envelope)])
            }
            SagaEvent::DeliveryCompleted(completed) => {
                let confirmed = self.engine.confirm(completed.order_id).await?;
                info!(rows = confirmed, "Reservations confirmed");
                Ok(vec![])
            }
            other => Err(SagaError::UnexpectedEvent {
                service: SERVICE,
                kind: other.kind(),
            }),
        }
    }
}

#[async_trait]
impl<E: ReservationEngine> EventHandler for InventoryService<E> {
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
    use chrono::Utc;
    use common::{OrderId, OrderItem};
    use domain::{InMemoryReservationEngine, Product, ReservationStatus};
    use events::{DeliveryCompleted, EventKind, KitchenAccepted, OrderCreated, PropagationContext};

    fn created(id: i64, items: Vec<OrderItem>) -> EventEnvelope {
        EventEnvelope::new(
            SagaEvent::OrderCreated(OrderCreated {
                order_id: OrderId::new(id),
                customer_id: "cust-1".to_string(),
                status: "pending".to_string(),
                created_at: Utc::now(),
                items,
            }),
            PropagationContext::new_root(),
        )
    }

    fn reserved(outbound: &[EventEnvelope]) -> &InventoryReserved {
        match outbound {
            [envelope] => match &envelope.event {
                SagaEvent::InventoryReserved(e) => e,
                other => panic!("unexpected event {other:?}"),
            },
            other => panic!("expected one event, got {}", other.len()),
        }
    }

    #[tokio::test]
    async fn test_reservation_reports_success() {
        let service =
            InventoryService::new(InMemoryReservationEngine::with_products([Product::new(
                1, "Pizza", 5, 1299,
            )]));
        let inbound = created(1, vec![OrderItem::new(1, 2)]);

        let outbound = service.react(&inbound).await.unwrap();

        let event = reserved(&outbound);
        assert!(event.success);
        assert_eq!(event.message, "Successfully reserved inventory");
        assert_eq!(event.items, vec![OrderItem::new(1, 2)]);
        assert_eq!(outbound[0].context.trace_id(), inbound.context.trace_id());
        assert_eq!(service.engine().stock(1).await, Some(3));
    }

    #[tokio::test]
    async fn test_shortage_reports_failure() {
        let service =
            InventoryService::new(InMemoryReservationEngine::with_products([Product::new(
                1, "Pizza", 1, 1299,
            )]));

        let outbound = service
            .react(&created(1, vec![OrderItem::new(1, 2)]))
            .await
            .unwrap();

        let event = reserved(&outbound);
        assert!(!event.success);
        assert_eq!(
            event.message,
            "Insufficient quantity for product 1 (requested: 2, available: 1)"
        );
        assert_eq!(service.engine().stock(1).await, Some(1));
    }

    #[tokio::test]
    async fn test_delivery_completed_confirms_reservations() {
        let service = InventoryService::new(InMemoryReservationEngine::seeded());
        service
            .react(&created(4, vec![OrderItem::new(3, 1)]))
            .await
            .unwrap();

        let outbound = service
            .react(&EventEnvelope::new(
                SagaEvent::DeliveryCompleted(DeliveryCompleted {
                    order_id: OrderId::new(4),
                }),
                PropagationContext::new_root(),
            ))
            .await
            .unwrap();

        assert!(outbound.is_empty());
        let rows = service.engine().reservations(OrderId::new(4)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_engine_failure_is_transient() {
        let service = InventoryService::new(InMemoryReservationEngine::seeded());
        service.engine().set_fail_on_reserve(true).await;

        let result = service.handle(created(1, vec![OrderItem::new(1, 1)])).await;

        assert!(matches!(result, Err(HandlerError::Transient(_))));
    }

    #[tokio::test]
    async fn test_unrelated_event_is_permanent() {
        let service = InventoryService::new(InMemoryReservationEngine::seeded());
        let result = service
            .react(&EventEnvelope::new(
                SagaEvent::KitchenAccepted(KitchenAccepted {
                    order_id: OrderId::new(1),
                }),
                PropagationContext::new_root(),
            ))
            .await;

        assert!(matches!(
            result,
            Err(SagaError::UnexpectedEvent {
                service: "inventory",
                kind: EventKind::KitchenAccepted
            })
        ));
    }
}
