//! Kitchen service handler.

use std::sync::Arc;

use async_trait::async_trait;
use bus::{EventHandler, HandlerError, Publisher};
use events::{EventEnvelope, KitchenAccepted, OrderCooked, SagaEvent};
use tracing::info;

use crate::error::{Result, SagaError};
use crate::simulation::{SimulatedDelay, Workers};

const SERVICE: &str = "kitchen";

/// Accepts orders that are ready for the kitchen and cooks them.
///
/// `kitchen.accepted` is returned from the handler and published before the
/// trigger is acknowledged. `kitchen.order_cooked` is published by a detached
/// task once the cook time has elapsed.
pub struct KitchenService {
    publisher: Arc<dyn Publisher>,
    cook: SimulatedDelay,
    workers: Workers,
}

impl KitchenService {
    pub fn new(publisher: Arc<dyn Publisher>, cook: SimulatedDelay) -> Self {
        Self {
            publisher,
            cook,
            workers: Workers::new(SERVICE),
        }
    }

    /// Gets the cook tasks.
    pub fn workers(&self) -> &Workers {
        &self.workers
    }

    /// Applies one inbound event and returns the events to publish.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %envelope.event.order_id(), kind = %envelope.kind())
    )]
    pub async fn react(&self, envelope: &EventEnvelope) -> Result<Vec<EventEnvelope>> {
        let SagaEvent::ReadyForKitchen(ready) = &envelope.event else {
            return Err(SagaError::UnexpectedEvent {
                service: SERVICE,
                kind: envelope.kind(),
            });
        };

        let cooked = EventEnvelope::caused_by(
            SagaEvent::OrderCooked(OrderCooked {
                order_id: ready.order_id,
                items: ready.items.clone(),
            }),
            envelope,
        );
        let publisher = Arc::clone(&self.publisher);
        let cook = self.cook;
        self.workers
            .start(ready.order_id, envelope.context.trace_id(), async move {
                cook.wait().await;
                publisher.publish(&cooked).await?;
                info!("Order cooked");
                Ok(())
            })
            .await;

        info!(items = ready.items.len(), "Kitchen accepted order");
        Ok(vec![EventEnvelope::caused_by(
            SagaEvent::KitchenAccepted(KitchenAccepted {
                order_id: ready.order_id,
            }),
            envelope,
        )])
    }
}

#[async_trait]
impl EventHandler for KitchenService {
    async fn handle(
        &self,
        envelope: EventEnvelope,
    ) -> std::result::Result<Vec<EventEnvelope>, HandlerError> {
        Ok(self.react(&envelope).await?)
    }
}
