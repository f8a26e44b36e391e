//! Order saga coordinator.

use async_trait::async_trait;
use bus::{EventHandler, HandlerError};
use common::OrderId;
use domain::{NewOrder, Order, OrderRepository, StatusChange};
use events::{EventEnvelope, OrderCreated, PropagationContext, SagaEvent};
use tracing::{info, warn};

use crate::error::{Result, SagaError};
use crate::transition::{Reaction, emits_follow_up, follow_up_event, reaction_to};

/// Owns the order record and drives it through its lifecycle.
///
/// The coordinator seeds the saga when an order is created and then reacts
/// to the events the other services publish. It never talks to the broker:
/// reactions return the events to publish and the bus adapter publishes
/// them before acknowledging the inbound delivery.
pub struct OrderSagaCoordinator<R: OrderRepository> {
    orders: R,
}

impl<R: OrderRepository> OrderSagaCoordinator<R> {
    /// Creates a new coordinator over `orders`.
    pub fn new(orders: R) -> Self {
        Self { orders }
    }

    /// Gets a reference to the order repository.
    pub fn orders(&self) -> &R {
        &self.orders
    }

    /// Stores a new order and returns the `order.created` event that seeds
    /// the saga.
    #[tracing::instrument(skip_all, fields(customer_id = %new_order.customer_id))]
    pub async fn create_order(
        &self,
        new_order: NewOrder,
        context: PropagationContext,
    ) -> Result<(Order, EventEnvelope)> {
        let order = self.orders.create(new_order).await?;
        metrics::counter!("orders_created_total").increment(1);
        info!(order_id = %order.id, items = order.items.len(), "Order created");

        let event = SagaEvent::OrderCreated(OrderCreated {
            order_id: order.id,
            customer_id: order.customer_id.clone(),
            status: order.status.as_str().to_string(),
            created_at: order.created_at,
            items: order.items.clone(),
        });
        Ok((order, EventEnvelope::new(event, context)))
    }

    /// Loads an order.
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.get(id).await?)
    }

    /// Applies one inbound event and returns the events to publish.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %envelope.event.order_id(), kind = %envelope.kind())
    )]
    pub async fn react(&self, envelope: &EventEnvelope) -> Result<Vec<EventEnvelope>> {
        let order_id = envelope.event.order_id();

        match reaction_to(&envelope.event)? {
            Reaction::Observe => {
                let order = self
                    .orders
                    .get(order_id)
                    .await?
                    .ok_or(SagaError::OrderNotFound(order_id))?;
                if let SagaEvent::InventoryReserved(e) = &envelope.event {
                    warn!(
                        status = %order.status,
                        reason = %e.message,
                        "Inventory reservation rejected, order stays pending"
                    );
                } else {
                    info!(status = %order.status, "Kitchen accepted order");
                }
                Ok(vec![])
            }
            Reaction::Advance { target, follow_up } => {
                let (order, change) = self
                    .orders
                    .advance_status(order_id, target)
                    .await
                    .map_err(|e| match e {
                        domain::DomainError::OrderNotFound(id) => SagaError::OrderNotFound(id),
                        other => SagaError::Domain(other),
                    })?;

                match change {
                    StatusChange::Advanced { from, to } => {
                        metrics::counter!("order_status_transitions_total", "status" => to.as_str())
                            .increment(1);
                        info!(%from, %to, "Order status advanced");
                    }
                    StatusChange::Unchanged => {
                        info!(status = %order.status, "Order already at target status");
                    }
                    StatusChange::Stale { current } => {
                        warn!(%current, %target, "Ignoring stale event");
                    }
                    StatusChange::Skipped { current } => {
                        warn!(%current, %target, "Ignoring event that skips the reservation");
                    }
                }

                let outbound = match follow_up {
                    Some(follow_up) if emits_follow_up(change) => vec![EventEnvelope::caused_by(
                        follow_up_event(follow_up, &order),
                        envelope,
                    )],
                    _ => vec![],
                };
                Ok(outbound)
            }
        }
    }
}

#[async_trait]
impl<R: OrderRepository> EventHandler for OrderSagaCoordinator<R> {
    async fn handle(
        &self,
        envelope: EventEnvelope,
    ) -> std::result::Result<Vec<EventEnvelope>, HandlerError> {
        Ok(self.react(&envelope).await?)
    }
}
