//! The order service's reaction table.
//!
//! Which status an inbound event asks for, and which event follows, are pure
//! functions of the inbound event and the stored order. Nothing here touches
//! storage or the bus.
//!
//! | Inbound                            | Status write              | Follow-up                  |
//! |------------------------------------|---------------------------|----------------------------|
//! | `inventory.reserved` success=true  | → `waiting_for_kitchen`   | `order.ready_for_kitchen`  |
//! | `inventory.reserved` success=false | none                      | none                       |
//! | `kitchen.accepted`                 | none                      | none                       |
//! | `kitchen.order_cooked`             | → `ready_for_delivery`    | `order.ready_for_delivery` |
//! | `delivery.started`                 | → `delivery_started`      | none                       |
//! | `delivery.completed`               | → `delivery_completed`    | none                       |

use domain::{Order, OrderStatus, StatusChange};
use events::{OrderReadyForDelivery, ReadyForKitchen, SagaEvent};

use crate::error::{Result, SagaError};

pub(crate) const SERVICE: &str = "order";

/// Event the order service publishes after a status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    ReadyForKitchen,
    ReadyForDelivery,
}

/// What the order service does with an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Move the order forward, then publish the follow-up if any.
    Advance {
        target: OrderStatus,
        follow_up: Option<FollowUp>,
    },
    /// The order must exist, but nothing is written or published.
    Observe,
}

/// Looks up the reaction to `event`.
pub fn reaction_to(event: &SagaEvent) -> Result<Reaction> {
    let reaction = match event {
        SagaEvent::InventoryReserved(e) if e.success => Reaction::Advance {
            target: OrderStatus::WaitingForKitchen,
            follow_up: Some(FollowUp::ReadyForKitchen),
        },
        SagaEvent::InventoryReserved(_) => Reaction::Observe,
        SagaEvent::KitchenAccepted(_) => Reaction::Observe,
        SagaEvent::OrderCooked(_) => Reaction::Advance {
            target: OrderStatus::ReadyForDelivery,
            follow_up: Some(FollowUp::ReadyForDelivery),
        },
        SagaEvent::DeliveryStarted(_) => Reaction::Advance {
            target: OrderStatus::DeliveryStarted,
            follow_up: None,
        },
        SagaEvent::DeliveryCompleted(_) => Reaction::Advance {
            target: OrderStatus::DeliveryCompleted,
            follow_up: None,
        },
        SagaEvent::OrderCreated(_)
        | SagaEvent::ReadyForKitchen(_)
        | SagaEvent::OrderReadyForDelivery(_) => {
            return Err(SagaError::UnexpectedEvent {
                service: SERVICE,
                kind: event.kind(),
            });
        }
    };
    Ok(reaction)
}

/// Whether the follow-up is published after a status write.
///
/// A write that found the order already at the target still publishes, so a
/// crash between the write and the publish heals on redelivery. A stale or
/// skipping event publishes nothing.
pub fn emits_follow_up(change: StatusChange) -> bool {
    match change {
        StatusChange::Advanced { .. } | StatusChange::Unchanged => true,
        StatusChange::Stale { .. } | StatusChange::Skipped { .. } => false,
    }
}

/// Builds the follow-up event from the stored order.
pub fn follow_up_event(follow_up: FollowUp, order: &Order) -> SagaEvent {
    match follow_up {
        FollowUp::ReadyForKitchen => SagaEvent::ReadyForKitchen(ReadyForKitchen {
            order_id: order.id,
            items: order.items.clone(),
        }),
        FollowUp::ReadyForDelivery => SagaEvent::OrderReadyForDelivery(OrderReadyForDelivery {
            order_id: order.id,
            items: order.items.clone(),
            delivery_address: order.delivery_address.clone(),
            customer_id: order.customer_id.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{OrderId, OrderItem};
    use events::{
        DeliveryCompleted, DeliveryStarted, InventoryReserved, KitchenAccepted, OrderCooked,
        OrderCreated,
    };

    fn id() -> OrderId {
        OrderId::new(7)
    }

    fn order() -> Order {
        Order {
            id: id(),
            customer_id: "cust-1".to_string(),
            delivery_address: "12 Elm Street".to_string(),
            status: OrderStatus::WaitingForKitchen,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 2,
            items: vec![OrderItem::new(1, 2)],
        }
    }

    fn reserved(success: bool) -> SagaEvent {
        SagaEvent::InventoryReserved(InventoryReserved {
            order_id: id(),
            success,
            message: String::new(),
            items: vec![],
        })
    }

    #[test]
    fn test_successful_reservation_advances_to_kitchen() {
        assert_eq!(
            reaction_to(&reserved(true)).unwrap(),
            Reaction::Advance {
                target: OrderStatus::WaitingForKitchen,
                follow_up: Some(FollowUp::ReadyForKitchen)
            }
        );
    }

    #[test]
    fn test_rejected_reservation_and_acceptance_only_observe() {
        assert_eq!(reaction_to(&reserved(false)).unwrap(), Reaction::Observe);
        assert_eq!(
            reaction_to(&SagaEvent::KitchenAccepted(KitchenAccepted { order_id: id() })).unwrap(),
            Reaction::Observe
        );
    }

    #[test]
    fn test_delivery_events_advance_without_follow_up() {
        assert_eq!(
            reaction_to(&SagaEvent::DeliveryStarted(DeliveryStarted { order_id: id() })).unwrap(),
            Reaction::Advance {
                target: OrderStatus::DeliveryStarted,
                follow_up: None
            }
        );
        assert_eq!(
            reaction_to(&SagaEvent::DeliveryCompleted(DeliveryCompleted { order_id: id() }))
                .unwrap(),
            Reaction::Advance {
                target: OrderStatus::DeliveryCompleted,
                follow_up: None
            }
        );
    }

    #[test]
    fn test_own_events_are_unexpected() {
        let created = SagaEvent::OrderCreated(OrderCreated {
            order_id: id(),
            customer_id: "c".to_string(),
            status: "pending".to_string(),
            created_at: Utc::now(),
            items: vec![],
        });
        assert!(matches!(
            reaction_to(&created),
            Err(SagaError::UnexpectedEvent { service: "order", .. })
        ));
    }

    #[test]
    fn test_stale_writes_emit_nothing() {
        assert!(emits_follow_up(StatusChange::Advanced {
            from: OrderStatus::Pending,
            to: OrderStatus::WaitingForKitchen
        }));
        assert!(emits_follow_up(StatusChange::Unchanged));
        assert!(!emits_follow_up(StatusChange::Stale {
            current: OrderStatus::DeliveryStarted
        }));
        assert!(!emits_follow_up(StatusChange::Skipped {
            current: OrderStatus::Pending
        }));
    }

    #[test]
    fn test_ready_for_delivery_carries_order_details() {
        let cooked = SagaEvent::OrderCooked(OrderCooked {
            order_id: id(),
            items: vec![],
        });
        let Reaction::Advance {
            follow_up: Some(follow_up),
            ..
        } = reaction_to(&cooked).unwrap()
        else {
            panic!("cooked orders advance with a follow-up");
        };

        match follow_up_event(follow_up, &order()) {
            SagaEvent::OrderReadyForDelivery(e) => {
                assert_eq!(e.order_id, id());
                assert_eq!(e.delivery_address, "12 Elm Street");
                assert_eq!(e.customer_id, "cust-1");
                assert_eq!(e.items, vec![OrderItem::new(1, 2)]);
            }
            other => panic!("unexpected follow-up {other:?}"),
        }
    }
}
