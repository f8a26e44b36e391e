//! Event kinds and their routing keys.

/// The eight kinds of event exchanged by the fulfillment services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OrderCreated,
    InventoryReserved,
    ReadyForKitchen,
    KitchenAccepted,
    OrderCooked,
    OrderReadyForDelivery,
    DeliveryStarted,
    DeliveryCompleted,
}

impl EventKind {
    /// Every kind, in saga order.
    pub const ALL: [EventKind; 8] = [
        EventKind::OrderCreated,
        EventKind::InventoryReserved,
        EventKind::ReadyForKitchen,
        EventKind::KitchenAccepted,
        EventKind::OrderCooked,
        EventKind::OrderReadyForDelivery,
        EventKind::DeliveryStarted,
        EventKind::DeliveryCompleted,
    ];

    /// Returns the topic routing key this kind is published under.
    pub fn routing_key(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "order.created",
            EventKind::InventoryReserved => "inventory.reserved",
            EventKind::ReadyForKitchen => "order.ready_for_kitchen",
            EventKind::KitchenAccepted => "kitchen.accepted",
            EventKind::OrderCooked => "kitchen.order_cooked",
            EventKind::OrderReadyForDelivery => "order.ready_for_delivery",
            EventKind::DeliveryStarted => "delivery.started",
            EventKind::DeliveryCompleted => "delivery.completed",
        }
    }

    /// Looks up the kind published under `routing_key`.
    pub fn from_routing_key(routing_key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.routing_key() == routing_key)
    }

    /// Returns the schema name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "OrderCreated",
            EventKind::InventoryReserved => "InventoryReserved",
            EventKind::ReadyForKitchen => "ReadyForKitchen",
            EventKind::KitchenAccepted => "KitchenAccepted",
            EventKind::OrderCooked => "OrderCooked",
            EventKind::OrderReadyForDelivery => "OrderReadyForDelivery",
            EventKind::DeliveryStarted => "DeliveryStarted",
            EventKind::DeliveryCompleted => "DeliveryCompleted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_keys_are_unique_and_resolvable() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_routing_key(kind.routing_key()), Some(kind));
        }
        let mut keys: Vec<_> = EventKind::ALL.iter().map(|k| k.routing_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_unknown_routing_key() {
        assert_eq!(EventKind::from_routing_key("order.cancelled"), None);
        assert_eq!(EventKind::from_routing_key(""), None);
    }

    #[test]
    fn test_display_uses_schema_name() {
        assert_eq!(EventKind::OrderCooked.to_string(), "OrderCooked");
        assert_eq!(EventKind::OrderCooked.routing_key(), "kitchen.order_cooked");
    }
}
