//! Exchange, queues and routing-key bindings.

use events::EventKind;

/// The durable topic exchange every service publishes to.
pub const EXCHANGE: &str = "order_events";

/// A durable queue and the routing-key patterns bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub bindings: Vec<String>,
}

impl QueueSpec {
    pub fn new<I, S>(name: impl Into<String>, bindings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            bindings: bindings.into_iter().map(Into::into).collect(),
        }
    }

    fn for_kinds(name: &str, kinds: &[EventKind]) -> Self {
        Self::new(name, kinds.iter().map(|kind| kind.routing_key()))
    }

    pub fn order_service() -> Self {
        Self::for_kinds(
            "order_service_events",
            &[
                EventKind::InventoryReserved,
                EventKind::KitchenAccepted,
                EventKind::OrderCooked,
                EventKind::DeliveryStarted,
                EventKind::DeliveryCompleted,
            ],
        )
    }

    pub fn inventory_service() -> Self {
        Self::for_kinds(
            "inventory_service_events",
            &[EventKind::OrderCreated, EventKind::DeliveryCompleted],
        )
    }

    pub fn kitchen_service() -> Self {
        Self::for_kinds("kitchen_service_events", &[EventKind::ReadyForKitchen])
    }

    pub fn delivery_service() -> Self {
        Self::for_kinds(
            "delivery_service_events",
            &[EventKind::OrderReadyForDelivery],
        )
    }

    /// Whether a message published under `routing_key` lands in this queue.
    pub fn accepts(&self, routing_key: &str) -> bool {
        self.bindings
            .iter()
            .any(|pattern| routing_key_matches(pattern, routing_key))
    }
}

/// AMQP topic matching: `*` is exactly one word, `#` is zero or more.
pub fn routing_key_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&first, key_rest)) => {
                (word == "*" || word == first) && matches_words(rest, key_rest)
            }
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(routing_key_matches("order.created", "order.created"));
        assert!(!routing_key_matches("order.created", "order.ready_for_kitchen"));
        assert!(!routing_key_matches("order.created", "order.created.v2"));
    }

    #[test]
    fn test_star_matches_one_word() {
        assert!(routing_key_matches("delivery.*", "delivery.started"));
        assert!(routing_key_matches("*.completed", "delivery.completed"));
        assert!(!routing_key_matches("delivery.*", "delivery"));
        assert!(!routing_key_matches("delivery.*", "delivery.started.late"));
    }

    #[test]
    fn test_hash_matches_zero_or_more_words() {
        assert!(routing_key_matches("#", "kitchen.order_cooked"));
        assert!(routing_key_matches("order.#", "order"));
        assert!(routing_key_matches("order.#", "order.ready_for_kitchen"));
        assert!(routing_key_matches("#.completed", "delivery.completed"));
        assert!(!routing_key_matches("order.#", "kitchen.accepted"));
    }

    #[test]
    fn test_service_queues_route_every_kind_to_its_consumer() {
        let queues = [
            QueueSpec::order_service(),
            QueueSpec::inventory_service(),
            QueueSpec::kitchen_service(),
            QueueSpec::delivery_service(),
        ];
        fn consumers_of<'a>(queues: &'a [QueueSpec], key: &str) -> Vec<&'a str> {
            queues
                .iter()
                .filter(|q| q.accepts(key))
                .map(|q| q.name.as_str())
                .collect()
        }
        let consumers = |key: &str| consumers_of(&queues, key);

        assert_eq!(consumers("order.created"), vec!["inventory_service_events"]);
        assert_eq!(consumers("inventory.reserved"), vec!["order_service_events"]);
        assert_eq!(consumers("order.ready_for_kitchen"), vec!["kitchen_service_events"]);
        assert_eq!(consumers("kitchen.accepted"), vec!["order_service_events"]);
        assert_eq!(consumers("kitchen.order_cooked"), vec!["order_service_events"]);
        assert_eq!(
            consumers("order.ready_for_delivery"),
            vec!["delivery_service_events"]
        );
        assert_eq!(consumers("delivery.started"), vec!["order_service_events"]);
        assert_eq!(
            consumers("delivery.completed"),
            vec!["order_service_events", "inventory_service_events"]
        );
    }
}
