use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::OrderId;
use tokio::sync::Mutex;

use super::{NewOrder, Order, OrderRepository, OrderStatus, StatusChange};
use crate::error::{DomainError, Result};

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, Order>,
    next_id: i64,
    fail_on_write: bool,
}

/// In-memory order repository for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<Mutex<InMemoryOrderState>>,
}

impl InMemoryOrderRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail with a transient error until switched off.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.state.lock().await.fail_on_write = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order> {
        order.validate()?;
        let mut state = self.state.lock().await;
        if state.fail_on_write {
            return Err(DomainError::Unavailable("order store is failing".to_string()));
        }

        state.next_id += 1;
        let now = Utc::now();
        let stored = Order {
            id: OrderId::new(state.next_id),
            customer_id: order.customer_id,
            delivery_address: order.delivery_address,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            version: 1,
            items: order.items,
        };
        state.orders.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn advance_status(
        &self,
        id: OrderId,
        target: OrderStatus,
    ) -> Result<(Order, StatusChange)> {
        let mut state = self.state.lock().await;
        if state.fail_on_write {
            return Err(DomainError::Unavailable("order store is failing".to_string()));
        }
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(DomainError::OrderNotFound(id))?;

        let change = order.status.transition_to(target);
        if change.is_advanced() {
            order.status = target;
            order.version += 1;
            order.updated_at = Utc::now();
        }
        Ok((order.clone(), change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderItem;

    fn new_order() -> NewOrder {
        NewOrder::new("cust-1", "12 Elm Street", vec![OrderItem::new(1, 2)])
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_pending_status() {
        let repo = InMemoryOrderRepository::new();
        let first = repo.create(new_order()).await.unwrap();
        let second = repo.create(new_order()).await.unwrap();

        assert_eq!(first.id, OrderId::new(1));
        assert_eq!(second.id, OrderId::new(2));
        assert_eq!(first.status, OrderStatus::Pending);
        assert_eq!(repo.get(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_invalid_order_is_not_stored() {
        let repo = InMemoryOrderRepository::new();
        let result = repo
            .create(NewOrder::new("cust-1", "12 Elm Street", vec![]))
            .await;
        assert!(matches!(result, Err(DomainError::Order(_))));
        assert_eq!(repo.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_advance_is_monotonic_and_versioned() {
        let repo = InMemoryOrderRepository::new();
        let order = repo.create(new_order()).await.unwrap();

        let (after, change) = repo
            .advance_status(order.id, OrderStatus::WaitingForKitchen)
            .await
            .unwrap();
        assert!(change.is_advanced());
        assert_eq!(after.version, 2);

        let (again, change) = repo
            .advance_status(order.id, OrderStatus::WaitingForKitchen)
            .await
            .unwrap();
        assert_eq!(change, StatusChange::Unchanged);
        assert_eq!(again.version, 2);

        let (back, change) = repo
            .advance_status(order.id, OrderStatus::Pending)
            .await
            .unwrap();
        assert_eq!(
            change,
            StatusChange::Stale {
                current: OrderStatus::WaitingForKitchen
            }
        );
        assert_eq!(back.status, OrderStatus::WaitingForKitchen);
    }

    #[tokio::test]
    async fn test_advance_unknown_order_fails() {
        let repo = InMemoryOrderRepository::new();
        let result = repo
            .advance_status(OrderId::new(99), OrderStatus::WaitingForKitchen)
            .await;
        assert!(matches!(result, Err(DomainError::OrderNotFound(id)) if id == OrderId::new(99)));
    }

    #[tokio::test]
    async fn test_failing_store_is_transient() {
        let repo = InMemoryOrderRepository::new();
        let order = repo.create(new_order()).await.unwrap();
        repo.set_fail_on_write(true).await;

        let err = repo
            .advance_status(order.id, OrderStatus::WaitingForKitchen)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(
            repo.get(order.id).await.unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }
}
