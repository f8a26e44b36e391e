use async_trait::async_trait;
use common::OrderId;

use super::{NewOrder, Order, OrderStatus, StatusChange};
use crate::error::Result;

/// Storage for order records.
///
/// The only writer of an order's status. Status writes are conditional: the
/// current status is read under a lock and the write happens only when it
/// moves the order forward, so redelivered or late events are harmless.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Validates and stores a new order with status `pending`.
    async fn create(&self, order: NewOrder) -> Result<Order>;

    /// Loads an order with its items.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Moves the order to `target` if that is forward.
    ///
    /// Returns the order as stored after the call and what happened.
    /// Fails with `OrderNotFound` if there is no such order.
    async fn advance_status(&self, id: OrderId, target: OrderStatus)
    -> Result<(Order, StatusChange)>;
}
