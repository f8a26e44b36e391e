use async_trait::async_trait;
use common::{OrderId, OrderItem, ProductId};

use super::{InventoryReservation, Product, ReservationOutcome};
use crate::error::Result;

/// Check-and-decrement of stock for whole orders.
///
/// A reservation is all-or-nothing: either every line of the order is
/// decremented and recorded as `reserved`, or no stock moves at all.
/// Retrying an order that already holds reservations is accepted without
/// touching stock again.
#[async_trait]
pub trait ReservationEngine: Send + Sync {
    /// Reserves stock for every line of the order.
    ///
    /// `Ok(Rejected)` is a business decision and must not be retried;
    /// `Err` means the attempt did not complete.
    async fn check_and_reserve(
        &self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<ReservationOutcome>;

    /// Marks the order's `reserved` rows `confirmed`. Returns rows changed.
    async fn confirm(&self, order_id: OrderId) -> Result<u64>;

    /// Returns the order's `reserved` stock and marks its rows `released`.
    /// Returns rows changed.
    async fn release(&self, order_id: OrderId) -> Result<u64>;

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>>;

    async fn reservations(&self, order_id: OrderId) -> Result<Vec<InventoryReservation>>;
}
