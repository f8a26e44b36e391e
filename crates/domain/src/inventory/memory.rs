use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, OrderItem, ProductId};
use tokio::sync::Mutex;

use super::{
    InventoryReservation, Product, ReservationEngine, ReservationOutcome, ReservationStatus,
    reservable_lines,
};
use crate::error::{DomainError, Result};

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: BTreeMap<ProductId, Product>,
    reservations: Vec<InventoryReservation>,
    fail_on_reserve: bool,
}

/// In-memory reservation engine.
///
/// The whole check-and-reserve runs under one lock, which gives the same
/// all-or-nothing and serialization guarantees as the row locks in Postgres.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReservationEngine {
    state: Arc<Mutex<InMemoryInventoryState>>,
}

impl InMemoryReservationEngine {
    /// Creates an engine with no products.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine stocked with `products`.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let state = InMemoryInventoryState {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Creates an engine stocked with the seed menu.
    pub fn seeded() -> Self {
        Self::with_products(Product::seed())
    }

    /// Makes reservation attempts fail with a transient error until switched off.
    pub async fn set_fail_on_reserve(&self, fail: bool) {
        self.state.lock().await.fail_on_reserve = fail;
    }

    /// Returns the available quantity of a product.
    pub async fn stock(&self, product_id: i64) -> Option<i64> {
        self.state
            .lock()
            .await
            .products
            .get(&ProductId::new(product_id))
            .map(|p| p.quantity)
    }
}

#[async_trait]
impl ReservationEngine for InMemoryReservationEngine {
    async fn check_and_reserve(
        &self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<ReservationOutcome> {
        let mut state = self.state.lock().await;
        if state.fail_on_reserve {
            return Err(DomainError::Unavailable("inventory store is failing".to_string()));
        }
        let lines = reservable_lines(items)?;
        if state.reservations.iter().any(|r| r.order_id == order_id) {
            return Ok(ReservationOutcome::Accepted);
        }

        for (product_id, requested) in &lines {
            let Some(product) = state.products.get(product_id) else {
                return Ok(ReservationOutcome::product_not_found(*product_id));
            };
            if product.quantity < *requested {
                return Ok(ReservationOutcome::insufficient(
                    *product_id,
                    *requested,
                    product.quantity,
                ));
            }
        }

        let now = Utc::now();
        for (product_id, requested) in lines {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.quantity -= requested;
                product.updated_at = now;
            }
            state.reservations.push(InventoryReservation {
                order_id,
                product_id,
                quantity: requested,
                status: ReservationStatus::Reserved,
                created_at: now,
                updated_at: now,
            });
        }
        Ok(ReservationOutcome::Accepted)
    }

    async fn confirm(&self, order_id: OrderId) -> Result<u64> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut changed = 0;
        for reservation in state.reservations.iter_mut() {
            if reservation.order_id == order_id
                && reservation.status == ReservationStatus::Reserved
            {
                reservation.status = ReservationStatus::Confirmed;
                reservation.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn release(&self, order_id: OrderId) -> Result<u64> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = Utc::now();
        let mut changed = 0;
        for reservation in state.reservations.iter_mut() {
            if reservation.order_id == order_id
                && reservation.status == ReservationStatus::Reserved
            {
                if let Some(product) = state.products.get_mut(&reservation.product_id) {
                    product.quantity += reservation.quantity;
                    product.updated_at = now;
                }
                reservation.status = ReservationStatus::Released;
                reservation.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&product_id).cloned())
    }

    async fn reservations(&self, order_id: OrderId) -> Result<Vec<InventoryReservation>> {
        Ok(self
            .state
            .lock()
            .await
            .reservations
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }
}
