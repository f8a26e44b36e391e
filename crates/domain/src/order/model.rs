//! The persisted order record.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItem};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderStatus};

/// An order as stored by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    pub delivery_address: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every status write.
    pub version: i64,
    pub items: Vec<OrderItem>,
}

/// An order that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: String,
    pub delivery_address: String,
    pub items: Vec<OrderItem>,
}

impl NewOrder {
    pub fn new(
        customer_id: impl Into<String>,
        delivery_address: impl Into<String>,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            delivery_address: delivery_address.into(),
            items,
        }
    }

    /// Checks the order can enter the saga.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.customer_id.trim().is_empty() {
            return Err(OrderError::CustomerIdRequired);
        }
        if self.delivery_address.trim().is_empty() {
            return Err(OrderError::DeliveryAddressRequired);
        }
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &self.items {
            if item.product_id.as_i64() <= 0 {
                return Err(OrderError::InvalidProductId {
                    product_id: item.product_id.as_i64(),
                });
            }
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id.as_i64(),
                });
            }
            if let Some(price) = item.unit_price_cents
                && price < 0
            {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id.as_i64(),
                });
            }
        }
        Ok(())
    }
}
