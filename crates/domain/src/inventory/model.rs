use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItem, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A stocked product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Units available for new reservations. Never negative.
    pub quantity: i64,
    pub price_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(id: i64, name: impl Into<String>, quantity: i64, price_cents: i64) -> Self {
        Self {
            id: ProductId::new(id),
            name: name.into(),
            quantity,
            price_cents,
            updated_at: Utc::now(),
        }
    }

    /// The menu the inventory migration seeds.
    pub fn seed() -> Vec<Product> {
        vec![
            Product::new(1, "Margherita Pizza", 100, 1299),
            Product::new(2, "Caesar Salad", 50, 899),
            Product::new(3, "Garlic Bread", 75, 499),
        ]
    }
}

/// Lifecycle of a reservation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Reserved,
    Released,
    Confirmed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Released => "released",
            ReservationStatus::Confirmed => "confirmed",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(ReservationStatus::Reserved),
            "released" => Ok(ReservationStatus::Released),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            other => Err(DomainError::Corrupt(format!(
                "unknown reservation status {other}"
            ))),
        }
    }
}

/// Stock held for one product of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryReservation {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a reservation attempt that reached a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Every line was reserved.
    Accepted,
    /// A business rule refused the order; nothing was reserved.
    Rejected { reason: String },
}

impl ReservationOutcome {
    pub const ACCEPTED_MESSAGE: &'static str = "Successfully reserved inventory";

    pub fn is_accepted(&self) -> bool {
        matches!(self, ReservationOutcome::Accepted)
    }

    /// Human-readable message carried on `inventory.reserved`.
    pub fn message(&self) -> &str {
        match self {
            ReservationOutcome::Accepted => Self::ACCEPTED_MESSAGE,
            ReservationOutcome::Rejected { reason } => reason,
        }
    }

    pub(crate) fn product_not_found(product_id: ProductId) -> Self {
        ReservationOutcome::Rejected {
            reason: format!("Product {product_id} not found"),
        }
    }

    pub(crate) fn insufficient(product_id: ProductId, requested: i64, available: i64) -> Self {
        ReservationOutcome::Rejected {
            reason: format!(
                "Insufficient quantity for product {product_id} (requested: {requested}, available: {available})"
            ),
        }
    }
}

/// Validates a reservation request and returns its lines in lock order.
///
/// An empty request or a line for zero units can never be reserved.
pub fn reservable_lines(items: &[OrderItem]) -> Result<Vec<(ProductId, i64)>, DomainError> {
    if items.is_empty() {
        return Err(DomainError::InvalidReservation("no line items".to_string()));
    }
    if let Some(item) = items.iter().find(|item| item.quantity == 0) {
        return Err(DomainError::InvalidReservation(format!(
            "zero quantity for product {}",
            item.product_id
        )));
    }
    Ok(lock_order(items))
}

/// Merges lines for the same product and orders them by ascending id.
///
/// Every engine locks stock rows in this order, so two orders touching the
/// same products can never wait on each other in a cycle.
pub fn lock_order(items: &[OrderItem]) -> Vec<(ProductId, i64)> {
    let mut merged: BTreeMap<ProductId, i64> = BTreeMap::new();
    for item in items {
        *merged.entry(item.product_id).or_default() += i64::from(item.quantity);
    }
    merged.into_iter().collect()
}
