//! Order record, status lifecycle and persistence.

mod memory;
mod model;
mod postgres;
mod repository;
mod status;

pub use memory::InMemoryOrderRepository;
pub use model::{NewOrder, Order};
pub use postgres::PostgresOrderRepository;
pub use repository::OrderRepository;
pub use status::{OrderStatus, StatusChange};

use thiserror::Error;

/// Errors raised by order validation.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Customer ID is required.
    #[error("Customer ID is required")]
    CustomerIdRequired,

    /// Delivery address is required.
    #[error("Delivery address is required")]
    DeliveryAddressRequired,

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    #[error("Invalid product id: {product_id}")]
    InvalidProductId { product_id: i64 },

    /// Invalid quantity.
    #[error("Invalid quantity for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: i64 },

    /// Invalid price.
    #[error("Invalid price for product {product_id} (must not be negative)")]
    InvalidPrice { product_id: i64 },

    /// A stored status could not be parsed.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
