//! Types shared by every fulfillment service.

pub mod types;

pub use types::{OrderId, OrderItem, ProductId};
