//! Domain layer for the order fulfillment services.
//!
//! This crate provides:
//! - the order record and its forward-only status lifecycle
//! - `OrderRepository`, the single writer of order status
//! - `ReservationEngine`, the all-or-nothing stock reservation
//!
//! Each store has an in-memory and a PostgreSQL implementation.

pub mod error;
pub mod inventory;
pub mod order;

pub use error::{DomainError, Result};
pub use inventory::{
    InMemoryReservationEngine, InventoryReservation, PostgresReservationEngine, Product,
    ReservationEngine, ReservationOutcome, ReservationStatus,
};
pub use order::{
    InMemoryOrderRepository, NewOrder, Order, OrderError, OrderRepository, OrderStatus,
    PostgresOrderRepository, StatusChange,
};
