//! Stock, reservations and the reservation engine.

mod engine;
mod memory;
mod model;
mod postgres;

pub use engine::ReservationEngine;
pub use memory::InMemoryReservationEngine;
pub use model::{
    InventoryReservation, Product, ReservationOutcome, ReservationStatus, lock_order,
    reservable_lines,
};
pub use postgres::PostgresReservationEngine;
