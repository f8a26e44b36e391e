//! Choreographed order fulfillment saga.
//!
//! Four services cooperate only through events on the shared exchange:
//!
//! 1. order: stores the order, publishes `order.created`, and advances the
//!    order status as the other services report progress
//! 2. inventory: reserves stock all-or-nothing and reports the outcome
//! 3. kitchen: accepts the order and cooks it in a detached task
//! 4. delivery: assigns a driver and delivers in a detached task
//!
//! Every handler returns the events to publish and never acknowledges
//! deliveries itself; see [`bus::dispatch`].

pub mod coordinator;
pub mod error;
pub mod services;
pub mod simulation;
pub mod transition;

pub use coordinator::OrderSagaCoordinator;
pub use error::{Result, SagaError};
pub use services::{DeliveryService, InventoryService, KitchenService};
pub use simulation::{SimulatedDelay, Workers};
pub use transition::{FollowUp, Reaction, emits_follow_up, follow_up_event, reaction_to};
