//! Message bus adapter for the order fulfillment saga.
//!
//! One durable topic exchange is shared by every service; each service owns
//! a durable queue bound to the routing keys it consumes. Handlers never talk
//! to the broker: they return an outcome and [`dispatch`] alone decides
//! whether the delivery is acknowledged, requeued or discarded.

pub mod amqp;
pub mod error;
pub mod handler;
pub mod memory;
pub mod topology;

pub use amqp::AmqpBus;
pub use error::{BusError, Result};
pub use handler::{Disposition, EventHandler, HandlerError, MessageBus, Publisher, dispatch};
pub use memory::InMemoryBus;
pub use topology::{EXCHANGE, QueueSpec, routing_key_matches};
