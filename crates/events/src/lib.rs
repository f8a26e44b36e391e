//! Event codec for the order fulfillment saga.
//!
//! Every event travels as a protobuf payload selected by its routing key,
//! plus string headers carrying the schema version and the opaque
//! propagation context. Field-level compatibility comes from protobuf:
//! unknown fields are skipped and absent fields decode to defaults.

pub mod context;
pub mod envelope;
pub mod error;
pub mod event;
pub mod kind;
pub mod proto;

pub use common::{OrderId, OrderItem, ProductId};
pub use context::PropagationContext;
pub use envelope::{
    CONTENT_TYPE, EVENT_TYPE_HEADER, EventEnvelope, SCHEMA_VERSION, SCHEMA_VERSION_HEADER,
    WireMessage,
};
pub use error::{CodecError, Result};
pub use event::{
    DeliveryCompleted, DeliveryStarted, InventoryReserved, KitchenAccepted, OrderCooked,
    OrderCreated, OrderReadyForDelivery, ReadyForKitchen, SagaEvent,
};
pub use kind::EventKind;
