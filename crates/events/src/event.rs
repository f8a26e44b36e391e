//! Typed saga events and their protobuf mapping.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItem, ProductId};
use prost::Message;
use prost_types::Timestamp;

use crate::error::{CodecError, Result};
use crate::kind::EventKind;
use crate::proto;

/// The order was persisted with status `pending`; seeds the saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub customer_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// Outcome of the inventory reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReserved {
    pub order_id: OrderId,
    pub success: bool,
    pub message: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyForKitchen {
    pub order_id: OrderId,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitchenAccepted {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCooked {
    pub order_id: OrderId,
    pub items: Vec<OrderItem>,
}

/// Everything the delivery service needs, looked up from the order record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadyForDelivery {
    pub order_id: OrderId,
    pub items: Vec<OrderItem>,
    pub delivery_address: String,
    pub customer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryStarted {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryCompleted {
    pub order_id: OrderId,
}

/// Any event exchanged on the saga topic exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaEvent {
    OrderCreated(OrderCreated),
    InventoryReserved(InventoryReserved),
    ReadyForKitchen(ReadyForKitchen),
    KitchenAccepted(KitchenAccepted),
    OrderCooked(OrderCooked),
    OrderReadyForDelivery(OrderReadyForDelivery),
    DeliveryStarted(DeliveryStarted),
    DeliveryCompleted(DeliveryCompleted),
}

impl SagaEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            SagaEvent::OrderCreated(_) => EventKind::OrderCreated,
            SagaEvent::InventoryReserved(_) => EventKind::InventoryReserved,
            SagaEvent::ReadyForKitchen(_) => EventKind::ReadyForKitchen,
            SagaEvent::KitchenAccepted(_) => EventKind::KitchenAccepted,
            SagaEvent::OrderCooked(_) => EventKind::OrderCooked,
            SagaEvent::OrderReadyForDelivery(_) => EventKind::OrderReadyForDelivery,
            SagaEvent::DeliveryStarted(_) => EventKind::DeliveryStarted,
            SagaEvent::DeliveryCompleted(_) => EventKind::DeliveryCompleted,
        }
    }

    /// Returns the correlation key of this event.
    pub fn order_id(&self) -> OrderId {
        match self {
            SagaEvent::OrderCreated(e) => e.order_id,
            SagaEvent::InventoryReserved(e) => e.order_id,
            SagaEvent::ReadyForKitchen(e) => e.order_id,
            SagaEvent::KitchenAccepted(e) => e.order_id,
            SagaEvent::OrderCooked(e) => e.order_id,
            SagaEvent::OrderReadyForDelivery(e) => e.order_id,
            SagaEvent::DeliveryStarted(e) => e.order_id,
            SagaEvent::DeliveryCompleted(e) => e.order_id,
        }
    }

    /// Encodes the payload as protobuf bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            SagaEvent::OrderCreated(e) => proto::OrderCreated {
                order_id: e.order_id.as_i64(),
                customer_id: e.customer_id.clone(),
                status: e.status.clone(),
                created_at: Some(to_timestamp(e.created_at)),
                items: to_line_items(&e.items),
            }
            .encode_to_vec(),
            SagaEvent::InventoryReserved(e) => proto::InventoryReserved {
                order_id: e.order_id.as_i64(),
                success: e.success,
                message: e.message.clone(),
                items: to_line_items(&e.items),
            }
            .encode_to_vec(),
            SagaEvent::ReadyForKitchen(e) => proto::ReadyForKitchen {
                order_id: e.order_id.as_i64(),
                items: to_line_items(&e.items),
            }
            .encode_to_vec(),
            SagaEvent::KitchenAccepted(e) => proto::KitchenAccepted {
                order_id: e.order_id.as_i64(),
            }
            .encode_to_vec(),
            SagaEvent::OrderCooked(e) => proto::OrderCooked {
                order_id: e.order_id.as_i64(),
                items: to_line_items(&e.items),
            }
            .encode_to_vec(),
            SagaEvent::OrderReadyForDelivery(e) => proto::OrderReadyForDelivery {
                order_id: e.order_id.as_i64(),
                items: to_line_items(&e.items),
                delivery_address: e.delivery_address.clone(),
                customer_id: e.customer_id.clone(),
            }
            .encode_to_vec(),
            SagaEvent::DeliveryStarted(e) => proto::DeliveryStarted {
                order_id: e.order_id.as_i64(),
            }
            .encode_to_vec(),
            SagaEvent::DeliveryCompleted(e) => proto::DeliveryCompleted {
                order_id: e.order_id.as_i64(),
            }
            .encode_to_vec(),
        }
    }

    /// Decodes a payload of the given kind.
    pub fn decode(kind: EventKind, bytes: &[u8]) -> Result<Self> {
        let event = match kind {
            EventKind::OrderCreated => {
                let m: proto::OrderCreated = decode_message(kind, bytes)?;
                let created_at = m.created_at.ok_or(CodecError::MissingField {
                    kind: kind.as_str(),
                    field: "created_at",
                })?;
                SagaEvent::OrderCreated(OrderCreated {
                    order_id: order_id(kind, m.order_id)?,
                    customer_id: m.customer_id,
                    status: m.status,
                    created_at: from_timestamp(kind, created_at)?,
                    items: required_line_items(kind, m.items)?,
                })
            }
            EventKind::InventoryReserved => {
                let m: proto::InventoryReserved = decode_message(kind, bytes)?;
                SagaEvent::InventoryReserved(InventoryReserved {
                    order_id: order_id(kind, m.order_id)?,
                    success: m.success,
                    message: m.message,
                    items: from_line_items(kind, m.items)?,
                })
            }
            EventKind::ReadyForKitchen => {
                let m: proto::ReadyForKitchen = decode_message(kind, bytes)?;
                SagaEvent::ReadyForKitchen(ReadyForKitchen {
                    order_id: order_id(kind, m.order_id)?,
                    items: required_line_items(kind, m.items)?,
                })
            }
            EventKind::KitchenAccepted => {
                let m: proto::KitchenAccepted = decode_message(kind, bytes)?;
                SagaEvent::KitchenAccepted(KitchenAccepted {
                    order_id: order_id(kind, m.order_id)?,
                })
            }
            EventKind::OrderCooked => {
                let m: proto::OrderCooked = decode_message(kind, bytes)?;
                SagaEvent::OrderCooked(OrderCooked {
                    order_id: order_id(kind, m.order_id)?,
                    items: from_line_items(kind, m.items)?,
                })
            }
            EventKind::OrderReadyForDelivery => {
                let m: proto::OrderReadyForDelivery = decode_message(kind, bytes)?;
                SagaEvent::OrderReadyForDelivery(OrderReadyForDelivery {
                    order_id: order_id(kind, m.order_id)?,
                    items: required_line_items(kind, m.items)?,
                    delivery_address: m.delivery_address,
                    customer_id: m.customer_id,
                })
            }
            EventKind::DeliveryStarted => {
                let m: proto::DeliveryStarted = decode_message(kind, bytes)?;
                SagaEvent::DeliveryStarted(DeliveryStarted {
                    order_id: order_id(kind, m.order_id)?,
                })
            }
            EventKind::DeliveryCompleted => {
                let m: proto::DeliveryCompleted = decode_message(kind, bytes)?;
                SagaEvent::DeliveryCompleted(DeliveryCompleted {
                    order_id: order_id(kind, m.order_id)?,
                })
            }
        };
        Ok(event)
    }
}

fn decode_message<M: Message + Default>(kind: EventKind, bytes: &[u8]) -> Result<M> {
    M::decode(bytes).map_err(|source| CodecError::Decode {
        kind: kind.as_str(),
        source,
    })
}

// proto3 cannot tell "absent" from zero, and the store never assigns 0.
fn order_id(kind: EventKind, raw: i64) -> Result<OrderId> {
    let id = OrderId::new(raw);
    if raw == 0 {
        return Err(CodecError::MissingField {
            kind: kind.as_str(),
            field: "order_id",
        });
    }
    if !id.is_valid() {
        return Err(CodecError::InvalidField {
            kind: kind.as_str(),
            field: "order_id",
            reason: format!("{raw} is not a store-assigned id"),
        });
    }
    Ok(id)
}

fn to_line_items(items: &[OrderItem]) -> Vec<proto::LineItem> {
    items
        .iter()
        .map(|item| proto::LineItem {
            product_id: item.product_id.as_i64(),
            quantity: item.quantity,
            name: item.name.clone(),
            price_cents: item.unit_price_cents,
        })
        .collect()
}

// Zero means the field was never set, as with `order_id`.
fn from_line_items(kind: EventKind, items: Vec<proto::LineItem>) -> Result<Vec<OrderItem>> {
    items
        .into_iter()
        .map(|item| {
            if item.product_id == 0 {
                return Err(CodecError::MissingField {
                    kind: kind.as_str(),
                    field: "items.product_id",
                });
            }
            if item.product_id < 0 {
                return Err(CodecError::InvalidField {
                    kind: kind.as_str(),
                    field: "items.product_id",
                    reason: format!("{} is not a product id", item.product_id),
                });
            }
            if item.quantity == 0 {
                return Err(CodecError::MissingField {
                    kind: kind.as_str(),
                    field: "items.quantity",
                });
            }
            Ok(OrderItem {
                product_id: ProductId::new(item.product_id),
                quantity: item.quantity,
                name: item.name,
                unit_price_cents: item.price_cents,
            })
        })
        .collect()
}

/// Line items for events that describe a whole order.
fn required_line_items(kind: EventKind, items: Vec<proto::LineItem>) -> Result<Vec<OrderItem>> {
    if items.is_empty() {
        return Err(CodecError::MissingField {
            kind: kind.as_str(),
            field: "items",
        });
    }
    from_line_items(kind, items)
}

fn to_timestamp(at: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: at.timestamp(),
        nanos: at.timestamp_subsec_nanos() as i32,
    }
}

fn from_timestamp(kind: EventKind, ts: Timestamp) -> Result<DateTime<Utc>> {
    u32::try_from(ts.nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(ts.seconds, nanos))
        .ok_or_else(|| CodecError::InvalidField {
            kind: kind.as_str(),
            field: "created_at",
            reason: format!("{}s {}ns is out of range", ts.seconds, ts.nanos),
        })
}
