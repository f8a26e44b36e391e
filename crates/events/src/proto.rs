//! Protobuf wire messages.
//!
//! Tags are part of the contract between independently deployed services:
//! never reuse or renumber one. New fields get new tags and must tolerate
//! being absent.

use prost_types::Timestamp;

#[derive(Clone, PartialEq, prost::Message)]
pub struct LineItem {
    #[prost(int64, tag = "1")]
    pub product_id: i64,
    #[prost(uint32, tag = "2")]
    pub quantity: u32,
    #[prost(string, optional, tag = "3")]
    pub name: Option<String>,
    #[prost(int64, optional, tag = "4")]
    pub price_cents: Option<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OrderCreated {
    #[prost(int64, tag = "1")]
    pub order_id: i64,
    #[prost(string, tag = "2")]
    pub customer_id: String,
    #[prost(string, tag = "3")]
    pub status: String,
    #[prost(message, optional, tag = "4")]
    pub created_at: Option<Timestamp>,
    #[prost(message, repeated, tag = "5")]
    pub items: Vec<LineItem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct InventoryReserved {
    #[prost(int64, tag = "1")]
    pub order_id: i64,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(message, repeated, tag = "4")]
    pub items: Vec<LineItem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadyForKitchen {
    #[prost(int64, tag = "1")]
    pub order_id: i64,
    #[prost(message, repeated, tag = "2")]
    pub items: Vec<LineItem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct KitchenAccepted {
    #[prost(int64, tag = "1")]
    pub order_id: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OrderCooked {
    #[prost(int64, tag = "1")]
    pub order_id: i64,
    #[prost(message, repeated, tag = "2")]
    pub items: Vec<LineItem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OrderReadyForDelivery {
    #[prost(int64, tag = "1")]
    pub order_id: i64,
    #[prost(message, repeated, tag = "2")]
    pub items: Vec<LineItem>,
    #[prost(string, tag = "3")]
    pub delivery_address: String,
    #[prost(string, tag = "4")]
    pub customer_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeliveryStarted {
    #[prost(int64, tag = "1")]
    pub order_id: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeliveryCompleted {
    #[prost(int64, tag = "1")]
    pub order_id: i64,
}
