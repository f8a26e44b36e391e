//! RabbitMQ bus over a single long-lived connection and channel.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use events::{CONTENT_TYPE, EventEnvelope, WireMessage};
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{error, info, warn};

use crate::error::{BusError, Result};
use crate::handler::{Disposition, EventHandler, MessageBus, Publisher, dispatch};
use crate::topology::{EXCHANGE, QueueSpec};

const PREFETCH: u16 = 1;
const REPLY_SUCCESS: u16 = 200;
const PERSISTENT: u8 = 2;

/// Message bus backed by RabbitMQ.
///
/// Owns one connection and one channel for the life of the process. Call
/// [`AmqpBus::close`] on shutdown; it closes the channel, then the
/// connection.
pub struct AmqpBus {
    connection: Connection,
    channel: Channel,
}

impl AmqpBus {
    /// Connects, declares the exchange and limits unacknowledged deliveries
    /// to one per consumer.
    pub async fn connect(url: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| BusError::Connection(format!("Failed to connect: {}", e)))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)))?;

        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Connection(format!("Failed to declare exchange: {}", e)))?;

        channel
            .basic_qos(PREFETCH, BasicQosOptions::default())
            .await
            .map_err(|e| BusError::Connection(format!("Failed to set prefetch: {}", e)))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BusError::Connection(format!("Failed to enable confirms: {}", e)))?;

        info!(exchange = EXCHANGE, "Connected to AMQP");

        Ok(Self {
            connection,
            channel,
        })
    }

    /// Closes the channel, then the connection.
    pub async fn close(&self) -> Result<()> {
        let channel = self
            .channel
            .close(REPLY_SUCCESS, "shutdown")
            .await
            .map_err(|e| BusError::Connection(format!("Failed to close channel: {}", e)));
        let connection = self
            .connection
            .close(REPLY_SUCCESS, "shutdown")
            .await
            .map_err(|e| BusError::Connection(format!("Failed to close connection: {}", e)));
        info!("AMQP connection closed");
        channel.and(connection)
    }

    async fn publish_wire(&self, message: &WireMessage) -> Result<()> {
        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE.into())
            .with_delivery_mode(PERSISTENT)
            .with_message_id(message.message_id.clone().into())
            .with_headers(to_field_table(&message.headers));

        let confirm = self
            .channel
            .basic_publish(
                EXCHANGE,
                &message.routing_key,
                BasicPublishOptions::default(),
                &message.body,
                properties,
            )
            .await
            .map_err(|e| BusError::Publish(format!("Failed to publish: {}", e)))?;

        let confirmation = confirm
            .await
            .map_err(|e| BusError::Publish(format!("Publish confirmation failed: {}", e)))?;
        if confirmation.is_nack() {
            return Err(BusError::Publish(format!(
                "Broker rejected {}",
                message.message_id
            )));
        }
        Ok(())
    }

    async fn settle(delivery: &Delivery, disposition: Disposition) {
        let result = match disposition {
            Disposition::Ack => delivery.ack(BasicAckOptions::default()).await,
            Disposition::Requeue => {
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await
            }
            Disposition::Discard => {
                delivery
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    })
                    .await
            }
        };
        if let Err(e) = result {
            error!(error = %e, %disposition, "Failed to settle delivery");
        }
    }
}

#[async_trait]
impl Publisher for AmqpBus {
    #[tracing::instrument(
        name = "bus.publish",
        skip_all,
        fields(routing_key = envelope.routing_key(), order_id = %envelope.event.order_id())
    )]
    async fn publish(&self, envelope: &EventEnvelope) -> Result<()> {
        self.publish_wire(&envelope.to_wire()).await?;
        metrics::counter!("bus_published_total", "routing_key" => envelope.routing_key())
            .increment(1);
        Ok(())
    }
}

#[async_trait]
impl MessageBus for AmqpBus {
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<()> {
        self.channel
            .queue_declare(
                &spec.name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to declare queue: {}", e)))?;

        for routing_key in &spec.bindings {
            self.channel
                .queue_bind(
                    &spec.name,
                    EXCHANGE,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| BusError::Subscribe(format!("Failed to bind queue: {}", e)))?;
            info!(queue = %spec.name, routing_key = %routing_key, "Bound queue to exchange");
        }
        Ok(())
    }

    async fn consume(&self, spec: &QueueSpec, handler: Arc<dyn EventHandler>) -> Result<()> {
        let mut consumer = self
            .channel
            .basic_consume(
                &spec.name,
                &format!("{}-consumer", spec.name),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to start consumer: {}", e)))?;

        info!(queue = %spec.name, "Consumer started");

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(e) => {
                    return Err(BusError::Subscribe(format!(
                        "Consumer delivery error: {}",
                        e
                    )));
                }
            };
            let message = to_wire_message(&delivery);
            let disposition = dispatch(&spec.name, &message, handler.as_ref(), self).await;
            Self::settle(&delivery, disposition).await;
        }

        warn!(queue = %spec.name, "Consumer stream ended");
        Ok(())
    }
}

fn to_field_table(headers: &BTreeMap<String, String>) -> FieldTable {
    let mut table = BTreeMap::new();
    for (key, value) in headers {
        table.insert(
            ShortString::from(key.clone()),
            AMQPValue::LongString(LongString::from(value.clone())),
        );
    }
    FieldTable::from(table)
}

fn to_wire_message(delivery: &Delivery) -> WireMessage {
    let headers = delivery
        .properties
        .headers()
        .as_ref()
        .map(|table| {
            table
                .inner()
                .iter()
                .filter_map(|(key, value)| {
                    header_string(value).map(|v| (key.as_str().to_string(), v))
                })
                .collect()
        })
        .unwrap_or_default();

    WireMessage {
        routing_key: delivery.routing_key.as_str().to_string(),
        message_id: delivery
            .properties
            .message_id()
            .as_ref()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default(),
        body: delivery.data.clone(),
        headers,
    }
}

fn header_string(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        AMQPValue::LongUInt(n) => Some(n.to_string()),
        AMQPValue::LongLongInt(n) => Some(n.to_string()),
        _ => None,
    }
}
