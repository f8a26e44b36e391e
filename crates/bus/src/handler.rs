//! Handler contract and the ack/nack decision.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use events::{EventEnvelope, WireMessage};
use thiserror::Error;
use tracing::{Span, debug, error, warn};

use crate::error::Result;
use crate::topology::QueueSpec;

/// Failure reported by an [`EventHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Worth retrying: the broker should redeliver.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retrying cannot help: drop the message.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}

/// What happens to a delivery once it has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; remove from the queue.
    Ack,
    /// Nack with requeue; the broker redelivers.
    Requeue,
    /// Nack without requeue; dropped or dead-lettered.
    Discard,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::Requeue => "requeue",
            Disposition::Discard => "discard",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reacts to one decoded event and returns the follow-up events to publish.
///
/// Implementations must be safe to call more than once with the same event:
/// delivery is at least once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        envelope: EventEnvelope,
    ) -> std::result::Result<Vec<EventEnvelope>, HandlerError>;
}

/// Publishes events to the shared exchange.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<()>;
}

/// A broker that can also host consumers.
#[async_trait]
pub trait MessageBus: Publisher {
    /// Declares the durable queue and binds each of its routing keys.
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<()>;

    /// Runs the consume loop for `spec` until the delivery stream ends.
    async fn consume(&self, spec: &QueueSpec, handler: Arc<dyn EventHandler>) -> Result<()>;
}

/// Decodes, handles and publishes for one delivery, and decides its fate.
///
/// Outbound events are published before the delivery is settled, so a crash
/// or publish failure leads to redelivery rather than a lost follow-up.
#[tracing::instrument(
    name = "bus.consume",
    skip_all,
    fields(
        queue = %queue,
        routing_key = %message.routing_key,
        message_id = %message.message_id,
        trace_id = tracing::field::Empty,
    )
)]
pub async fn dispatch(
    queue: &str,
    message: &WireMessage,
    handler: &dyn EventHandler,
    publisher: &dyn Publisher,
) -> Disposition {
    let start = Instant::now();

    let disposition = match EventEnvelope::from_wire(message) {
        Err(e) => {
            error!(error = %e, "Discarding undecodable message");
            Disposition::Discard
        }
        Ok(envelope) => {
            if let Some(trace_id) = envelope.context.trace_id() {
                Span::current().record("trace_id", trace_id);
            }
            let order_id = envelope.event.order_id();
            match handler.handle(envelope).await {
                Ok(outbound) => publish_all(publisher, &outbound).await,
                Err(HandlerError::Transient(reason)) => {
                    warn!(%order_id, %reason, "Handler failed transiently, requeueing");
                    Disposition::Requeue
                }
                Err(HandlerError::Permanent(reason)) => {
                    error!(%order_id, %reason, "Handler failed permanently, discarding");
                    Disposition::Discard
                }
            }
        }
    };

    debug!(%disposition, "Delivery settled");
    metrics::counter!(
        "bus_messages_total",
        "queue" => queue.to_string(),
        "disposition" => disposition.as_str()
    )
    .increment(1);
    metrics::histogram!("bus_handler_duration_seconds", "queue" => queue.to_string())
        .record(start.elapsed().as_secs_f64());

    disposition
}

async fn publish_all(publisher: &dyn Publisher, outbound: &[EventEnvelope]) -> Disposition {
    for envelope in outbound {
        if let Err(e) = publisher.publish(envelope).await {
            warn!(
                error = %e,
                routing_key = envelope.routing_key(),
                "Failed to publish follow-up event, requeueing"
            );
            return Disposition::Requeue;
        }
    }
    Disposition::Ack
}
