//! Events paired with their propagation context, and their wire form.

use std::collections::BTreeMap;

use crate::context::PropagationContext;
use crate::error::{CodecError, Result};
use crate::event::SagaEvent;
use crate::kind::EventKind;

/// Current schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_VERSION_HEADER: &str = "x-schema-version";
pub const EVENT_TYPE_HEADER: &str = "x-event-type";
pub const CONTENT_TYPE: &str = "application/x-protobuf";

/// A typed event plus the context it travels with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub event: SagaEvent,
    pub context: PropagationContext,
}

impl EventEnvelope {
    pub fn new(event: SagaEvent, context: PropagationContext) -> Self {
        Self { event, context }
    }

    /// Wraps an event caused by `cause`, deriving a child context.
    pub fn caused_by(event: SagaEvent, cause: &EventEnvelope) -> Self {
        Self {
            event,
            context: cause.context.child(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    pub fn routing_key(&self) -> &'static str {
        self.event.kind().routing_key()
    }

    /// Stable per (kind, order) so brokers and logs can spot redeliveries.
    pub fn message_id(&self) -> String {
        format!("{}.{}", self.routing_key(), self.event.order_id())
    }

    pub fn to_wire(&self) -> WireMessage {
        let mut headers = self.context.entries().clone();
        headers.insert(SCHEMA_VERSION_HEADER.to_string(), SCHEMA_VERSION.to_string());
        headers.insert(EVENT_TYPE_HEADER.to_string(), self.kind().as_str().to_string());
        WireMessage {
            routing_key: self.routing_key().to_string(),
            message_id: self.message_id(),
            body: self.event.encode(),
            headers,
        }
    }

    /// Decodes a delivered message.
    ///
    /// A missing schema version header is read as version 1.
    pub fn from_wire(message: &WireMessage) -> Result<Self> {
        let kind = EventKind::from_routing_key(&message.routing_key)
            .ok_or_else(|| CodecError::UnknownRoutingKey(message.routing_key.clone()))?;

        if let Some(raw) = message.headers.get(SCHEMA_VERSION_HEADER) {
            let found: u32 = raw.trim().parse().map_err(|_| CodecError::InvalidHeader {
                name: SCHEMA_VERSION_HEADER,
                value: raw.clone(),
            })?;
            if found > SCHEMA_VERSION {
                return Err(CodecError::UnsupportedSchemaVersion {
                    found,
                    supported: SCHEMA_VERSION,
                });
            }
        }

        let event = SagaEvent::decode(kind, &message.body)?;
        let entries = message
            .headers
            .iter()
            .filter(|(key, _)| {
                key.as_str() != SCHEMA_VERSION_HEADER && key.as_str() != EVENT_TYPE_HEADER
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            event,
            context: PropagationContext::from_entries(entries),
        })
    }
}

/// Transport-neutral form of a message as it crosses the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub routing_key: String,
    pub message_id: String,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

impl WireMessage {
    /// Returns the trace id carried in the headers, if any.
    pub fn trace_id(&self) -> Option<String> {
        let entries = self
            .headers
            .iter()
            .filter(|(key, _)| key.as_str() == crate::context::TRACEPARENT)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PropagationContext::from_entries(entries)
            .trace_id()
            .map(str::to_string)
    }
}
