//! In-process bus with broker-like queue semantics, for tests and local runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use events::{EventEnvelope, WireMessage};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::error::{BusError, Result};
use crate::handler::{Disposition, EventHandler, MessageBus, Publisher, dispatch};
use crate::topology::QueueSpec;

#[derive(Debug)]
struct Queue {
    spec: QueueSpec,
    messages: VecDeque<WireMessage>,
    ready: Arc<Notify>,
}

#[derive(Debug, Default)]
struct InMemoryBusState {
    queues: HashMap<String, Queue>,
    published: Vec<WireMessage>,
    dead_letters: Vec<(String, WireMessage)>,
    fail_on_publish: bool,
    closed: bool,
}

/// In-memory message bus.
///
/// Routes by the same topic rules as the broker, keeps each queue FIFO,
/// puts requeued messages back at the head and collects discarded ones as
/// dead letters.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBus {
    state: Arc<Mutex<InMemoryBusState>>,
}

impl InMemoryBus {
    /// Creates a new in-memory bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail until switched off.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.lock().await.fail_on_publish = fail;
    }

    /// Routes an already-encoded message, bypassing the codec.
    pub async fn publish_raw(&self, message: WireMessage) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_on_publish {
            return Err(BusError::Publish("publishing is disabled".to_string()));
        }
        for queue in state.queues.values_mut() {
            if queue.spec.accepts(&message.routing_key) {
                queue.messages.push_back(message.clone());
                queue.ready.notify_one();
            }
        }
        debug!(routing_key = %message.routing_key, "Published message");
        state.published.push(message);
        Ok(())
    }

    /// Delivers the head of `queue` to `handler` and settles it.
    ///
    /// Returns `None` when the queue is empty or undeclared.
    pub async fn deliver_next(&self, queue: &str, handler: &dyn EventHandler) -> Option<Disposition> {
        let message = {
            let mut state = self.state.lock().await;
            state.queues.get_mut(queue)?.messages.pop_front()?
        };

        let disposition = dispatch(queue, &message, handler, self).await;

        let mut state = self.state.lock().await;
        match disposition {
            Disposition::Ack => {}
            Disposition::Requeue => {
                if let Some(q) = state.queues.get_mut(queue) {
                    q.messages.push_front(message);
                }
            }
            Disposition::Discard => state.dead_letters.push((queue.to_string(), message)),
        }
        Some(disposition)
    }

    /// Delivers from `queue` until it is empty or `max` deliveries were made.
    pub async fn drain(&self, queue: &str, handler: &dyn EventHandler, max: usize) -> usize {
        let mut delivered = 0;
        while delivered < max {
            if self.deliver_next(queue, handler).await.is_none() {
                break;
            }
            delivered += 1;
        }
        delivered
    }

    /// Stops every consume loop once its queue is empty.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        for queue in state.queues.values() {
            queue.ready.notify_one();
        }
    }

    /// Number of messages waiting in `queue`.
    pub async fn pending_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, |q| q.messages.len())
    }

    /// Every message published so far, in order.
    pub async fn published(&self) -> Vec<WireMessage> {
        self.state.lock().await.published.clone()
    }

    /// Routing keys of every message published so far, in order.
    pub async fn published_routing_keys(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .published
            .iter()
            .map(|m| m.routing_key.clone())
            .collect()
    }

    /// Discarded messages with the queue they were discarded from.
    pub async fn dead_letters(&self) -> Vec<(String, WireMessage)> {
        self.state.lock().await.dead_letters.clone()
    }
}

#[async_trait]
impl Publisher for InMemoryBus {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<()> {
        self.publish_raw(envelope.to_wire()).await?;
        metrics::counter!("bus_published_total", "routing_key" => envelope.routing_key())
            .increment(1);
        Ok(())
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.queues.get_mut(&spec.name) {
            Some(queue) => {
                for binding in &spec.bindings {
                    if !queue.spec.bindings.contains(binding) {
                        queue.spec.bindings.push(binding.clone());
                    }
                }
            }
            None => {
                state.queues.insert(
                    spec.name.clone(),
                    Queue {
                        spec: spec.clone(),
                        messages: VecDeque::new(),
                        ready: Arc::new(Notify::new()),
                    },
                );
            }
        }
        Ok(())
    }

    async fn consume(&self, spec: &QueueSpec, handler: Arc<dyn EventHandler>) -> Result<()> {
        let ready = {
            let state = self.state.lock().await;
            let queue = state
                .queues
                .get(&spec.name)
                .ok_or_else(|| BusError::Subscribe(format!("queue {} is not declared", spec.name)))?;
            queue.ready.clone()
        };

        loop {
            while self.deliver_next(&spec.name, handler.as_ref()).await.is_some() {}
            if self.state.lock().await.closed {
                return Ok(());
            }
            ready.notified().await;
        }
    }
}
