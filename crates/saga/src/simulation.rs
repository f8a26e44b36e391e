//! Simulated kitchen and delivery work.
//!
//! Work runs in detached tasks: the triggering delivery is acknowledged as
//! soon as the work is accepted, and nothing about in-flight work is
//! persisted. A process that dies mid-task loses the completion event.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::OrderId;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span};

/// A bounded random delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedDelay {
    min: Duration,
    max: Duration,
}

impl SimulatedDelay {
    /// Creates a delay in `[min, max]`. A `max` below `min` is raised to `min`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn from_millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Picks a delay uniformly from the range.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = saturating_millis(self.min);
        let max = saturating_millis(self.max);
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Sleeps for a sampled delay.
    pub async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Detached per-order tasks of one simulated worker.
///
/// At most one task runs per order; a redelivered trigger for an order that
/// is still being worked on does not start a second task.
pub struct Workers {
    name: &'static str,
    tasks: Mutex<JoinSet<()>>,
    in_flight: Arc<Mutex<HashSet<OrderId>>>,
}

impl Workers {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tasks: Mutex::new(JoinSet::new()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Starts `work` for `order_id` unless a task for it is already running.
    ///
    /// Returns false when the order was already in flight.
    pub async fn start<F>(&self, order_id: OrderId, trace_id: Option<&str>, work: F) -> bool
    where
        F: Future<Output = bus::Result<()>> + Send + 'static,
    {
        if !self.in_flight.lock().await.insert(order_id) {
            info!(worker = self.name, %order_id, "Work already in progress");
            return false;
        }

        let worker = self.name;
        let in_flight = Arc::clone(&self.in_flight);
        let span = info_span!(
            "simulation",
            worker,
            order_id = %order_id,
            trace_id = trace_id.unwrap_or_default()
        );

        let mut tasks = self.tasks.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(
            async move {
                let outcome = match work.await {
                    Ok(()) => "completed",
                    Err(e) => {
                        error!(error = %e, "Simulated work failed, completion event lost");
                        "failed"
                    }
                };
                in_flight.lock().await.remove(&order_id);
                metrics::counter!(
                    "simulation_tasks_total",
                    "worker" => worker,
                    "outcome" => outcome
                )
                .increment(1);
            }
            .instrument(span),
        );
        true
    }

    /// Number of orders currently being worked on.
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Waits until every started task has finished.
    pub async fn wait_idle(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(worker = self.name, error = %e, "Simulated task aborted");
            }
        }
    }
}
