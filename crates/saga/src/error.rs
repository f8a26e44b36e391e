//! Saga error types.

use bus::{BusError, HandlerError};
use common::OrderId;
use domain::DomainError;
use events::EventKind;
use thiserror::Error;

/// Errors that can occur while reacting to saga events.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Bus error.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// The event refers to an order this service does not know.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The event was routed to a service that does not consume it.
    #[error("{service} does not handle {kind} events")]
    UnexpectedEvent {
        service: &'static str,
        kind: EventKind,
    },
}

impl SagaError {
    /// Whether redelivering the triggering event could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SagaError::Domain(e) => e.is_transient(),
            SagaError::Bus(e) => !matches!(e, BusError::Codec(_)),
            SagaError::OrderNotFound(_) | SagaError::UnexpectedEvent { .. } => false,
        }
    }
}

impl From<SagaError> for HandlerError {
    fn from(e: SagaError) -> Self {
        if e.is_transient() {
            HandlerError::Transient(e.to_string())
        } else {
            HandlerError::Permanent(e.to_string())
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
