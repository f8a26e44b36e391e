//! Domain error types.

use common::OrderId;
use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A database call failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying embedded migrations failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The order failed validation.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// No order with this id exists.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A reservation request no engine can ever satisfy.
    #[error("Invalid reservation: {0}")]
    InvalidReservation(String),

    /// A stored row could not be mapped back into the domain.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The store refused the call; retrying later may succeed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    /// Whether the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            // Constraint violations and undecodable rows fail the same way on retry.
            DomainError::Database(sqlx::Error::Database(db)) => !matches!(
                db.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ),
            DomainError::Database(e) => !matches!(
                e,
                sqlx::Error::ColumnDecode { .. }
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::Decode(_)
                    | sqlx::Error::TypeNotFound { .. }
            ),
            DomainError::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
