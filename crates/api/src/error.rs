//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bus::BusError;
use domain::{DomainError, OrderError};
use saga::SagaError;
use thiserror::Error;

use crate::config::ConfigError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Saga error, including persistence failures.
    #[error(transparent)]
    Saga(#[from] SagaError),

    /// The order was stored but `order.created` could not be published.
    #[error("Failed to publish order event: {0}")]
    Publish(#[from] BusError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Saga(err) => saga_error_status(err),
            ApiError::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "internal server error");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::OrderNotFound(_) | SagaError::Domain(DomainError::OrderNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        SagaError::Domain(DomainError::Order(order_err)) => match order_err {
            OrderError::CustomerIdRequired
            | OrderError::DeliveryAddressRequired
            | OrderError::NoItems
            | OrderError::InvalidProductId { .. }
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidPrice { .. } => StatusCode::BAD_REQUEST,
            OrderError::UnknownStatus(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Errors that abort service startup or end its run.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Failed to install metrics recorder: {0}")]
    Metrics(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    #[test]
    fn test_status_mapping() {
        let invalid: ApiError = SagaError::Domain(DomainError::Order(OrderError::NoItems)).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let missing: ApiError = SagaError::OrderNotFound(OrderId::new(9)).into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let down: ApiError =
            SagaError::Domain(DomainError::Unavailable("db down".to_string())).into();
        assert_eq!(down.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let publish: ApiError = BusError::Publish("nack".to_string()).into();
        assert_eq!(publish.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
