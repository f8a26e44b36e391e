//! Service runtime for the order fulfillment saga.
//!
//! One binary runs any of the four services. Every service serves `/health`
//! and `/metrics`; the order service also accepts and serves orders.

pub mod config;
pub mod error;
pub mod routes;
pub mod runtime;
pub mod service;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::OrderRepository;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::ServiceKind;
use routes::orders::AppState;

/// Creates the order service router: order endpoints plus [`ops_app`].
pub fn create_app<R: OrderRepository + 'static>(
    state: Arc<AppState<R>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    Router::new()
        .route("/orders", post(routes::orders::create::<R>))
        .route("/orders/{id}", get(routes::orders::get::<R>))
        .with_state(state)
        .merge(ops_app(ServiceKind::Order, metrics_handle))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Creates the health and metrics router every service serves.
pub fn ops_app(service: ServiceKind, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .with_state(service)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}
