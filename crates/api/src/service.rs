//! Wires one service to the broker, its store and the HTTP listener.

use std::future::IntoFuture;
use std::sync::Arc;

use axum::Router;
use bus::{AmqpBus, BusError, EventHandler, MessageBus, Publisher};
use domain::{PostgresOrderRepository, PostgresReservationEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{DeliveryService, InventoryService, KitchenService, OrderSagaCoordinator};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{Config, ServiceKind};
use crate::error::StartupError;
use crate::routes::orders::AppState;
use crate::runtime::shutdown_signal;
use crate::{create_app, ops_app};

/// Runs the configured service until a shutdown signal arrives or its
/// consumer stops.
#[tracing::instrument(skip_all, fields(service = %config.service))]
pub async fn run(config: Config, metrics_handle: PrometheusHandle) -> Result<(), StartupError> {
    let bus = Arc::new(AmqpBus::connect(&config.rabbitmq_url).await?);
    let queue = config.service.queue();
    bus.declare_queue(&queue).await?;
    let publisher: Arc<dyn Publisher> = bus.clone();

    let (handler, app): (Arc<dyn EventHandler>, Router) = match config.service {
        ServiceKind::Order => {
            let orders = PostgresOrderRepository::new(connect_store(&config).await?);
            if config.run_migrations {
                orders.run_migrations().await?;
            }
            let coordinator = Arc::new(OrderSagaCoordinator::new(orders));
            let state = Arc::new(AppState {
                coordinator: Arc::clone(&coordinator),
                publisher,
            });
            let handler: Arc<dyn EventHandler> = coordinator;
            (handler, create_app(state, metrics_handle))
        }
        ServiceKind::Inventory => {
            let engine = PostgresReservationEngine::new(connect_store(&config).await?);
            if config.run_migrations {
                engine.run_migrations().await?;
            }
            let handler: Arc<dyn EventHandler> = Arc::new(InventoryService::new(engine));
            (handler, ops_app(config.service, metrics_handle))
        }
        ServiceKind::Kitchen => {
            let handler: Arc<dyn EventHandler> =
                Arc::new(KitchenService::new(publisher, config.kitchen_cook));
            (handler, ops_app(config.service, metrics_handle))
        }
        ServiceKind::Delivery => {
            let handler: Arc<dyn EventHandler> = Arc::new(DeliveryService::new(
                publisher,
                config.delivery_assign,
                config.delivery_transit,
            ));
            (handler, ops_app(config.service, metrics_handle))
        }
    };

    let listener = TcpListener::bind(config.addr()).await?;
    info!(addr = %config.addr(), queue = %queue.name, "Service started");

    let consumer = {
        let bus = Arc::clone(&bus);
        tokio::spawn(async move { bus.consume(&queue, handler).await })
    };
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    let result = tokio::select! {
        served = server => served.map_err(StartupError::from),
        consumed = consumer => match consumed {
            Ok(Ok(())) => Err(BusError::Subscribe("consumer stopped".to_string()).into()),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(BusError::Subscribe(format!("consumer task failed: {e}")).into()),
        },
    };

    if let Err(e) = bus.close().await {
        warn!(error = %e, "Failed to close broker connection");
    }
    info!("Service stopped");
    result
}

async fn connect_store(config: &Config) -> Result<PgPool, StartupError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await?;
    info!(max_connections = config.db_max_connections, "Connected to database");
    Ok(pool)
}
