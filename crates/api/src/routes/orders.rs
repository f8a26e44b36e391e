//! Order creation and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bus::Publisher;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderItem};
use domain::{NewOrder, Order, OrderRepository};
use events::PropagationContext;
use saga::OrderSagaCoordinator;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared state of the order service's HTTP handlers.
pub struct AppState<R: OrderRepository> {
    pub coordinator: Arc<OrderSagaCoordinator<R>>,
    pub publisher: Arc<dyn Publisher>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub delivery_address: String,
    #[serde(default)]
    pub items: Vec<OrderItemBody>,
}

/// A line item as it appears in request and response bodies.
///
/// Prices travel as decimal currency units and are stored in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemBody {
    pub id: i64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<OrderItemBody> for OrderItem {
    fn from(body: OrderItemBody) -> Self {
        OrderItem {
            product_id: common::ProductId::new(body.id),
            quantity: body.quantity,
            name: body.name,
            unit_price_cents: body.price.map(|p| (p * 100.0).round() as i64),
        }
    }
}

impl From<&OrderItem> for OrderItemBody {
    fn from(item: &OrderItem) -> Self {
        OrderItemBody {
            id: item.product_id.as_i64(),
            quantity: item.quantity,
            price: item.unit_price_cents.map(|c| c as f64 / 100.0),
            name: item.name.clone(),
        }
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub customer_id: String,
    pub delivery_address: String,
    pub status: String,
    pub items: Vec<OrderItemBody>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        OrderResponse {
            id: order.id.as_i64(),
            customer_id: order.customer_id.clone(),
            delivery_address: order.delivery_address.clone(),
            status: order.status.to_string(),
            items: order.items.iter().map(OrderItemBody::from).collect(),
            version: order.version,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders: store the order and publish `order.created`.
///
/// The saga continues asynchronously; its outcome is never reported here.
#[tracing::instrument(skip_all)]
pub async fn create<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let new_order = NewOrder::new(
        req.customer_id,
        req.delivery_address,
        req.items.into_iter().map(OrderItem::from).collect(),
    );
    let (order, created) = state
        .coordinator
        .create_order(new_order, PropagationContext::new_root())
        .await?;
    state.publisher.publish(&created).await?;

    tracing::info!(
        order_id = %order.id,
        trace_id = created.context.trace_id().unwrap_or_default(),
        "Order accepted"
    );
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders/{id}: load an order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .coordinator
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from(&order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse::<i64>()
        .ok()
        .map(OrderId::new)
        .filter(OrderId::is_valid)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid order ID: {id}")))
}
