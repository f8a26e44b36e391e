//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::config::ServiceKind;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// GET /health: the process is up and serving.
pub async fn check(State(service): State<ServiceKind>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: service.as_str(),
    })
}
