//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use domain_billing::LedgerRepository;

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        latency_ms: None,
    })
}

/// Readiness check (includes the repository)
pub async fn readiness_check<R: LedgerRepository>(
    State(state): State<AppState<R>>,
) -> (StatusCode, Json<HealthResponse>) {
    let result = state.ledger.health().await;

    let (status, label) = if result.is_healthy() {
        (StatusCode::OK, "ready")
    } else {
        tracing::warn!(adapter = %result.adapter_id, message = ?result.message, "readiness check failed");
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            latency_ms: Some(result.latency_ms),
        }),
    )
}
