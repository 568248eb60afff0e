//! Operational endpoints

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::{debug, info};

use domain_billing::LedgerRepository;

use crate::dto::StatusResponse;
use crate::error::{ApiError, ApiResult};
use crate::telemetry::LogLevel;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LogLevelParams {
    #[serde(default)]
    pub level: String,
}

/// Swaps the active log filter, e.g. `?level=debug`
pub async fn change_log_level<R: LedgerRepository>(
    State(state): State<AppState<R>>,
    params: Result<Query<LogLevelParams>, QueryRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Query(params) = params?;
    let level: LogLevel = params.level.parse().map_err(ApiError::BadRequest)?;

    let control = state
        .log_control
        .as_ref()
        .ok_or_else(|| ApiError::Internal("log level control is not installed".to_string()))?;
    control
        .set_level(level)
        .map_err(|e| ApiError::Internal(format!("failed to reload log filter: {}", e)))?;

    debug!(new_level = %level, "Log level changed");
    info!(new_level = %level, "Log level changed");

    Ok(Json(StatusResponse::success(format!("Log level changed to {}", level))))
}
