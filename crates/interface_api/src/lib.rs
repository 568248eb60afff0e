//! HTTP API Layer
//!
//! This crate exposes the billing ledger over REST using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for loans, health and admin
//! - **Middleware**: Request logging, request ids, idempotency key extraction
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: `BillingError` to status code mapping
//!
//! The router is generic over the [`LedgerRepository`] so the same routes run
//! against PostgreSQL in production and the in-memory repository in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(BillingLedger::new(adapter), config).with_log_control(control);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_billing::{BillingLedger, LedgerRepository};

use crate::config::ApiConfig;
use crate::handlers::{admin, health, loan};
use crate::middleware::request_logger;
use crate::telemetry::LogLevelControl;

/// Application state shared across handlers
pub struct AppState<R> {
    pub ledger: BillingLedger<R>,
    pub config: Arc<ApiConfig>,
    pub log_control: Option<LogLevelControl>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            config: Arc::clone(&self.config),
            log_control: self.log_control.clone(),
        }
    }
}

impl<R: LedgerRepository> AppState<R> {
    pub fn new(ledger: BillingLedger<R>, config: ApiConfig) -> Self {
        Self {
            ledger,
            config: Arc::new(config),
            log_control: None,
        }
    }

    /// Enables the runtime log level endpoint
    pub fn with_log_control(mut self, control: LogLevelControl) -> Self {
        self.log_control = Some(control);
        self
    }
}

/// Creates the main API router
pub fn create_router<R: LedgerRepository>(state: AppState<R>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check::<R>));

    let loan_routes = Router::new()
        .route("/", post(loan::submit_loan::<R>))
        .route("/:id", get(loan::get_loan::<R>))
        .route("/:id/outstanding", get(loan::get_outstanding::<R>))
        .route(
            "/:id/payment",
            post(loan::submit_payment::<R>).get(loan::list_payments::<R>),
        )
        .route("/:id/schedule", get(loan::list_schedules::<R>))
        .route("/admin/log-level", post(admin::change_log_level::<R>));

    Router::new()
        .merge(public_routes)
        .nest("/loan", loan_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(request_logger)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
