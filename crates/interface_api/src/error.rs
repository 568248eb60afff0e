//! API error handling

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use domain_billing::BillingError;

use crate::dto::StatusResponse;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Billing(err) => match err {
                BillingError::LoanNotFound(_) => (StatusCode::NOT_FOUND, "loan_not_found"),
                BillingError::InvalidLoanTerms(_) => (StatusCode::BAD_REQUEST, "invalid_loan_terms"),
                BillingError::InvalidPayment { .. } => (StatusCode::BAD_REQUEST, "invalid_payment_amount"),
                BillingError::InvalidCursor(_) => (StatusCode::BAD_REQUEST, "invalid_cursor"),
                BillingError::LoanAlreadyClosed(_) => (StatusCode::CONFLICT, "loan_already_closed"),
                BillingError::DuplicatePayment { .. } => (StatusCode::OK, "payment_already_processed"),
                BillingError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                BillingError::DelinquencyCheckFailed(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "delinquency_check_failed")
                }
                BillingError::InvalidStateOutstanding { .. } | BillingError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                }
            },
        }
    }

    /// Message shown to the client
    ///
    /// Server-side failures are reported generically; the detail goes to the log.
    fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Timeout(_) => "Database timeout".to_string(),
            ApiError::Billing(err) => match err {
                BillingError::Timeout { .. } => "Database timeout".to_string(),
                BillingError::DelinquencyCheckFailed(_) => "Failed to compute loan delinquency".to_string(),
                BillingError::InvalidStateOutstanding { .. } | BillingError::Internal(_) => {
                    "Internal server error".to_string()
                }
                other => other.to_string(),
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        if status.is_server_error() {
            if status == StatusCode::GATEWAY_TIMEOUT {
                warn!(error = %self, kind, "request failed");
            } else {
                error!(error = %self, kind, "request failed");
            }
        } else {
            debug!(error = %self, kind, "request rejected");
        }

        if let ApiError::Billing(ref err) = self {
            if err.is_success_shaped() {
                let body = StatusResponse::success("payment already processed");
                return (StatusCode::OK, Json(body)).into_response();
            }
        }

        let body = ErrorResponse {
            error: kind.to_string(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Invalid loan id: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::LoanId;
    use std::time::Duration;

    fn status_of(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn test_domain_errors_map_to_client_statuses() {
        let loan_id = LoanId::new(9);
        assert_eq!(status_of(BillingError::LoanNotFound(loan_id).into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(BillingError::InvalidPayment { expected: 10, actual: 5 }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(BillingError::invalid_terms("uneven").into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(BillingError::InvalidCursor("bad".into()).into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(BillingError::LoanAlreadyClosed(loan_id).into()), StatusCode::CONFLICT);
    }

    #[test]
    fn test_duplicate_payment_is_success_shaped() {
        let error: ApiError = BillingError::DuplicatePayment {
            loan_id: LoanId::new(1),
            idempotency_key: "req-1".into(),
        }
        .into();
        assert_eq!(status_of(error), StatusCode::OK);
    }

    #[test]
    fn test_infrastructure_errors() {
        let timeout = BillingError::Timeout {
            operation: "insert_payment".into(),
            limit: Duration::from_secs(2),
        };
        assert_eq!(status_of(timeout.into()), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_of(ApiError::Timeout("payment".into())), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_of(BillingError::internal("boom").into()), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_of(
                BillingError::InvalidStateOutstanding { total_payable: 10, total_paid: 20 }.into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let error: ApiError = BillingError::internal("connection reset by peer").into();
        assert_eq!(error.public_message(), "Internal server error");
    }
}
