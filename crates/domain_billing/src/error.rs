//! Billing domain errors

use std::time::Duration;

use thiserror::Error;

use core_kernel::{CoreError, LoanId, PortError};

/// Errors that can occur in the billing domain
///
/// The first eight variants are expected outcomes a caller can act on.
/// `Timeout` and `Internal` are infrastructure failures; only those are
/// worth alerting on.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Loan not found
    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    /// Loan terms cannot produce an exact schedule
    #[error("Invalid loan terms: {0}")]
    InvalidLoanTerms(String),

    /// Payment amount does not match the weekly installment
    #[error("Invalid payment: expected {expected}, got {actual}")]
    InvalidPayment {
        expected: i64,
        actual: i64,
    },

    /// Every installment has already been paid
    #[error("Loan already fully paid: {0}")]
    LoanAlreadyClosed(LoanId),

    /// The payment was already applied by an earlier request
    #[error("Duplicate payment for {loan_id} (idempotency key '{idempotency_key}')")]
    DuplicatePayment {
        loan_id: LoanId,
        idempotency_key: String,
    },

    /// Payment history could not be read while deriving delinquency
    #[error("Failed to compute loan delinquency: {0}")]
    DelinquencyCheckFailed(#[source] PortError),

    /// More was paid than the loan is worth
    #[error("Invalid loan payment state: paid {total_paid} exceeds payable {total_payable}")]
    InvalidStateOutstanding {
        total_payable: i64,
        total_paid: i64,
    },

    /// Pagination cursor could not be decoded
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// A repository step ran out of its deadline
    #[error("repo-timeout: {operation} limit was {}ms", limit.as_millis())]
    Timeout {
        operation: String,
        limit: Duration,
    },

    /// Unexpected infrastructure failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillingError {
    pub fn invalid_terms(message: impl Into<String>) -> Self {
        BillingError::InvalidLoanTerms(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        BillingError::Internal(message.into())
    }

    /// Returns true for expected, caller-recoverable outcomes
    pub fn is_domain_error(&self) -> bool {
        !matches!(self, BillingError::Timeout { .. } | BillingError::Internal(_))
    }

    /// Returns true when the error should be presented as "already processed"
    pub fn is_success_shaped(&self) -> bool {
        matches!(self, BillingError::DuplicatePayment { .. })
    }

    /// Returns true when the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Timeout { .. })
    }
}

impl From<PortError> for BillingError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Timeout { operation, duration_ms } => BillingError::Timeout {
                operation,
                limit: Duration::from_millis(duration_ms),
            },
            other => BillingError::Internal(other.to_string()),
        }
    }
}

impl From<CoreError> for BillingError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::InvalidCursor(message) => BillingError::InvalidCursor(message),
            other => BillingError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_port_error_keeps_its_label() {
        let error: BillingError = PortError::timeout("InsertPayment", Duration::from_secs(2)).into();
        match &error {
            BillingError::Timeout { operation, limit } => {
                assert_eq!(operation, "InsertPayment");
                assert_eq!(*limit, Duration::from_secs(2));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(error.is_retryable());
        assert!(!error.is_domain_error());
    }

    #[test]
    fn test_other_port_errors_become_internal() {
        let error: BillingError = PortError::connection("refused").into();
        assert!(matches!(error, BillingError::Internal(_)));
    }

    #[test]
    fn test_duplicate_is_success_shaped() {
        let error = BillingError::DuplicatePayment {
            loan_id: LoanId::new(1),
            idempotency_key: "k-1".to_string(),
        };
        assert!(error.is_success_shaped());
        assert!(error.is_domain_error());
        assert!(!BillingError::LoanAlreadyClosed(LoanId::new(1)).is_success_shaped());
    }

    #[test]
    fn test_cursor_core_error_maps_to_invalid_cursor() {
        let error: BillingError = CoreError::invalid_cursor("bad").into();
        assert!(matches!(error, BillingError::InvalidCursor(_)));
    }
}
