//! Loan repayments
//!
//! A payment is one weekly installment. It is tied to the schedule week it
//! settles and to the idempotency key of the request that created it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{LoanId, PaymentId};

/// A persisted payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Loan being repaid
    pub loan_id: LoanId,
    /// Schedule sequence this payment settles
    pub week_number: u32,
    /// Amount in minor units, always the weekly installment
    pub amount: i64,
    /// Caller-supplied retry token, globally unique
    pub idempotency_key: String,
    /// When the payment was received
    pub paid_at: DateTime<Utc>,
}

/// Command to persist a payment for an already-chosen week
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentCommand {
    pub loan_id: LoanId,
    pub week_number: u32,
    pub amount: i64,
    pub idempotency_key: String,
    pub paid_at: DateTime<Utc>,
}

/// A payment as submitted by a caller, before the week is assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitPayment {
    pub loan_id: LoanId,
    pub amount: i64,
    pub idempotency_key: String,
    pub paid_at: DateTime<Utc>,
}

impl SubmitPayment {
    /// Creates a submission received now
    pub fn new(loan_id: LoanId, amount: i64, idempotency_key: impl Into<String>) -> Self {
        Self {
            loan_id,
            amount,
            idempotency_key: idempotency_key.into(),
            paid_at: Utc::now(),
        }
    }

    /// Overrides the receipt time
    pub fn paid_at(mut self, paid_at: DateTime<Utc>) -> Self {
        self.paid_at = paid_at;
        self
    }

    pub(crate) fn for_week(self, week_number: u32) -> CreatePaymentCommand {
        CreatePaymentCommand {
            loan_id: self.loan_id,
            week_number,
            amount: self.amount,
            idempotency_key: self.idempotency_key,
            paid_at: self.paid_at,
        }
    }
}
