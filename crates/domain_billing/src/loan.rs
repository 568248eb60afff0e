//! Loan aggregate
//!
//! A loan is written once at origination and never changes afterwards. Its
//! repayment progress lives in the schedule and payment tables.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::LoanId;

use crate::error::BillingError;

/// Terms a borrower applies for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Principal in minor currency units
    pub principal_amount: i64,
    /// Flat annual rate as a fraction (0.10 = 10%)
    pub annual_interest_rate: Decimal,
    /// Number of weekly installments
    pub total_weeks: u32,
    /// Date the first week is counted from
    pub start_date: NaiveDate,
}

/// A persisted loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Unique identifier
    pub id: LoanId,
    /// Principal in minor currency units
    pub principal_amount: i64,
    /// Flat annual rate
    pub annual_interest_rate: Decimal,
    /// Interest charged once over the whole term
    pub total_interest_amount: i64,
    /// Principal plus interest
    pub total_payable_amount: i64,
    /// Exact amount every installment must carry
    pub weekly_payment_amount: i64,
    /// Number of installments
    pub total_weeks: u32,
    /// Schedule anchor date
    pub start_date: NaiveDate,
    /// Origination timestamp, the reference point for delinquency
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Remaining amount given the sum of payments received so far
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateOutstanding` when more has been paid than the
    /// loan is worth.
    pub fn outstanding(&self, total_paid: i64) -> Result<i64, BillingError> {
        if total_paid > self.total_payable_amount {
            return Err(BillingError::InvalidStateOutstanding {
                total_payable: self.total_payable_amount,
                total_paid,
            });
        }
        Ok(self.total_payable_amount - total_paid)
    }

    /// Returns true when `amount` is exactly one installment
    pub fn accepts_installment(&self, amount: i64) -> bool {
        amount == self.weekly_payment_amount
    }
}

/// Command to persist a new loan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLoanCommand {
    pub principal_amount: i64,
    pub annual_interest_rate: Decimal,
    pub total_interest_amount: i64,
    pub total_payable_amount: i64,
    pub weekly_payment_amount: i64,
    pub total_weeks: u32,
    pub start_date: NaiveDate,
}
