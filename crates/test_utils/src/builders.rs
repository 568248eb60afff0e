//! Test Data Builders
//!
//! Builders for already-persisted loans and payments, used to seed a
//! repository with states the public operations cannot reach directly
//! (backdated loans, overpaid loans).

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use core_kernel::{LoanId, PaymentId};
use domain_billing::{Loan, Payment};

use crate::fixtures::TemporalFixtures;

/// Builder for a stored loan
pub struct LoanBuilder {
    id: LoanId,
    weekly_payment_amount: i64,
    total_weeks: u32,
    interest: i64,
    created_at: DateTime<Utc>,
}

impl Default for LoanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoanBuilder {
    /// A zero-interest loan of 50 weeks at 100,000 per week
    pub fn new() -> Self {
        Self {
            id: LoanId::new(1),
            weekly_payment_amount: 100_000,
            total_weeks: 50,
            interest: 0,
            created_at: TemporalFixtures::now(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = LoanId::new(id);
        self
    }

    pub fn with_installments(mut self, weekly_payment_amount: i64, total_weeks: u32) -> Self {
        self.weekly_payment_amount = weekly_payment_amount;
        self.total_weeks = total_weeks;
        self
    }

    /// Portion of the total payable that is interest
    pub fn with_interest(mut self, interest: i64) -> Self {
        self.interest = interest;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Backdates origination relative to `now`
    pub fn created_days_before(self, now: DateTime<Utc>, days: i64) -> Self {
        self.created_at(now - Duration::days(days))
    }

    pub fn build(self) -> Loan {
        let total_payable = self.weekly_payment_amount * i64::from(self.total_weeks);
        let principal = total_payable - self.interest;
        let rate = if principal > 0 {
            Decimal::from(self.interest) / Decimal::from(principal)
        } else {
            Decimal::ZERO
        };

        Loan {
            id: self.id,
            principal_amount: principal,
            annual_interest_rate: rate,
            total_interest_amount: self.interest,
            total_payable_amount: total_payable,
            weekly_payment_amount: self.weekly_payment_amount,
            total_weeks: self.total_weeks,
            start_date: self.created_at.date_naive(),
            created_at: self.created_at,
        }
    }
}

/// Builder for a stored payment
pub struct PaymentBuilder {
    id: i64,
    loan_id: LoanId,
    week_number: u32,
    amount: i64,
    idempotency_key: Option<String>,
    paid_at: DateTime<Utc>,
}

impl PaymentBuilder {
    /// A payment for `week_number` of `loan`, carrying the loan's installment
    pub fn for_week(loan: &Loan, week_number: u32) -> Self {
        Self {
            id: i64::from(week_number),
            loan_id: loan.id,
            week_number,
            amount: loan.weekly_payment_amount,
            idempotency_key: None,
            paid_at: loan.created_at + Duration::weeks(i64::from(week_number)),
        }
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn build(self) -> Payment {
        Payment {
            id: PaymentId::new(self.id),
            loan_id: self.loan_id,
            week_number: self.week_number,
            amount: self.amount,
            idempotency_key: self
                .idempotency_key
                .unwrap_or_else(|| format!("{}-week-{}", self.loan_id, self.week_number)),
            paid_at: self.paid_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_builder_keeps_totals_consistent() {
        let loan = LoanBuilder::new().with_installments(110_000, 50).with_interest(500_000).build();
        assert_eq!(loan.total_payable_amount, 5_500_000);
        assert_eq!(loan.principal_amount + loan.total_interest_amount, loan.total_payable_amount);
        assert_eq!(loan.weekly_payment_amount * i64::from(loan.total_weeks), loan.total_payable_amount);
    }

    #[test]
    fn test_payment_builder_defaults_to_installment() {
        let loan = LoanBuilder::new().build();
        let payment = PaymentBuilder::for_week(&loan, 3).build();
        assert_eq!(payment.amount, loan.weekly_payment_amount);
        assert_eq!(payment.week_number, 3);
        assert!(payment.idempotency_key.contains("week-3"));
    }
}
