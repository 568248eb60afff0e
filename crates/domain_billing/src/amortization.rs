//! Flat-interest amortization
//!
//! Interest is charged once on the principal for the whole term and the
//! total is split into equal weekly installments. Terms that do not divide
//! evenly are rejected; there is no remainder policy.

use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use core_kernel::LoanId;

use crate::error::BillingError;
use crate::loan::{CreateLoanCommand, LoanTerms};
use crate::schedule::NewScheduleEntry;

/// Days between consecutive installments
pub const DAYS_PER_INSTALLMENT: u64 = 7;

/// One planned installment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Installment {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: i64,
}

/// The result of planning a loan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmortizationPlan {
    pub terms: LoanTerms,
    pub total_interest: i64,
    pub total_payable: i64,
    pub weekly_payment: i64,
    pub installments: Vec<Installment>,
}

impl AmortizationPlan {
    /// The loan row this plan persists as
    pub fn loan_command(&self) -> CreateLoanCommand {
        CreateLoanCommand {
            principal_amount: self.terms.principal_amount,
            annual_interest_rate: self.terms.annual_interest_rate,
            total_interest_amount: self.total_interest,
            total_payable_amount: self.total_payable,
            weekly_payment_amount: self.weekly_payment,
            total_weeks: self.terms.total_weeks,
            start_date: self.terms.start_date,
        }
    }

    /// Schedule rows for the loan once its id is known
    pub fn schedule_for(&self, loan_id: LoanId) -> Vec<NewScheduleEntry> {
        self.installments
            .iter()
            .map(|installment| NewScheduleEntry {
                loan_id,
                sequence: installment.sequence,
                due_date: installment.due_date,
                amount: installment.amount,
            })
            .collect()
    }
}

/// Computes repayment plans; holds no state
#[derive(Debug, Clone, Copy, Default)]
pub struct AmortizationPlanner;

impl AmortizationPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plans a loan
    ///
    /// # Errors
    ///
    /// `InvalidLoanTerms` when the principal or week count is not positive,
    /// the rate is negative, an amount overflows, or the total payable does
    /// not divide evenly by the week count.
    pub fn plan(&self, terms: &LoanTerms) -> Result<AmortizationPlan, BillingError> {
        if terms.principal_amount <= 0 {
            return Err(BillingError::invalid_terms("principal amount must be positive"));
        }
        if terms.total_weeks == 0 {
            return Err(BillingError::invalid_terms("total weeks must be positive"));
        }
        if terms.annual_interest_rate < Decimal::ZERO {
            return Err(BillingError::invalid_terms("interest rate cannot be negative"));
        }

        let total_interest = Self::flat_interest(terms.principal_amount, terms.annual_interest_rate)?;
        let total_payable = terms
            .principal_amount
            .checked_add(total_interest)
            .ok_or_else(|| BillingError::invalid_terms("total payable overflows"))?;

        let weeks = i64::from(terms.total_weeks);
        if total_payable % weeks != 0 {
            return Err(BillingError::invalid_terms(format!(
                "total payable {} is not divisible by {} weeks",
                total_payable, terms.total_weeks
            )));
        }
        let weekly_payment = total_payable / weeks;

        let installments = (1..=terms.total_weeks)
            .map(|sequence| {
                let due_date = terms
                    .start_date
                    .checked_add_days(Days::new(DAYS_PER_INSTALLMENT * u64::from(sequence)))
                    .ok_or_else(|| BillingError::invalid_terms("schedule runs past the supported date range"))?;
                Ok(Installment {
                    sequence,
                    due_date,
                    amount: weekly_payment,
                })
            })
            .collect::<Result<Vec<_>, BillingError>>()?;

        Ok(AmortizationPlan {
            terms: terms.clone(),
            total_interest,
            total_payable,
            weekly_payment,
            installments,
        })
    }

    fn flat_interest(principal: i64, rate: Decimal) -> Result<i64, BillingError> {
        Decimal::from(principal)
            .checked_mul(rate)
            .map(|interest| interest.floor())
            .and_then(|interest| interest.to_i64())
            .ok_or_else(|| BillingError::invalid_terms("interest overflows"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    fn terms(principal: i64, rate: Decimal, weeks: u32) -> LoanTerms {
        LoanTerms {
            principal_amount: principal,
            annual_interest_rate: rate,
            total_weeks: weeks,
            start_date: start(),
        }
    }

    #[test]
    fn test_five_week_loan() {
        let plan = AmortizationPlanner::new().plan(&terms(5_000_000, dec!(0.10), 5)).unwrap();

        assert_eq!(plan.total_interest, 500_000);
        assert_eq!(plan.total_payable, 5_500_000);
        assert_eq!(plan.weekly_payment, 1_100_000);
        let due: Vec<_> = plan.installments.iter().map(|i| i.due_date).collect();
        assert_eq!(
            due,
            vec![
                start() + Days::new(7),
                start() + Days::new(14),
                start() + Days::new(21),
                start() + Days::new(28),
                start() + Days::new(35),
            ]
        );
    }

    #[test]
    fn test_interest_is_floored() {
        let plan = AmortizationPlanner::new().plan(&terms(1_000_005, dec!(0.10), 1)).unwrap();
        assert_eq!(plan.total_interest, 100_000);
        assert_eq!(plan.total_payable, 1_100_005);
    }

    #[test]
    fn test_indivisible_total_is_rejected() {
        let result = AmortizationPlanner::new().plan(&terms(1_000_000, dec!(0.0), 3));
        assert!(matches!(result, Err(BillingError::InvalidLoanTerms(msg)) if msg.contains("divisible")));
    }

    #[test]
    fn test_non_positive_inputs_are_rejected() {
        let planner = AmortizationPlanner::new();
        assert!(planner.plan(&terms(0, dec!(0.1), 5)).is_err());
        assert!(planner.plan(&terms(-10, dec!(0.1), 5)).is_err());
        assert!(planner.plan(&terms(1_000, dec!(0.1), 0)).is_err());
        assert!(planner.plan(&terms(1_000, dec!(-0.1), 1)).is_err());
    }

    #[test]
    fn test_overflow_is_rejected() {
        let result = AmortizationPlanner::new().plan(&terms(i64::MAX, dec!(1.0), 1));
        assert!(matches!(result, Err(BillingError::InvalidLoanTerms(_))));
    }

    #[test]
    fn test_schedule_rows_carry_loan_id() {
        let plan = AmortizationPlanner::new().plan(&terms(5_000_000, dec!(0.10), 5)).unwrap();
        let rows = plan.schedule_for(LoanId::new(9));
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.loan_id == LoanId::new(9)));
        assert_eq!(plan.loan_command().weekly_payment_amount, 1_100_000);
    }

    proptest! {
        #[test]
        fn prop_schedule_covers_total_payable(
            weekly in 1i64..1_000_000,
            weeks in 1u32..120,
        ) {
            let principal = weekly * i64::from(weeks);
            let plan = AmortizationPlanner::new().plan(&terms(principal, Decimal::ZERO, weeks)).unwrap();

            prop_assert_eq!(plan.installments.len(), weeks as usize);
            let sum: i64 = plan.installments.iter().map(|i| i.amount).sum();
            prop_assert_eq!(sum, plan.total_payable);
            for (index, installment) in plan.installments.iter().enumerate() {
                prop_assert_eq!(installment.sequence as usize, index + 1);
            }
            for pair in plan.installments.windows(2) {
                prop_assert_eq!((pair[1].due_date - pair[0].due_date).num_days(), 7);
            }
        }
    }
}
