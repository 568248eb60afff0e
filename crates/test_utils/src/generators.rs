//! Property-Based Test Generators
//!
//! Provides proptest strategies for loan terms, both ones that must plan
//! cleanly and arbitrary ones that may be rejected.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_billing::LoanTerms;

/// Strategy for schedule anchor dates within a few years
pub fn start_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..3_650).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default() + Duration::days(offset)
    })
}

/// Strategy for annual rates between 0% and 50% in basis points
pub fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=5_000).prop_map(|bps| Decimal::new(bps, 4))
}

/// Strategy for terms guaranteed to divide evenly into weekly installments
///
/// The rate is zero so the total payable is exactly `weekly * weeks`.
pub fn divisible_loan_terms_strategy() -> impl Strategy<Value = LoanTerms> {
    (1i64..10_000_000, 1u32..=104, start_date_strategy()).prop_map(|(weekly, weeks, start_date)| {
        LoanTerms {
            principal_amount: weekly * i64::from(weeks),
            annual_interest_rate: Decimal::ZERO,
            total_weeks: weeks,
            start_date,
        }
    })
}

/// Strategy for arbitrary positive terms; many will not divide evenly
pub fn loan_terms_strategy() -> impl Strategy<Value = LoanTerms> {
    (1i64..1_000_000_000, rate_strategy(), 1u32..=104, start_date_strategy()).prop_map(
        |(principal_amount, annual_interest_rate, total_weeks, start_date)| LoanTerms {
            principal_amount,
            annual_interest_rate,
            total_weeks,
            start_date,
        },
    )
}
