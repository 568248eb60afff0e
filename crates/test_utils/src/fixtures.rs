//! Pre-built Test Fixtures
//!
//! Loan terms whose outcomes are known by heart, plus fixed dates so
//! assertions never depend on the wall clock.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use domain_billing::LoanTerms;

/// Fixture for loan terms
pub struct LoanFixtures;

impl LoanFixtures {
    /// 5,000,000 at 10% over 5 weeks: 1,100,000 per week
    pub fn five_week_terms() -> LoanTerms {
        LoanTerms {
            principal_amount: 5_000_000,
            annual_interest_rate: dec!(0.10),
            total_weeks: 5,
            start_date: TemporalFixtures::start_date(),
        }
    }

    /// 5,000,000 at 10% over 50 weeks: 110,000 per week
    pub fn fifty_week_terms() -> LoanTerms {
        LoanTerms {
            total_weeks: 50,
            ..Self::five_week_terms()
        }
    }

    /// 1,000,000 at 0% over 3 weeks does not divide evenly
    pub fn indivisible_terms() -> LoanTerms {
        LoanTerms {
            principal_amount: 1_000_000,
            annual_interest_rate: dec!(0),
            total_weeks: 3,
            start_date: TemporalFixtures::start_date(),
        }
    }
}

/// Fixture for dates and timestamps
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// A Monday, used as the schedule anchor
    pub fn start_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).expect("valid date")
    }

    /// A fixed "now" for delinquency checks
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).single().expect("valid timestamp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_share_the_anchor_date() {
        assert_eq!(LoanFixtures::five_week_terms().start_date, TemporalFixtures::start_date());
        assert_eq!(LoanFixtures::fifty_week_terms().total_weeks, 50);
    }
}
