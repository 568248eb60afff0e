//! Delinquency derivation
//!
//! Delinquency is never stored. It is computed from the loan's origination
//! time, the current time and the highest week paid so far.

use chrono::{DateTime, Utc};
use serde::Serialize;

const HOURS_PER_WEEK: i64 = 24 * 7;

/// Number of unpaid elapsed weeks at which a loan counts as delinquent
pub const DELINQUENCY_GAP_WEEKS: u32 = 2;

/// Snapshot of a delinquency check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DelinquencyAssessment {
    pub expected_week: u32,
    pub last_paid_week: u32,
    pub is_delinquent: bool,
}

/// Pure delinquency rules
#[derive(Debug, Clone, Copy, Default)]
pub struct DelinquencyEvaluator;

impl DelinquencyEvaluator {
    /// The week the borrower should be paying in at `now`
    ///
    /// Week 1 runs from origination for the first 168 hours. Times before
    /// origination yield 0.
    pub fn expected_week(created_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
        if now < created_at {
            return 0;
        }
        let elapsed_weeks = (now - created_at).num_hours() / HOURS_PER_WEEK;
        u32::try_from(elapsed_weeks).map_or(u32::MAX, |weeks| weeks.saturating_add(1))
    }

    /// Evaluates delinquency for a loan
    pub fn assess(
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
        last_paid_week: u32,
    ) -> DelinquencyAssessment {
        let expected_week = Self::expected_week(created_at, now);
        // grace period: nothing is due before the first week ends
        let is_delinquent = expected_week > 1
            && expected_week.saturating_sub(last_paid_week) >= DELINQUENCY_GAP_WEEKS;

        DelinquencyAssessment {
            expected_week,
            last_paid_week,
            is_delinquent,
        }
    }

    pub fn is_delinquent(created_at: DateTime<Utc>, now: DateTime<Utc>, last_paid_week: u32) -> bool {
        Self::assess(created_at, now, last_paid_week).is_delinquent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_expected_week_boundaries() {
        let created = now();
        assert_eq!(DelinquencyEvaluator::expected_week(created, created), 1);
        assert_eq!(DelinquencyEvaluator::expected_week(created, created + Duration::hours(167)), 1);
        assert_eq!(DelinquencyEvaluator::expected_week(created, created + Duration::hours(168)), 2);
        assert_eq!(DelinquencyEvaluator::expected_week(created, created - Duration::hours(1)), 0);
    }

    #[test]
    fn test_four_weeks_in_with_one_payment_is_delinquent() {
        let assessment = DelinquencyEvaluator::assess(now() - Duration::days(28), now(), 1);
        assert_eq!(assessment.expected_week, 5);
        assert!(assessment.is_delinquent);
    }

    #[test]
    fn test_caught_up_loan_is_not_delinquent() {
        let created = now() - Duration::days(14);
        assert_eq!(DelinquencyEvaluator::expected_week(created, now()), 3);
        assert!(!DelinquencyEvaluator::is_delinquent(created, now(), 2));
        assert!(DelinquencyEvaluator::is_delinquent(created, now(), 1));
    }

    #[test]
    fn test_grace_period_never_delinquent() {
        let created = now() - Duration::days(3);
        assert!(!DelinquencyEvaluator::is_delinquent(created, now(), 0));
    }

    #[test]
    fn test_one_week_behind_is_tolerated() {
        let created = now() - Duration::days(7);
        assert_eq!(DelinquencyEvaluator::expected_week(created, now()), 2);
        assert!(DelinquencyEvaluator::is_delinquent(created, now(), 0));
        assert!(!DelinquencyEvaluator::is_delinquent(created, now(), 1));
    }
}
